//! Experiment Store - in-memory records of a sweep
//!
//! Holds the experiment, its runs, their metrics and the artifacts they
//! wrote. The whole store serializes to JSON next to the results table.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord, RunStatus, Statistic};
use crate::Result;

/// In-memory store for experiment records.
///
/// Experiments and runs are keyed by ID; metrics and artifacts are kept in
/// insertion order and filtered on query.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExperimentStore {
    experiments: HashMap<String, ExperimentRecord>,
    runs: HashMap<String, RunRecord>,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
}

impl ExperimentStore {
    /// Create a new empty experiment store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
            && self.runs.is_empty()
            && self.metrics.is_empty()
            && self.artifacts.is_empty()
    }

    /// Get the number of experiments in the store.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs in the store.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Get the number of metrics in the store.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Get the number of artifacts in the store.
    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// Add an experiment to the store.
    pub fn add_experiment(&mut self, experiment: ExperimentRecord) {
        self.experiments
            .insert(experiment.experiment_id().to_string(), experiment);
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<&ExperimentRecord> {
        self.experiments.get(experiment_id)
    }

    /// Add or replace a run.
    pub fn add_run(&mut self, run: RunRecord) {
        self.runs.insert(run.run_id().to_string(), run);
    }

    /// Get a run by ID.
    #[must_use]
    pub fn get_run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.get(run_id)
    }

    /// Get all runs of an experiment, ordered by run ID.
    #[must_use]
    pub fn get_runs_for_experiment(&self, experiment_id: &str) -> Vec<&RunRecord> {
        let mut runs: Vec<&RunRecord> = self
            .runs
            .values()
            .filter(|run| run.experiment_id() == experiment_id)
            .collect();
        runs.sort_by(|a, b| a.run_id().cmp(b.run_id()));
        runs
    }

    /// Number of runs with the given status.
    #[must_use]
    pub fn count_with_status(&self, status: RunStatus) -> usize {
        self.runs.values().filter(|run| run.status() == status).count()
    }

    /// Add a metric to the store.
    pub fn add_metric(&mut self, metric: MetricRecord) {
        self.metrics.push(metric);
    }

    /// Values of one statistic of a run, ordered by repeat.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use grade_affinity::experiment::{ExperimentStore, MetricRecord, Statistic};
    ///
    /// let mut store = ExperimentStore::new();
    /// for repeat in 0..10 {
    ///     store.add_metric(MetricRecord::new("run-0001", Statistic::Mae, repeat, 1.25));
    /// }
    ///
    /// let mae = store.get_metrics_for_run("run-0001", Statistic::Mae);
    /// assert_eq!(mae.len(), 10);
    /// ```
    #[must_use]
    pub fn get_metrics_for_run(&self, run_id: &str, statistic: Statistic) -> Vec<&MetricRecord> {
        let mut metrics: Vec<&MetricRecord> = self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.statistic() == statistic)
            .collect();
        metrics.sort_by_key(|m| m.repeat());
        metrics
    }

    /// Mean of one statistic over the repeats of a run; `None` if never recorded
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_for_run(&self, run_id: &str, statistic: Statistic) -> Option<f64> {
        let values = self.get_metrics_for_run(run_id, statistic);
        if values.is_empty() {
            return None;
        }
        Some(values.iter().map(|m| m.value()).sum::<f64>() / values.len() as f64)
    }

    /// Add an artifact to the store.
    pub fn add_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifacts.push(artifact);
    }

    /// Artifacts written by a run.
    #[must_use]
    pub fn get_artifacts_for_run(&self, run_id: &str) -> Vec<&ArtifactRecord> {
        self.artifacts
            .iter()
            .filter(|a| a.run_id() == run_id)
            .collect()
    }

    /// Write the store as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}
