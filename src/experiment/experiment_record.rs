//! Experiment Record - one executed plan

use super::plan::ExperimentPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution of an [`ExperimentPlan`].
///
/// The plan is kept verbatim so a results table can be traced back to the
/// axes and paths that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRecord {
    experiment_id: String,
    plan: ExperimentPlan,
    combinations: usize,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExperimentRecord {
    /// Start recording `plan` with `combinations` planned runs.
    ///
    /// The ID is the plan name suffixed with the start time.
    #[must_use]
    pub fn start(plan: &ExperimentPlan, combinations: usize) -> Self {
        Self::start_at(plan, combinations, Utc::now())
    }

    /// Like [`ExperimentRecord::start`] with an explicit start time
    #[must_use]
    pub fn start_at(plan: &ExperimentPlan, combinations: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            experiment_id: format!("{}-{}", plan.name, started_at.format("%Y%m%dT%H%M%S")),
            plan: plan.clone(),
            combinations,
            started_at,
            finished_at: None,
        }
    }

    /// Mark every combination as processed
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Experiment ID
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Plan name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.plan.name
    }

    /// The executed plan
    #[must_use]
    pub const fn plan(&self) -> &ExperimentPlan {
        &self.plan
    }

    /// Number of combinations the plan expands to
    #[must_use]
    pub const fn combinations(&self) -> usize {
        self.combinations
    }

    /// Start time
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Completion time; `None` while running or after an aborted sweep
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn plan(name: &str) -> ExperimentPlan {
        let text = format!(
            r#"{{"name": "{name}", "data_subsets": ["all"], "model_types": ["Ridge", "SVR"],
            "scores": ["pK"], "descriptors": ["GRADE"], "paths": {{"train_features": "a.csv",
            "test_features": "b.csv", "train_labels": "c.csv", "test_labels": "d.csv"}},
            "model_dir": "models", "output_csv": "out.csv"}}"#
        );
        ExperimentPlan::from_json(&text).unwrap()
    }

    #[test]
    fn test_id_from_name_and_start_time() {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let record = ExperimentRecord::start_at(&plan("test-set"), 2, at);
        assert_eq!(record.experiment_id(), "test-set-20240506T070809");
        assert_eq!(record.name(), "test-set");
        assert_eq!(record.combinations(), 2);
        assert_eq!(record.plan().model_types.len(), 2);
    }

    #[test]
    fn test_finish_sets_completion_time() {
        let mut record = ExperimentRecord::start(&plan("sweep"), 2);
        assert!(record.finished_at().is_none());
        record.finish();
        assert!(record.finished_at().unwrap() >= record.started_at());
    }
}
