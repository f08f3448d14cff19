//! Plan execution: prepare, train and evaluate every combination, then
//! write one aggregated results table.
//!
//! Combinations whose train or test split holds fewer than two samples
//! are skipped. Any other error aborts the sweep; the failing run is
//! recorded as `Failed` before the error is returned.

use super::plan::{combinations, Combination, ExperimentPlan};
use super::{
    ArtifactRecord, ExperimentRecord, ExperimentStore, MetricRecord, RunRecord, RunStatus, Statistic,
};
use crate::prepare::{prepare, PrepareRequest};
use crate::session::{EvaluateOptions, Session, TrainOptions};
use crate::table::{write_csv, write_parquet, ColumnData, ColumnarTable};
use crate::{Error, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

/// Smallest split size that is trained and evaluated
pub const MIN_SPLIT_SIZE: usize = 2;

/// Results table column names
pub mod columns {
    /// Regressor
    pub const MODEL_TYPE: &str = "Modeltype";
    /// Target score
    pub const SCORE_TYPE: &str = "Scoretype";
    /// Data subset tag
    pub const DATA_TYPE: &str = "Datatype";
    /// Mean absolute error
    pub const MAE: &str = "Mean absolute error (mae)";
    /// Mean squared error
    pub const MSE: &str = "Mean squared error (mse)";
    /// Standard deviation of predictions
    pub const SD: &str = "Standard Diviation (SD)";
    /// Pearson r
    pub const PEARSON: &str = "Pearson correlation coefficient (r)";
    /// R²
    pub const R2: &str = "Coefficient of determination (r\u{b2})";
    /// Spearman r
    pub const SPEARMAN: &str = "Spearman correlation coefficient";
    /// Ablation tag
    pub const ADD_INFORMATION: &str = "add. information";
    /// Class subset
    pub const CLASSES: &str = "Classes";
    /// Evaluation set
    pub const SET: &str = "Set";
    /// Benchmark system
    pub const SYSTEM: &str = "System";
    /// Training split size
    pub const TRAINING_SET_SIZE: &str = "Training set size";
    /// Test split size
    pub const SET_SIZE: &str = "Set size";
    /// Mean evaluation wall time in seconds
    pub const TIME: &str = "Time";
}

/// Header of the confidence-interval column, e.g. `90% Confidence interval`
#[must_use]
pub fn confidence_column(level: f64) -> String {
    let percent = (level * 100.0 * 1000.0).round() / 1000.0;
    format!("{percent}% Confidence interval")
}

/// One results row before it is split into columns
#[derive(Debug, Clone, PartialEq)]
struct ResultRow {
    model_type: String,
    score: String,
    data_tag: String,
    mae: f64,
    mse: f64,
    sd: f64,
    r: f64,
    confidence_interval: String,
    r2: f64,
    spearman: f64,
    ablation: String,
    class: String,
    set: String,
    system: String,
    train_size: u64,
    test_size: u64,
    time: f64,
}

/// Outcome of [`execute`]
#[derive(Debug)]
pub struct ExperimentReport {
    /// The executed experiment
    pub experiment: ExperimentRecord,
    /// Aggregated results, one row per evaluated combination
    pub results: ColumnarTable,
    /// Run, metric and artifact records
    pub store: ExperimentStore,
}

impl ExperimentReport {
    /// Rows in the results table
    #[must_use]
    pub fn rows(&self) -> usize {
        self.results.num_rows()
    }

    /// Combinations skipped by the split-size guard
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.store.count_with_status(RunStatus::Skipped)
    }
}

/// Prepare, train and evaluate one combination.
///
/// Returns `None` when the split-size guard skips it.
fn run_combination(
    plan: &ExperimentPlan,
    combo: &Combination,
    run: &mut RunRecord,
    store: &mut ExperimentStore,
) -> Result<Option<ResultRow>> {
    let ablation = combo.render(&plan.ablation);
    let request = PrepareRequest::new(
        combo.score.clone(),
        combo.render(&plan.paths.train_features),
        combo.render(&plan.paths.test_features),
        combo.render(&plan.paths.train_labels),
        combo.render(&plan.paths.test_labels),
        ablation.clone(),
    )
    .with_columns(plan.columns.clone());
    let data = prepare(&request, &plan.prepare)?;

    let (train_size, test_size) = (data.train_len(), data.test_len());
    if train_size < MIN_SPLIT_SIZE || test_size < MIN_SPLIT_SIZE {
        let reason = format!("too few samples: {train_size} training, {test_size} test");
        info!(combination = %combo.label(), %reason, "combination skipped");
        run.complete_with_message(RunStatus::Skipped, reason);
        return Ok(None);
    }

    let mut session = Session::new(combo.model_type, combo.score.clone(), ablation.clone())
        .with_columns(plan.columns.clone());
    session.set_data_tag(combo.subset.clone());
    session.set_prepared(data);

    let marker = combo.render(&plan.marker);
    if plan.train {
        let options = TrainOptions {
            save_dir: plan.model_dir.clone(),
            marker: marker.clone(),
            hyperparameter_search: plan.hyperparameter_search,
            ..TrainOptions::default()
        };
        let path = session.train(&options)?;
        store.add_artifact(ArtifactRecord::from_file(
            run.run_id(),
            session.key()?.to_string(),
            &path,
        )?);
    }

    let options = EvaluateOptions {
        load_dir: plan.model_dir.clone(),
        confidence_level: plan.confidence_level,
        marker,
    };
    let mut intervals = Vec::with_capacity(plan.repeats);
    for repeat in 0..plan.repeats {
        let started = Instant::now();
        session.evaluate(&options)?;
        let elapsed = started.elapsed().as_secs_f64();
        let row = session.stats(true)?;
        for metric in MetricRecord::from_stats(run.run_id(), repeat, &row, elapsed) {
            store.add_metric(metric);
        }
        intervals.push(row.confidence_interval);
    }

    if let Some(dir) = &plan.plot_dir {
        let name = plan.plot_name.as_ref().map(|t| combo.render(t));
        session.render_plot(dir, name.as_deref())?;
    }

    let mean = |statistic: Statistic| {
        store
            .mean_for_run(run.run_id(), statistic)
            .unwrap_or(f64::NAN)
    };
    let confidence_interval = intervals
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidInput("plan has no evaluation repeats".into()))?;
    let row = ResultRow {
        model_type: combo.model_type.to_string(),
        score: combo.score.clone(),
        data_tag: combo.subset.clone(),
        mae: mean(Statistic::Mae),
        mse: mean(Statistic::Mse),
        sd: mean(Statistic::Sd),
        r: mean(Statistic::R),
        confidence_interval,
        r2: mean(Statistic::R2),
        spearman: mean(Statistic::Spearman),
        ablation,
        class: combo.class.clone().unwrap_or_default(),
        set: combo.set.clone().unwrap_or_default(),
        system: combo.system.clone().unwrap_or_default(),
        train_size: train_size as u64,
        test_size: test_size as u64,
        time: mean(Statistic::Time),
    };

    info!(
        combination = %combo.label(),
        training_set_size = train_size,
        set_size = test_size,
        r = row.r,
        "combination done"
    );
    run.complete(RunStatus::Success);
    Ok(Some(row))
}

/// Split rows into the results table layout of `plan`
fn results_table(plan: &ExperimentPlan, rows: &[ResultRow]) -> Result<ColumnarTable> {
    let text = |f: fn(&ResultRow) -> &str| {
        ColumnData::Text(rows.iter().map(|r| f(r).to_string()).collect())
    };
    let float = |f: fn(&ResultRow) -> f64| ColumnData::Float(rows.iter().map(f).collect());
    let count = |f: fn(&ResultRow) -> u64| ColumnData::Count(rows.iter().map(f).collect());

    let mut table = ColumnarTable::new();
    table.push_column(columns::MODEL_TYPE, text(|r| r.model_type.as_str()))?;
    table.push_column(columns::SCORE_TYPE, text(|r| r.score.as_str()))?;
    table.push_column(columns::DATA_TYPE, text(|r| r.data_tag.as_str()))?;
    table.push_column(columns::MAE, float(|r| r.mae))?;
    table.push_column(columns::MSE, float(|r| r.mse))?;
    table.push_column(columns::SD, float(|r| r.sd))?;
    table.push_column(columns::PEARSON, float(|r| r.r))?;
    table.push_column(
        confidence_column(plan.confidence_level),
        text(|r| r.confidence_interval.as_str()),
    )?;
    table.push_column(columns::R2, float(|r| r.r2))?;
    if plan.include_spearman {
        table.push_column(columns::SPEARMAN, float(|r| r.spearman))?;
    }
    table.push_column(columns::ADD_INFORMATION, text(|r| r.ablation.as_str()))?;
    if !plan.classes.is_empty() {
        table.push_column(columns::CLASSES, text(|r| r.class.as_str()))?;
    }
    if !plan.sets.is_empty() {
        table.push_column(columns::SET, text(|r| r.set.as_str()))?;
    }
    if !plan.systems.is_empty() || plan.systems_dir.is_some() {
        table.push_column(columns::SYSTEM, text(|r| r.system.as_str()))?;
    }
    table.push_column(columns::TRAINING_SET_SIZE, count(|r| r.train_size))?;
    table.push_column(columns::SET_SIZE, count(|r| r.test_size))?;
    if plan.repeats > 1 {
        table.push_column(columns::TIME, float(|r| r.time))?;
    }
    Ok(table)
}

/// Run every combination of `plan` without writing the results table.
///
/// # Errors
/// Returns the first error of any combination (other than a skip)
pub fn execute(plan: &ExperimentPlan) -> Result<ExperimentReport> {
    plan.validate()?;
    let combos = combinations(plan)?;
    let mut experiment = ExperimentRecord::start(plan, combos.len());
    let experiment_id = experiment.experiment_id().to_string();
    let mut store = ExperimentStore::new();
    store.add_experiment(experiment.clone());

    info!(plan = %plan.name, combinations = combos.len(), "starting experiment");

    let mut rows = Vec::new();
    for (index, combo) in combos.iter().enumerate() {
        let mut run = RunRecord::builder(format!("run-{:04}", index + 1), experiment_id.clone())
            .description(combo.label())
            .build();
        run.start();
        match run_combination(plan, combo, &mut run, &mut store) {
            Ok(row) => {
                rows.extend(row);
                store.add_run(run);
            }
            Err(err) => {
                error!(combination = %combo.label(), error = %err, "combination failed");
                run.complete_with_message(RunStatus::Failed, err.to_string());
                store.add_run(run);
                return Err(err);
            }
        }
    }

    let results = results_table(plan, &rows)?;
    experiment.finish();
    store.add_experiment(experiment.clone());
    Ok(ExperimentReport {
        experiment,
        results,
        store,
    })
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write the results CSV (with row index), the optional Parquet copy and
/// the optional JSON records.
///
/// # Errors
/// Returns error if any output cannot be written
pub fn write_outputs(plan: &ExperimentPlan, report: &ExperimentReport) -> Result<()> {
    let batch = report.results.to_record_batch()?;
    ensure_parent(&plan.output_csv)?;
    write_csv(&batch, &plan.output_csv, true)?;
    if let Some(path) = &plan.output_parquet {
        ensure_parent(path)?;
        write_parquet(&batch, path)?;
    }
    if let Some(path) = &plan.records_json {
        ensure_parent(path)?;
        report.store.save_json(path)?;
    }
    info!(
        rows = report.rows(),
        skipped = report.skipped(),
        output = %plan.output_csv.display(),
        "results written"
    );
    Ok(())
}

/// [`execute`] then [`write_outputs`]
///
/// # Errors
/// Returns the first combination error or any output error
pub fn run(plan: &ExperimentPlan) -> Result<ExperimentReport> {
    let report = execute(plan)?;
    write_outputs(plan, &report)?;
    Ok(report)
}
