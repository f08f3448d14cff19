//! Experiment sweeps and their records
//!
//! An [`ExperimentPlan`] names the axes of a sweep (data subsets × models ×
//! scores × descriptor variants, optionally × classes × sets × systems).
//! [`driver::run`] executes every combination and writes one aggregated
//! results table.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)   one per combination of the plan
//!                              │
//!                              ├──< MetricRecord (N)   mae, r, r2, ... per repeat
//!                              └──< ArtifactRecord (N) persisted pipelines
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use grade_affinity::experiment::{ExperimentStore, MetricRecord, RunRecord, RunStatus, Statistic};
//!
//! let mut store = ExperimentStore::new();
//! let mut run = RunRecord::new("run-0001", "test-set-20240101T000000");
//! run.start();
//!
//! for repeat in 0..3 {
//!     store.add_metric(MetricRecord::new(run.run_id(), Statistic::R2, repeat, 0.61));
//! }
//! run.complete(RunStatus::Success);
//!
//! assert_eq!(store.get_metrics_for_run("run-0001", Statistic::R2).len(), 3);
//! ```

mod artifact_record;
pub mod driver;
mod experiment_record;
mod metric_record;
mod plan;
mod run_record;
mod store;

pub use artifact_record::ArtifactRecord;
pub use driver::{execute, run, write_outputs, ExperimentReport};
pub use experiment_record::ExperimentRecord;
pub use metric_record::{MetricRecord, Statistic};
pub use plan::{combinations, Combination, ExperimentPlan, PathTemplates};
pub use run_record::{RunRecord, RunRecordBuilder, RunStatus};
pub use store::ExperimentStore;
