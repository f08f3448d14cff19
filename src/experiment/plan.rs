//! Experiment plan: the axes of a sweep and where its files live
//!
//! Plans are JSON documents. Path fields are templates; the placeholders
//! `{subset}`, `{descriptor}`, `{class}`, `{set}`, `{system}`, `{score}` and
//! `{model}` are replaced per combination.
//!
//! ```json
//! {
//!   "name": "test-set",
//!   "data_subsets": ["all", "ki", "kd"],
//!   "model_types": ["linearRegression", "Ridge", "XGBoost"],
//!   "scores": ["pKd pKi pIC50"],
//!   "descriptors": ["GRADE", "X-GRADE"],
//!   "paths": {
//!     "train_features": "data/Descriptors/PDBbind_refined_set_{descriptor}.csv",
//!     "test_features": "data/Descriptors/PDBbind_general_set_{descriptor}.csv",
//!     "train_labels": "data/exp_data/PDBbind_refined_set_{subset}.csv",
//!     "test_labels": "data/exp_data/PDBbind_general_set_all.csv"
//!   },
//!   "model_dir": "models",
//!   "output_csv": "results/test_results.csv"
//! }
//! ```

use crate::model::ModelType;
use crate::prepare::PrepareOptions;
use crate::table::DataColumns;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Path templates of the four preparation inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplates {
    /// Training descriptor CSV
    pub train_features: String,
    /// Test descriptor CSV
    pub test_features: String,
    /// Training label CSV
    pub train_labels: String,
    /// Test label CSV
    pub test_labels: String,
}

fn default_ablation() -> String {
    "{descriptor}".to_string()
}

const fn default_confidence_level() -> f64 {
    0.9
}

const fn default_true() -> bool {
    true
}

const fn default_repeats() -> usize {
    1
}

/// A complete sweep definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentPlan {
    /// Plan name, recorded on the experiment
    pub name: String,
    /// Data subset tags (`{subset}`), e.g. `all`, `ki`, `kd`
    pub data_subsets: Vec<String>,
    /// Regressors to benchmark
    pub model_types: Vec<ModelType>,
    /// Target score columns
    pub scores: Vec<String>,
    /// Descriptor variants (`{descriptor}`), e.g. `GRADE`, `X-GRADE`
    pub descriptors: Vec<String>,
    /// Class subsets (`{class}`); empty disables the axis
    #[serde(default)]
    pub classes: Vec<String>,
    /// Evaluation sets (`{set}`); empty disables the axis
    #[serde(default)]
    pub sets: Vec<String>,
    /// Benchmark systems (`{system}`); empty disables the axis unless
    /// `systems_dir` is set
    #[serde(default)]
    pub systems: Vec<String>,
    /// Discover systems as the non-hidden subdirectories of this directory
    #[serde(default)]
    pub systems_dir: Option<PathBuf>,
    /// Input file templates
    pub paths: PathTemplates,
    /// Ablation tag template
    #[serde(default = "default_ablation")]
    pub ablation: String,
    /// Artifact name suffix template
    #[serde(default)]
    pub marker: String,
    /// Model artifact directory
    pub model_dir: PathBuf,
    /// Scatter plots are written here when set
    #[serde(default)]
    pub plot_dir: Option<PathBuf>,
    /// Plot name template; the session default when unset
    #[serde(default)]
    pub plot_name: Option<String>,
    /// Aggregated results CSV
    pub output_csv: PathBuf,
    /// Aggregated results as Parquet as well, when set
    #[serde(default)]
    pub output_parquet: Option<PathBuf>,
    /// Run / metric / artifact records as JSON, when set
    #[serde(default)]
    pub records_json: Option<PathBuf>,
    /// Shuffle / polynomial / seed
    #[serde(default)]
    pub prepare: PrepareOptions,
    /// Identifier / label-type column names
    #[serde(default)]
    pub columns: DataColumns,
    /// Grid search before fitting (SVR, decision tree, random forest)
    #[serde(default)]
    pub hyperparameter_search: bool,
    /// Confidence level of the Pearson interval
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Train and persist; `false` evaluates previously persisted models
    #[serde(default = "default_true")]
    pub train: bool,
    /// Evaluations per combination; above 1 the table reports means and a
    /// `Time` column
    #[serde(default = "default_repeats")]
    pub repeats: usize,
    /// Report the Spearman column
    #[serde(default = "default_true")]
    pub include_spearman: bool,
}

impl ExperimentPlan {
    /// Read a plan from a JSON file
    ///
    /// # Errors
    /// Returns error if the file is unreadable, not a plan, or invalid
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse a plan from JSON text
    ///
    /// # Errors
    /// Returns error if the text is not a valid plan
    pub fn from_json(text: &str) -> Result<Self> {
        let plan: Self = serde_json::from_str(text)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check axis and option values
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("data_subsets", self.data_subsets.is_empty()),
            ("model_types", self.model_types.is_empty()),
            ("scores", self.scores.is_empty()),
            ("descriptors", self.descriptors.is_empty()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, empty)| *empty) {
            return Err(Error::InvalidInput(format!("plan field '{field}' is empty")));
        }
        if self.repeats == 0 {
            return Err(Error::InvalidInput("plan field 'repeats' must be at least 1".into()));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::InvalidInput(format!(
                "plan field 'confidence_level' must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    /// Systems to iterate: the listed ones, or the non-hidden
    /// subdirectories of `systems_dir` in name order
    ///
    /// # Errors
    /// Returns error if `systems_dir` cannot be listed
    pub fn resolve_systems(&self) -> Result<Vec<String>> {
        let Some(dir) = &self.systems_dir else {
            return Ok(self.systems.clone());
        };
        let mut systems = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() && !name.starts_with('.') {
                systems.push(name);
            }
        }
        systems.sort();
        Ok(systems)
    }
}

/// One point of the sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    /// Data subset tag
    pub subset: String,
    /// Regressor
    pub model_type: ModelType,
    /// Target score
    pub score: String,
    /// Descriptor variant
    pub descriptor: String,
    /// Class subset, when the axis is used
    pub class: Option<String>,
    /// Evaluation set, when the axis is used
    pub set: Option<String>,
    /// Benchmark system, when the axis is used
    pub system: Option<String>,
}

impl Combination {
    /// Substitute the placeholders of `template`
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{subset}", &self.subset)
            .replace("{descriptor}", &self.descriptor)
            .replace("{class}", self.class.as_deref().unwrap_or(""))
            .replace("{set}", self.set.as_deref().unwrap_or(""))
            .replace("{system}", self.system.as_deref().unwrap_or(""))
            .replace("{score}", &self.score)
            .replace("{model}", self.model_type.as_str())
    }

    /// Short label, e.g. `ki/SVR/pK/GRADE/class3/test`
    #[must_use]
    pub fn label(&self) -> String {
        let mut parts = vec![
            self.system.clone().unwrap_or_default(),
            self.class.as_ref().map(|c| format!("class{c}")).unwrap_or_default(),
            self.subset.clone(),
            self.model_type.to_string(),
            self.score.clone(),
            self.descriptor.clone(),
            self.set.clone().unwrap_or_default(),
        ];
        parts.retain(|p| !p.is_empty());
        parts.join("/")
    }
}

fn optional_axis(values: &[String]) -> Vec<Option<String>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().cloned().map(Some).collect()
    }
}

/// Every combination of `plan` in iteration order: systems, classes,
/// subsets, models, scores, descriptors, sets (innermost).
///
/// # Errors
/// Returns error if systems must be discovered and the directory is unreadable
pub fn combinations(plan: &ExperimentPlan) -> Result<Vec<Combination>> {
    let systems = optional_axis(&plan.resolve_systems()?);
    let classes = optional_axis(&plan.classes);
    let sets = optional_axis(&plan.sets);

    let mut out = Vec::new();
    for system in &systems {
        for class in &classes {
            for subset in &plan.data_subsets {
                for &model_type in &plan.model_types {
                    for score in &plan.scores {
                        for descriptor in &plan.descriptors {
                            for set in &sets {
                                out.push(Combination {
                                    subset: subset.clone(),
                                    model_type,
                                    score: score.clone(),
                                    descriptor: descriptor.clone(),
                                    class: class.clone(),
                                    set: set.clone(),
                                    system: system.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(out)
}
