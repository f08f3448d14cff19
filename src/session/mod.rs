//! Trainer/evaluator session
//!
//! A [`Session`] is scoped to one (model type, score, ablation) triple plus a
//! data tag. It holds one train/test split, trains and persists a
//! [`Pipeline`], reloads it by key, and keeps the predictions and
//! [`Evaluation`] of the last evaluation.
//!
//! ```text
//! Created ── set data / load_data ──> DataLoaded
//! DataLoaded ── train ──> Trained      DataLoaded ── load_pipeline ──> Loaded
//! Trained | Loaded | DataLoaded ── evaluate ──> Evaluated ── render_plot ──> Plotted
//! ```
//!
//! `train` and `evaluate` may be invoked again at any time; each call
//! recomputes and overwrites.

mod artifact;
mod plot;

pub use artifact::{artifact_path, plot_path, ArtifactKey, ARTIFACT_EXTENSION, PLOT_EXTENSION};
pub use plot::render_scatter;

use crate::metrics::{self, Evaluation};
use crate::model::search::{search, DEFAULT_FOLDS};
use crate::model::{
    build_pipeline, ModelParams, ModelType, Pipeline, Regressor, SearchOutcome, StandardScaler,
};
use crate::prepare::{normalize_path, permute, rng_from, AblationPolicy, PreparedData};
use crate::table::{format_float, DataColumns, Table};
use crate::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lifecycle of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No data yet
    Created,
    /// Train and/or test arrays set
    DataLoaded,
    /// Pipeline fitted and persisted
    Trained,
    /// Pipeline read from disk
    Loaded,
    /// Predictions and metrics available
    Evaluated,
    /// Scatter plot written
    Plotted,
}

/// Options of [`Session::train`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    /// Directory receiving the artifact
    pub save_dir: PathBuf,
    /// Suffix appended to the artifact name
    pub marker: String,
    /// Run the model's grid search before fitting
    pub hyperparameter_search: bool,
    /// Folds of the grid search
    pub folds: usize,
}

impl TrainOptions {
    /// Save into `save_dir` without marker or search
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::new(),
            marker: String::new(),
            hyperparameter_search: false,
            folds: DEFAULT_FOLDS,
        }
    }
}

/// Options of [`Session::evaluate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateOptions {
    /// Directory holding the artifact
    pub load_dir: PathBuf,
    /// Confidence level of the Pearson interval
    pub confidence_level: f64,
    /// Suffix of the artifact name
    pub marker: String,
}

impl EvaluateOptions {
    /// Load from `load_dir` at the default 90% confidence level
    pub fn new(load_dir: impl Into<PathBuf>) -> Self {
        Self {
            load_dir: load_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            load_dir: PathBuf::new(),
            confidence_level: 0.9,
            marker: String::new(),
        }
    }
}

/// Options of [`Session::load_data`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Fraction of rows held out for testing
    pub split: f64,
    /// Shuffle rows before scaling and splitting
    pub shuffle: bool,
    /// Seed of shuffle and split; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Identifier / label-type columns
    pub columns: DataColumns,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            split: 0.2,
            shuffle: true,
            seed: None,
            columns: DataColumns::default(),
        }
    }
}

/// Features to score with [`Session::score_unlabeled`]
#[derive(Debug, Clone)]
pub enum FeatureInput {
    /// Descriptor CSV on disk
    Path(PathBuf),
    /// Table already in memory
    Table(Table),
}

impl From<Table> for FeatureInput {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl From<PathBuf> for FeatureInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for FeatureInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for FeatureInput {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

/// One summary row, as collected by the experiment drivers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    /// Regressor
    pub model_type: ModelType,
    /// Target score
    pub score: String,
    /// Data subset tag
    pub data_tag: String,
    /// Mean absolute error
    pub mae: f64,
    /// Mean squared error
    pub mse: f64,
    /// Standard deviation of the predictions
    pub sd: f64,
    /// Pearson r
    pub r: f64,
    /// Rendered confidence interval, `[low ~ high]`
    pub confidence_interval: String,
    /// Squared r of the least-squares line
    pub r2: f64,
    /// Spearman r, when requested
    pub spearman: Option<f64>,
    /// Ablation tag
    pub ablation: String,
}

/// Stateful train/evaluate session for one model configuration
#[derive(Debug, Clone)]
pub struct Session {
    model_type: ModelType,
    score: String,
    ablation: String,
    data_tag: Option<String>,
    columns: DataColumns,
    train: Option<(Array2<f64>, Array1<f64>)>,
    test: Option<(Array2<f64>, Array1<f64>)>,
    pipeline: Option<Pipeline>,
    search_outcome: Option<SearchOutcome>,
    predictions: Option<Array1<f64>>,
    evaluation: Option<Evaluation>,
    state: SessionState,
}

impl Session {
    /// New session without data
    pub fn new(model_type: ModelType, score: impl Into<String>, ablation: impl Into<String>) -> Self {
        Self {
            model_type,
            score: score.into(),
            ablation: ablation.into(),
            data_tag: None,
            columns: DataColumns::default(),
            train: None,
            test: None,
            pipeline: None,
            search_outcome: None,
            predictions: None,
            evaluation: None,
            state: SessionState::Created,
        }
    }

    /// Override the identifier / label-type column names
    #[must_use]
    pub fn with_columns(mut self, columns: DataColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Regressor of this session
    #[must_use]
    pub const fn model_type(&self) -> ModelType {
        self.model_type
    }

    /// Target score name
    #[must_use]
    pub fn score(&self) -> &str {
        &self.score
    }

    /// Ablation tag
    #[must_use]
    pub fn ablation(&self) -> &str {
        &self.ablation
    }

    /// Data subset tag, if set
    #[must_use]
    pub fn data_tag(&self) -> Option<&str> {
        self.data_tag.as_deref()
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Set the data subset tag used in artifact names
    pub fn set_data_tag(&mut self, tag: impl Into<String>) {
        self.data_tag = Some(tag.into());
    }

    fn data_changed(&mut self) {
        self.predictions = None;
        self.evaluation = None;
        self.state = SessionState::DataLoaded;
    }

    /// Replace the training split
    pub fn set_training_data(&mut self, x: Array2<f64>, y: Array1<f64>) {
        self.train = Some((x, y));
        self.data_changed();
    }

    /// Replace the test split
    pub fn set_testing_data(&mut self, x: Array2<f64>, y: Array1<f64>) {
        self.test = Some((x, y));
        self.data_changed();
    }

    /// Take both splits from [`crate::prepare::prepare`] output
    pub fn set_prepared(&mut self, data: PreparedData) {
        let (x_train, x_test, y_train, y_test) = data.into_parts();
        self.train = Some((x_train, y_train));
        self.test = Some((x_test, y_test));
        self.data_changed();
    }

    /// Training features and targets
    #[must_use]
    pub fn training_data(&self) -> Option<(&Array2<f64>, &Array1<f64>)> {
        self.train.as_ref().map(|(x, y)| (x, y))
    }

    /// Test features and targets
    #[must_use]
    pub fn testing_data(&self) -> Option<(&Array2<f64>, &Array1<f64>)> {
        self.test.as_ref().map(|(x, y)| (x, y))
    }

    /// `(x_train, x_test, y_train, y_test)` when both splits are set
    #[must_use]
    pub fn data(&self) -> Option<(&Array2<f64>, &Array2<f64>, &Array1<f64>, &Array1<f64>)> {
        let (x_train, y_train) = self.train.as_ref()?;
        let (x_test, y_test) = self.test.as_ref()?;
        Some((x_train, x_test, y_train, y_test))
    }

    /// Predictions of the last evaluation
    #[must_use]
    pub const fn predictions(&self) -> Option<&Array1<f64>> {
        self.predictions.as_ref()
    }

    /// Metrics of the last evaluation
    #[must_use]
    pub const fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    /// Pipeline from the last train / load / evaluate
    #[must_use]
    pub const fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    /// Grid search result of the last `train` with search enabled
    #[must_use]
    pub const fn search_outcome(&self) -> Option<&SearchOutcome> {
        self.search_outcome.as_ref()
    }

    /// Artifact key of this session
    ///
    /// # Errors
    /// Returns [`Error::InvalidState`] if no data tag was set
    pub fn key(&self) -> Result<ArtifactKey> {
        let data_tag = self
            .data_tag
            .as_ref()
            .ok_or_else(|| Error::InvalidState("data tag is not set".into()))?;
        Ok(ArtifactKey::new(
            self.model_type,
            self.score.clone(),
            data_tag.clone(),
            self.ablation.clone(),
        ))
    }

    /// Load one descriptor table and one label table, scale the features
    /// and split them randomly into train and test.
    ///
    /// Labels are sorted by identifier and joined with the descriptors;
    /// the ablation policy drops descriptor columns before scaling.
    ///
    /// # Errors
    /// Returns error on unreadable files, missing columns or a split that
    /// would leave either side empty
    pub fn load_data(&mut self, features: &Path, labels: &Path, options: &LoadOptions) -> Result<()> {
        if !(options.split > 0.0 && options.split < 1.0) {
            return Err(Error::InvalidInput(format!(
                "test split must be in (0, 1), got {}",
                options.split
            )));
        }
        let columns = &options.columns;
        let features = Table::from_csv_path(normalize_path(features), &columns.identifier, &[])?;
        let labels = Table::from_csv_path(
            normalize_path(labels),
            &columns.identifier,
            &[columns.label_type.as_str()],
        )?
        .sorted_by_id()?;
        let features = features.restricted_to(&labels)?;
        let labels = labels.restricted_to(&features)?;

        let mut y = Array1::from(labels.numeric_column(&self.score)?);
        let drop = AblationPolicy::from_tag(&self.ablation).drop_list(&columns.identifier);
        let features = features.drop_columns(&drop)?;
        let mut x = features.to_matrix()?;

        let mut rng = rng_from(options.seed);
        if options.shuffle {
            let mut order: Vec<usize> = (0..x.nrows()).collect();
            order.shuffle(&mut rng);
            (x, y, _) = permute(&x, &y, features.ids(), &order);
        }

        let x = StandardScaler::fit(&x).transform(x.view());

        let n = x.nrows();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let n_test = (options.split * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(Error::InvalidInput(format!(
                "a {} test split of {n} rows leaves an empty split",
                options.split
            )));
        }
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let (test_rows, train_rows) = order.split_at(n_test);

        debug!(
            rows = n,
            train = train_rows.len(),
            test = test_rows.len(),
            "loaded single-source data"
        );
        self.train = Some((x.select(Axis(0), train_rows), y.select(Axis(0), train_rows)));
        self.test = Some((x.select(Axis(0), test_rows), y.select(Axis(0), test_rows)));
        self.data_changed();
        Ok(())
    }

    /// Fit a pipeline on the training split and persist it under the
    /// session key. Returns the artifact path.
    ///
    /// # Errors
    /// Returns error without training data or data tag, if fitting fails,
    /// or if the artifact cannot be written
    pub fn train(&mut self, options: &TrainOptions) -> Result<PathBuf> {
        let key = self.key()?;
        let (x, y) = self
            .train
            .as_ref()
            .ok_or_else(|| Error::InvalidState("training data is not set".into()))?;

        let mut outcome = None;
        let params = if options.hyperparameter_search && self.model_type.has_grid() {
            let found = search(self.model_type, x.view(), y.view(), options.folds)?;
            let best = found.best.clone();
            outcome = Some(found);
            best
        } else {
            ModelParams::default_for(self.model_type)
        };

        let mut pipeline = build_pipeline(params);
        pipeline.fit(x.view(), y.view())?;
        let rows = x.nrows();

        let path = artifact_path(&options.save_dir, &key, &options.marker);
        pipeline.save(&path)?;
        info!(
            key = %key,
            rows,
            params = %pipeline.params(),
            path = %path.display(),
            "model trained"
        );

        self.pipeline = Some(pipeline);
        self.search_outcome = outcome;
        self.state = SessionState::Trained;
        Ok(path)
    }

    /// Read the persisted pipeline of this session without training
    ///
    /// # Errors
    /// Returns error if the artifact is missing or unreadable
    pub fn load_pipeline(&mut self, load_dir: &Path, marker: &str) -> Result<&Pipeline> {
        let path = artifact_path(load_dir, &self.key()?, marker);
        let pipeline = Pipeline::load(&path)?;
        self.state = SessionState::Loaded;
        let pipeline: &Pipeline = self.pipeline.insert(pipeline);
        Ok(pipeline)
    }

    /// Reload the persisted pipeline, predict the test split and compute
    /// every metric. Returns the predictions.
    ///
    /// # Errors
    /// Returns error without test data or data tag, or if the artifact is
    /// missing
    pub fn evaluate(&mut self, options: &EvaluateOptions) -> Result<&Array1<f64>> {
        let path = artifact_path(&options.load_dir, &self.key()?, &options.marker);
        let pipeline = Pipeline::load(&path)?;
        let (x, y) = self
            .test
            .as_ref()
            .ok_or_else(|| Error::InvalidState("test data is not set".into()))?;

        let predicted = pipeline.predict(x.view())?;
        let evaluation = metrics::evaluate(&y.to_vec(), &predicted.to_vec(), options.confidence_level)?;
        info!(
            model = %self.model_type,
            score = %self.score,
            ablation = %self.ablation,
            r = evaluation.r,
            r2 = evaluation.r2,
            mae = evaluation.mae,
            "model evaluated"
        );

        self.pipeline = Some(pipeline);
        self.evaluation = Some(evaluation);
        self.state = SessionState::Evaluated;
        let predictions: &Array1<f64> = self.predictions.insert(predicted);
        Ok(predictions)
    }

    /// Predict unlabeled descriptors with the persisted (marker-less)
    /// pipeline. Returns identifiers and predictions in row order; stored
    /// metrics are left untouched.
    ///
    /// # Errors
    /// Returns error if the table cannot be read, an ablated column is
    /// missing, or the artifact is missing
    pub fn score_unlabeled(
        &self,
        features: impl Into<FeatureInput>,
        load_dir: &Path,
    ) -> Result<(Vec<String>, Array1<f64>)> {
        let table = match features.into() {
            FeatureInput::Table(table) => table,
            FeatureInput::Path(path) => {
                Table::from_csv_path(path, &self.columns.identifier, &[])?
            }
        };
        let drop = AblationPolicy::from_tag(&self.ablation).drop_list(table.identifier());
        let table = table.drop_columns(&drop)?;
        let x = table.to_matrix()?;

        let pipeline = Pipeline::load(artifact_path(load_dir, &self.key()?, ""))?;
        let predicted = pipeline.predict(x.view())?;
        debug!(rows = predicted.len(), "scored unlabeled descriptors");
        Ok((table.ids().to_vec(), predicted))
    }

    /// Summary row of the last evaluation
    ///
    /// # Errors
    /// Returns [`Error::InvalidState`] before the first evaluation
    pub fn stats(&self, include_spearman: bool) -> Result<StatsRow> {
        let evaluation = self
            .evaluation
            .as_ref()
            .ok_or_else(|| Error::InvalidState("session has not been evaluated".into()))?;
        Ok(StatsRow {
            model_type: self.model_type,
            score: self.score.clone(),
            data_tag: self.data_tag.clone().unwrap_or_default(),
            mae: evaluation.mae,
            mse: evaluation.mse,
            sd: evaluation.sd,
            r: evaluation.r,
            confidence_interval: evaluation.confidence_interval.to_string(),
            r2: evaluation.r2,
            spearman: include_spearman.then_some(evaluation.spearman),
            ablation: self.ablation.clone(),
        })
    }

    /// Write the predicted-vs-actual scatter into `dir`.
    ///
    /// The file is `{name}.svg`, or the key's default plot stem when `name`
    /// is `None`.
    ///
    /// # Errors
    /// Returns error before the first evaluation or if rendering fails
    pub fn render_plot(&mut self, dir: &Path, name: Option<&str>) -> Result<PathBuf> {
        let (Some(evaluation), Some(predicted), Some((_, y))) =
            (&self.evaluation, &self.predictions, &self.test)
        else {
            return Err(Error::InvalidState("session has not been evaluated".into()));
        };
        let path = plot_path(dir, &self.key()?, name);
        render_scatter(&path, &y.to_vec(), &predicted.to_vec(), evaluation.r2)?;
        debug!(path = %path.display(), r2 = %format_float(evaluation.r2), "plot rendered");
        self.state = SessionState::Plotted;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::fs;

    fn identity_session() -> Session {
        let mut session = Session::new(ModelType::LinearRegression, "pK", "basic");
        session.set_data_tag("identity");
        session.set_training_data(array![[1.0], [2.0], [3.0], [4.0]], array![1.0, 2.0, 3.0, 4.0]);
        session.set_testing_data(array![[5.0], [6.0]], array![5.0, 6.0]);
        session
    }

    #[test]
    fn test_identity_train_evaluate() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = identity_session();
        assert_eq!(session.state(), SessionState::DataLoaded);

        let path = session.train(&TrainOptions::new(dir.path())).unwrap();
        assert!(path.ends_with("linearRegression_pK_identity_basic.sav"));
        assert_eq!(session.state(), SessionState::Trained);

        let predicted = session.evaluate(&EvaluateOptions::new(dir.path())).unwrap().clone();
        assert!((predicted[0] - 5.0).abs() < 1e-9);
        assert!((predicted[1] - 6.0).abs() < 1e-9);

        let evaluation = session.evaluation().unwrap();
        assert!(evaluation.mae < 1e-9);
        assert!(evaluation.mse < 1e-12);
        assert_eq!(evaluation.r, 1.0);
        assert_eq!(evaluation.r2, 1.0);
        assert_eq!(session.state(), SessionState::Evaluated);
    }

    #[test]
    fn test_train_requires_data_tag() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(ModelType::Ridge, "pK", "basic");
        session.set_training_data(array![[1.0], [2.0]], array![1.0, 2.0]);
        let err = session.train(&TrainOptions::new(dir.path())).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_evaluate_without_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = identity_session();
        let err = session.evaluate(&EvaluateOptions::new(dir.path())).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(session.evaluation().is_none());
    }

    #[test]
    fn test_marker_separates_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = identity_session();
        let options = TrainOptions {
            marker: "_a".into(),
            ..TrainOptions::new(dir.path())
        };
        session.train(&options).unwrap();
        assert!(session.evaluate(&EvaluateOptions::new(dir.path())).is_err());
        let evaluate = EvaluateOptions {
            marker: "_a".into(),
            ..EvaluateOptions::new(dir.path())
        };
        assert!(session.evaluate(&evaluate).is_ok());
    }

    #[test]
    fn test_stats_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = identity_session();
        assert!(session.stats(false).is_err());
        session.train(&TrainOptions::new(dir.path())).unwrap();
        session.evaluate(&EvaluateOptions::new(dir.path())).unwrap();

        let row = session.stats(false).unwrap();
        assert_eq!(row.model_type, ModelType::LinearRegression);
        assert_eq!(row.data_tag, "identity");
        assert_eq!(row.confidence_interval, "[-1.0 ~ 1.0]");
        assert!(row.spearman.is_none());
        assert_eq!(session.stats(true).unwrap().spearman, Some(1.0));
    }

    #[test]
    fn test_score_unlabeled_drops_ablation_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(ModelType::LinearRegression, "pK", "basic-el-vdw");
        session.set_data_tag("general");
        session.set_training_data(
            array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0]],
            array![1.0, 2.0, 3.0, 4.0],
        );
        session.train(&TrainOptions::new(dir.path())).unwrap();

        let csv = dir.path().join("unlabeled.csv");
        fs::write(
            &csv,
            "PDB code, A, B, HW-HW_SUM, HW-HW_MAX\nx1,5,0,9,9\nx2,6,1,9,9\n",
        )
        .unwrap();
        let (ids, predicted) = session.score_unlabeled(csv.as_path(), dir.path()).unwrap();
        assert_eq!(ids, vec!["x1".to_string(), "x2".to_string()]);
        assert!((predicted[0] - 5.0).abs() < 1e-9);
        assert!((predicted[1] - 6.0).abs() < 1e-9);
        assert!(session.evaluation().is_none());
    }

    #[test]
    fn test_load_data_splits_and_scales() {
        let dir = tempfile::tempdir().unwrap();
        let features = dir.path().join("features.csv");
        let labels = dir.path().join("labels.csv");
        let mut feature_text = String::from("PDB code,a,b\n");
        let mut label_text = String::from("PDB code,Affinity Data Type,pK\n");
        for i in 0..10 {
            feature_text.push_str(&format!("c{i},{i},{}\n", i * 2));
            label_text.push_str(&format!("c{i},Kd,{i}.5\n"));
        }
        fs::write(&features, feature_text).unwrap();
        fs::write(&labels, label_text).unwrap();

        let mut session = Session::new(ModelType::Ridge, "pK", "unknown-tag");
        let options = LoadOptions {
            seed: Some(7),
            ..LoadOptions::default()
        };
        session.load_data(&features, &labels, &options).unwrap();
        let (x_train, x_test, y_train, y_test) = session.data().unwrap();
        assert_eq!(x_train.nrows(), 8);
        assert_eq!(x_test.nrows(), 2);
        assert_eq!(y_train.len(), 8);
        assert_eq!(y_test.len(), 2);

        let all: f64 = x_train.column(0).sum() + x_test.column(0).sum();
        assert!(all.abs() < 1e-9);
    }

    #[test]
    fn test_render_plot_after_evaluate() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = identity_session();
        assert!(session.render_plot(dir.path(), None).is_err());
        session.train(&TrainOptions::new(dir.path())).unwrap();
        session.evaluate(&EvaluateOptions::new(dir.path())).unwrap();
        let path = session.render_plot(dir.path(), None).unwrap();
        assert!(path.ends_with("identity_pK_linearRegression_basic.svg"));
        assert!(path.exists());
        assert_eq!(session.state(), SessionState::Plotted);
    }
}
