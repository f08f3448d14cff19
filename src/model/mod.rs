//! Regressors, preprocessing and model selection
//!
//! ## Model Types
//!
//! | Name | Estimator |
//! |------|-----------|
//! | `linearRegression` | [`LinearRegression`] |
//! | `Ridge` | [`RidgeCv`] |
//! | `Lasso` | [`ElasticNetCv::lasso`] |
//! | `ElasticNet` | [`ElasticNetCv::elastic_net`] |
//! | `SVR` | [`Svr`] |
//! | `DecisionTree` | [`DecisionTree`] |
//! | `RandomForest` | [`RandomForest`] |
//! | `XGBoost` | [`GradientBoosting`] |
//!
//! A [`Pipeline`] standardizes features before the estimator and is the unit
//! that gets persisted.

mod boosting;
mod forest;
mod linalg;
mod linear;
mod pipeline;
mod scaler;
pub mod search;
mod svr;
mod tree;

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use linear::{ElasticNetCv, LinearFit, LinearRegression, PenaltyPathParams, RidgeCv};
pub use pipeline::{build_pipeline, Pipeline};
pub use scaler::StandardScaler;
pub use search::{search, SearchOutcome};
pub use svr::{Gamma, Kernel, Svr, SvrParams};
pub use tree::{Criterion, DecisionTree, MaxFeatures, Node, Splitter, TreeParams};

use crate::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seed of the randomized estimators (trees, forests)
pub const DEFAULT_SEED: u64 = 0;

/// Fit / predict interface shared by every estimator
pub trait Regressor {
    /// Fit on rows of `x` with targets `y`
    ///
    /// # Errors
    /// Returns error if shapes disagree or the estimator cannot be fitted
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()>;

    /// Predict one value per row of `x`
    ///
    /// # Errors
    /// Returns error if the estimator is unfitted or the feature count differs
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;
}

/// Symbolic regressor name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    /// Ordinary least squares
    #[serde(rename = "linearRegression")]
    LinearRegression,
    /// Ridge with leave-one-out penalty selection
    Ridge,
    /// Cross-validated lasso
    Lasso,
    /// Cross-validated elastic net
    ElasticNet,
    /// Support vector regression
    #[serde(rename = "SVR")]
    Svr,
    /// Single CART tree
    DecisionTree,
    /// Bagged trees
    RandomForest,
    /// Gradient-boosted trees
    #[serde(rename = "XGBoost")]
    XgBoost,
}

impl ModelType {
    /// Every model type, in benchmark order
    pub const ALL: [Self; 8] = [
        Self::LinearRegression,
        Self::Ridge,
        Self::Lasso,
        Self::ElasticNet,
        Self::Svr,
        Self::DecisionTree,
        Self::RandomForest,
        Self::XgBoost,
    ];

    /// Name used in artifact paths and result tables
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LinearRegression => "linearRegression",
            Self::Ridge => "Ridge",
            Self::Lasso => "Lasso",
            Self::ElasticNet => "ElasticNet",
            Self::Svr => "SVR",
            Self::DecisionTree => "DecisionTree",
            Self::RandomForest => "RandomForest",
            Self::XgBoost => "XGBoost",
        }
    }

    /// Whether [`search`] has a hyperparameter grid for this model
    #[must_use]
    pub const fn has_grid(self) -> bool {
        matches!(self, Self::Svr | Self::DecisionTree | Self::RandomForest)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::UnknownModelType(s.to_string()))
    }
}

/// Hyperparameters of one estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", content = "params")]
pub enum ModelParams {
    /// OLS has no hyperparameters
    #[serde(rename = "linearRegression")]
    LinearRegression,
    /// Candidate ridge penalties
    Ridge {
        /// Penalties compared by leave-one-out error
        alphas: Vec<f64>,
    },
    /// Lasso path settings
    Lasso(PenaltyPathParams),
    /// Elastic-net path settings
    ElasticNet(PenaltyPathParams),
    /// SVR settings
    #[serde(rename = "SVR")]
    Svr(SvrParams),
    /// Tree settings
    DecisionTree(TreeParams),
    /// Forest settings
    RandomForest(ForestParams),
    /// Boosting settings
    #[serde(rename = "XGBoost")]
    XgBoost(BoostingParams),
}

impl ModelParams {
    /// Default hyperparameters of a model type
    #[must_use]
    pub fn default_for(model_type: ModelType) -> Self {
        match model_type {
            ModelType::LinearRegression => Self::LinearRegression,
            ModelType::Ridge => Self::Ridge {
                alphas: vec![0.1, 1.0, 10.0],
            },
            ModelType::Lasso => Self::Lasso(PenaltyPathParams::lasso()),
            ModelType::ElasticNet => Self::ElasticNet(PenaltyPathParams::elastic_net()),
            ModelType::Svr => Self::Svr(SvrParams::default()),
            ModelType::DecisionTree => Self::DecisionTree(TreeParams {
                seed: DEFAULT_SEED,
                ..TreeParams::default()
            }),
            ModelType::RandomForest => Self::RandomForest(ForestParams {
                seed: DEFAULT_SEED,
                ..ForestParams::default()
            }),
            ModelType::XgBoost => Self::XgBoost(BoostingParams::default()),
        }
    }

    /// Model type these parameters belong to
    #[must_use]
    pub const fn model_type(&self) -> ModelType {
        match self {
            Self::LinearRegression => ModelType::LinearRegression,
            Self::Ridge { .. } => ModelType::Ridge,
            Self::Lasso(_) => ModelType::Lasso,
            Self::ElasticNet(_) => ModelType::ElasticNet,
            Self::Svr(_) => ModelType::Svr,
            Self::DecisionTree(_) => ModelType::DecisionTree,
            Self::RandomForest(_) => ModelType::RandomForest,
            Self::XgBoost(_) => ModelType::XgBoost,
        }
    }

    /// Unfitted estimator
    #[must_use]
    pub fn build(&self) -> Estimator {
        match self {
            Self::LinearRegression => Estimator::LinearRegression(LinearRegression::new()),
            Self::Ridge { alphas } => Estimator::Ridge(RidgeCv::new(alphas.clone())),
            Self::Lasso(p) => Estimator::Lasso(ElasticNetCv::new(*p)),
            Self::ElasticNet(p) => Estimator::ElasticNet(ElasticNetCv::new(*p)),
            Self::Svr(p) => Estimator::Svr(Svr::new(*p)),
            Self::DecisionTree(p) => Estimator::DecisionTree(DecisionTree::new(*p)),
            Self::RandomForest(p) => Estimator::RandomForest(RandomForest::new(*p)),
            Self::XgBoost(p) => Estimator::XgBoost(GradientBoosting::new(*p)),
        }
    }
}

impl fmt::Display for ModelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Svr(p) => write!(
                f,
                "kernel={}, C={}, gamma={}, degree={}, epsilon={}",
                p.kernel, p.c, p.gamma, p.degree, p.epsilon
            ),
            Self::DecisionTree(p) => write!(
                f,
                "criterion={}, splitter={}, max_features={}",
                p.criterion, p.splitter, p.max_features
            ),
            Self::RandomForest(p) => write!(
                f,
                "n_estimators={}, criterion={}, max_features={}",
                p.n_estimators, p.criterion, p.max_features
            ),
            other => write!(f, "{} defaults", other.model_type()),
        }
    }
}

/// Any supported estimator (fitted or not)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", content = "state")]
pub enum Estimator {
    /// OLS
    #[serde(rename = "linearRegression")]
    LinearRegression(LinearRegression),
    /// Ridge
    Ridge(RidgeCv),
    /// Lasso
    Lasso(ElasticNetCv),
    /// Elastic net
    ElasticNet(ElasticNetCv),
    /// SVR
    #[serde(rename = "SVR")]
    Svr(Svr),
    /// Decision tree
    DecisionTree(DecisionTree),
    /// Random forest
    RandomForest(RandomForest),
    /// Gradient boosting
    #[serde(rename = "XGBoost")]
    XgBoost(GradientBoosting),
}

impl Estimator {
    /// Model type of this estimator
    #[must_use]
    pub const fn model_type(&self) -> ModelType {
        match self {
            Self::LinearRegression(_) => ModelType::LinearRegression,
            Self::Ridge(_) => ModelType::Ridge,
            Self::Lasso(_) => ModelType::Lasso,
            Self::ElasticNet(_) => ModelType::ElasticNet,
            Self::Svr(_) => ModelType::Svr,
            Self::DecisionTree(_) => ModelType::DecisionTree,
            Self::RandomForest(_) => ModelType::RandomForest,
            Self::XgBoost(_) => ModelType::XgBoost,
        }
    }

    fn as_regressor(&self) -> &dyn Regressor {
        match self {
            Self::LinearRegression(m) => m,
            Self::Ridge(m) => m,
            Self::Lasso(m) | Self::ElasticNet(m) => m,
            Self::Svr(m) => m,
            Self::DecisionTree(m) => m,
            Self::RandomForest(m) => m,
            Self::XgBoost(m) => m,
        }
    }

    fn as_regressor_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Self::LinearRegression(m) => m,
            Self::Ridge(m) => m,
            Self::Lasso(m) | Self::ElasticNet(m) => m,
            Self::Svr(m) => m,
            Self::DecisionTree(m) => m,
            Self::RandomForest(m) => m,
            Self::XgBoost(m) => m,
        }
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        self.as_regressor_mut().fit(x, y)
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.as_regressor().predict(x)
    }
}
