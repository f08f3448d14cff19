//! Random forest of bootstrapped regression trees
//!
//! Every tree owns an RNG seeded from the forest seed and its index, so the
//! fitted forest is identical whether trees are grown in parallel (`rayon`
//! feature) or sequentially.

use super::tree::{Criterion, DecisionTree, MaxFeatures, TreeParams};
use super::Regressor;
use crate::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Random forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Split quality measure of every tree
    pub criterion: Criterion,
    /// Features examined per split
    pub max_features: MaxFeatures,
    /// Depth limit of every tree
    pub max_depth: Option<usize>,
    /// Draw a bootstrap sample per tree
    pub bootstrap: bool,
    /// Forest seed
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            criterion: Criterion::SquaredError,
            max_features: MaxFeatures::Auto,
            max_depth: None,
            bootstrap: true,
            seed: 0,
        }
    }
}

/// Seed of tree `index` (splitmix64 step, keeps neighbouring seeds apart)
fn tree_seed(seed: u64, index: usize) -> u64 {
    let mut z = seed.wrapping_add((index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Bagged ensemble of [`DecisionTree`]s
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl RandomForest {
    /// Unfitted forest
    #[must_use]
    pub const fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
        }
    }

    /// Hyperparameters
    #[must_use]
    pub const fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fitted trees
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    fn fit_tree(
        &self,
        index: usize,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<DecisionTree> {
        let mut rng = StdRng::seed_from_u64(tree_seed(self.params.seed, index));
        let mut tree = DecisionTree::new(TreeParams {
            criterion: self.params.criterion,
            max_features: self.params.max_features,
            max_depth: self.params.max_depth,
            seed: rng.gen(),
            ..TreeParams::default()
        });

        if self.params.bootstrap {
            let n = x.nrows();
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let xs = x.select(Axis(0), &rows);
            let ys = y.select(Axis(0), &rows);
            if self.params.criterion == Criterion::Poisson && ys.sum() <= 0.0 {
                // all-zero bootstrap sample: constant tree
                let zeros = DecisionTree::new(TreeParams {
                    criterion: Criterion::SquaredError,
                    ..*tree.params()
                });
                tree = zeros;
            }
            tree.fit(xs.view(), ys.view())?;
        } else {
            tree.fit(x, y)?;
        }
        Ok(tree)
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(Error::Model("random forest needs at least one sample".into()));
        }
        if self.params.n_estimators == 0 {
            return Err(Error::InvalidInput("n_estimators must be positive".into()));
        }
        if self.params.criterion == Criterion::Poisson && y.iter().any(|&v| v < 0.0) {
            return Err(Error::Model(
                "Some value(s) of y are negative which is not allowed for Poisson regression"
                    .into(),
            ));
        }

        let this = &*self;

        #[cfg(feature = "rayon")]
        let trees = (0..this.params.n_estimators)
            .into_par_iter()
            .map(|i| this.fit_tree(i, x, y))
            .collect::<Result<Vec<_>>>()?;

        #[cfg(not(feature = "rayon"))]
        let trees = (0..this.params.n_estimators)
            .map(|i| this.fit_tree(i, x, y))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            n_estimators = trees.len(),
            criterion = %self.params.criterion,
            "random forest fitted"
        );
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(Error::InvalidState("random forest is not fitted".into()));
        }
        let mut total = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict(x)?;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.trees.len() as f64;
        Ok(total / count)
    }
}
