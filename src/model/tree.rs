//! CART regression trees
//!
//! Nodes live in a flat arena; a split sends rows with
//! `x[feature] <= threshold` to the left child. Trees are grown with an
//! explicit work stack, so unbounded depth cannot overflow the call stack.

use super::Regressor;
use crate::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Split quality measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Variance reduction, mean leaves
    SquaredError,
    /// Variance reduction with Friedman's improvement score
    FriedmanMse,
    /// Absolute deviation around the median, median leaves
    AbsoluteError,
    /// Half Poisson deviance; targets must be non-negative
    Poisson,
}

impl Criterion {
    /// All criteria, in grid-search order
    pub const ALL: [Self; 4] = [
        Self::SquaredError,
        Self::FriedmanMse,
        Self::AbsoluteError,
        Self::Poisson,
    ];

    /// Name used in grids and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SquaredError => "squared_error",
            Self::FriedmanMse => "friedman_mse",
            Self::AbsoluteError => "absolute_error",
            Self::Poisson => "poisson",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown criterion '{s}'")))
    }
}

/// Threshold search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Splitter {
    /// Every midpoint between consecutive distinct values
    Best,
    /// One uniformly drawn threshold per candidate feature
    Random,
}

impl Splitter {
    /// Both strategies, in grid-search order
    pub const ALL: [Self; 2] = [Self::Best, Self::Random];
}

impl fmt::Display for Splitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Best => "best",
            Self::Random => "random",
        })
    }
}

/// Number of features examined per split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// All features
    Auto,
    /// `floor(sqrt(n_features))`
    Sqrt,
    /// `floor(log2(n_features))`
    Log2,
}

impl MaxFeatures {
    /// All rules, in grid-search order
    pub const ALL: [Self; 3] = [Self::Auto, Self::Sqrt, Self::Log2];

    /// Feature count for a dataset with `n_features` columns (at least 1)
    #[must_use]
    pub fn resolve(self, n_features: usize) -> usize {
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let count = match self {
            Self::Auto => n_features,
            Self::Sqrt => (n_features as f64).sqrt().floor() as usize,
            Self::Log2 => (n_features as f64).log2().floor() as usize,
        };
        count.clamp(1, n_features.max(1))
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Sqrt => "sqrt",
            Self::Log2 => "log2",
        })
    }
}

/// Decision tree hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Split quality measure
    pub criterion: Criterion,
    /// Threshold search strategy
    pub splitter: Splitter,
    /// Features examined per split
    pub max_features: MaxFeatures,
    /// Depth limit (`None` grows until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum rows to attempt a split
    pub min_samples_split: usize,
    /// Minimum rows in each child
    pub min_samples_leaf: usize,
    /// Seed for feature sampling and random thresholds
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::SquaredError,
            splitter: Splitter::Best,
            max_features: MaxFeatures::Auto,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 0,
        }
    }
}

/// Arena node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Terminal prediction
    Leaf {
        /// Predicted value
        value: f64,
    },
    /// Internal split
    Split {
        /// Column index
        feature: usize,
        /// Rows with `x[feature] <= threshold` go left
        threshold: f64,
        /// Arena index of the left child
        left: usize,
        /// Arena index of the right child
        right: usize,
    },
}

/// Walk an arena from the root
pub(crate) fn predict_row(nodes: &[Node], row: ArrayView1<'_, f64>) -> f64 {
    let mut index = 0;
    loop {
        match nodes.get(index) {
            Some(Node::Leaf { value }) => return *value,
            Some(Node::Split {
                feature,
                threshold,
                left,
                right,
            }) => {
                index = if row[*feature] <= *threshold { *left } else { *right };
            }
            None => return f64::NAN,
        }
    }
}

/// Chosen split of one node
struct Split {
    feature: usize,
    threshold: f64,
    score: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Sum of absolute deviations from the median of every prefix of `ys`
/// (`costs[k]` covers the first `k` values).
fn prefix_abs_dev(ys: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = Vec::with_capacity(ys.len());
    let mut costs = Vec::with_capacity(ys.len() + 1);
    costs.push(0.0);
    for &y in ys {
        let at = sorted.partition_point(|v| *v < y);
        sorted.insert(at, y);
        let med = {
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        };
        costs.push(sorted.iter().map(|v| (v - med).abs()).sum());
    }
    costs
}

/// Larger is better. `None` marks an inadmissible split.
fn split_score(
    criterion: Criterion,
    left: (f64, usize),
    right: (f64, usize),
    abs_dev: Option<(f64, f64)>,
) -> Option<f64> {
    let (sum_l, n_l) = left;
    let (sum_r, n_r) = right;
    #[allow(clippy::cast_precision_loss)]
    let (nl, nr) = (n_l as f64, n_r as f64);
    match criterion {
        Criterion::SquaredError => Some(sum_l * sum_l / nl + sum_r * sum_r / nr),
        Criterion::FriedmanMse => {
            let diff = sum_l / nl - sum_r / nr;
            Some(nl * nr * diff * diff / (nl + nr))
        }
        Criterion::AbsoluteError => abs_dev.map(|(l, r)| -(l + r)),
        Criterion::Poisson => {
            if sum_l <= 0.0 || sum_r <= 0.0 {
                None
            } else {
                Some(sum_l * (sum_l / nl).ln() + sum_r * (sum_r / nr).ln())
            }
        }
    }
}

/// Tree grower over one training set
struct Grower<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    params: TreeParams,
    n_candidates: usize,
    rng: StdRng,
}

impl Grower<'_> {
    fn leaf_value(&self, rows: &[usize]) -> f64 {
        let mut values: Vec<f64> = rows.iter().map(|&r| self.y[r]).collect();
        match self.params.criterion {
            Criterion::AbsoluteError => median(&mut values),
            _ => mean(&values),
        }
    }

    fn is_pure(&self, rows: &[usize]) -> bool {
        let first = self.y[rows[0]];
        rows.iter().all(|&r| self.y[r] == first)
    }

    fn best_threshold(&self, feature: usize, rows: &[usize]) -> Option<Split> {
        let mut pairs: Vec<(f64, f64)> = rows
            .iter()
            .map(|&r| (self.x[[r, feature]], self.y[r]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let n = pairs.len();
        let min_leaf = self.params.min_samples_leaf.max(1);

        let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let (left_dev, right_dev) = if self.params.criterion == Criterion::AbsoluteError {
            let left = prefix_abs_dev(&ys);
            let reversed: Vec<f64> = ys.iter().rev().copied().collect();
            let right = prefix_abs_dev(&reversed);
            (left, right)
        } else {
            (Vec::new(), Vec::new())
        };

        let total: f64 = ys.iter().sum();
        let mut sum_left = 0.0;
        let mut best: Option<Split> = None;
        for k in 1..n {
            sum_left += ys[k - 1];
            if pairs[k - 1].0 >= pairs[k].0 || k < min_leaf || n - k < min_leaf {
                continue;
            }
            let abs_dev = if left_dev.is_empty() {
                None
            } else {
                Some((left_dev[k], right_dev[n - k]))
            };
            let Some(score) = split_score(
                self.params.criterion,
                (sum_left, k),
                (total - sum_left, n - k),
                abs_dev,
            ) else {
                continue;
            };
            if best.as_ref().map_or(true, |b| score > b.score) {
                let (lo, hi) = (pairs[k - 1].0, pairs[k].0);
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    score,
                });
            }
        }
        best
    }

    fn random_threshold(&mut self, feature: usize, rows: &[usize]) -> Option<Split> {
        let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
            let v = self.x[[r, feature]];
            (lo.min(v), hi.max(v))
        });
        if lo >= hi {
            return None;
        }
        let threshold = self.rng.gen_range(lo..hi);

        let mut left_y = Vec::new();
        let mut right_y = Vec::new();
        for &r in rows {
            if self.x[[r, feature]] <= threshold {
                left_y.push(self.y[r]);
            } else {
                right_y.push(self.y[r]);
            }
        }
        let min_leaf = self.params.min_samples_leaf.max(1);
        if left_y.len() < min_leaf || right_y.len() < min_leaf {
            return None;
        }
        let abs_dev = (self.params.criterion == Criterion::AbsoluteError).then(|| {
            let l = prefix_abs_dev(&left_y);
            let r = prefix_abs_dev(&right_y);
            (l[left_y.len()], r[right_y.len()])
        });
        let score = split_score(
            self.params.criterion,
            (left_y.iter().sum(), left_y.len()),
            (right_y.iter().sum(), right_y.len()),
            abs_dev,
        )?;
        Some(Split {
            feature,
            threshold,
            score,
        })
    }

    fn find_split(&mut self, rows: &[usize], depth: usize) -> Option<Split> {
        if rows.len() < self.params.min_samples_split.max(2)
            || self.params.max_depth.is_some_and(|d| depth >= d)
            || self.is_pure(rows)
        {
            return None;
        }

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        let (candidates, _) = features.partial_shuffle(&mut self.rng, self.n_candidates);
        let candidates = candidates.to_vec();

        let mut best: Option<Split> = None;
        for feature in candidates {
            let split = match self.params.splitter {
                Splitter::Best => self.best_threshold(feature, rows),
                Splitter::Random => self.random_threshold(feature, rows),
            };
            if let Some(split) = split {
                if best.as_ref().map_or(true, |b| split.score > b.score) {
                    best = Some(split);
                }
            }
        }
        best
    }

    fn grow(mut self) -> Vec<Node> {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack: Vec<(usize, Vec<usize>, usize)> =
            vec![(0, (0..self.x.nrows()).collect(), 0)];

        while let Some((slot, rows, depth)) = stack.pop() {
            if let Some(split) = self.find_split(&rows, depth) {
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                    .into_iter()
                    .partition(|&r| self.x[[r, split.feature]] <= split.threshold);
                let left = nodes.len();
                let right = left + 1;
                nodes.push(Node::Leaf { value: 0.0 });
                nodes.push(Node::Leaf { value: 0.0 });
                nodes[slot] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
                stack.push((right, right_rows, depth + 1));
                stack.push((left, left_rows, depth + 1));
            } else {
                nodes[slot] = Node::Leaf {
                    value: self.leaf_value(&rows),
                };
            }
        }
        nodes
    }
}

/// Single regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    params: TreeParams,
    n_features: Option<usize>,
    nodes: Vec<Node>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(TreeParams::default())
    }
}

impl DecisionTree {
    /// Unfitted tree
    #[must_use]
    pub const fn new(params: TreeParams) -> Self {
        Self {
            params,
            n_features: None,
            nodes: Vec::new(),
        }
    }

    /// Hyperparameters
    #[must_use]
    pub const fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Node arena (empty before fitting)
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of leaves
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub(crate) fn predict_one(&self, row: ArrayView1<'_, f64>) -> f64 {
        predict_row(&self.nodes, row)
    }
}

impl Regressor for DecisionTree {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(Error::Model("decision tree needs at least one sample".into()));
        }
        if self.params.criterion == Criterion::Poisson {
            if y.iter().any(|&v| v < 0.0) {
                return Err(Error::Model(
                    "Some value(s) of y are negative which is not allowed for Poisson regression"
                        .into(),
                ));
            }
            if y.sum() <= 0.0 {
                return Err(Error::Model(
                    "Sum of y is not positive which is necessary for Poisson regression".into(),
                ));
            }
        }

        let grower = Grower {
            x: x.view(),
            y: y.view(),
            params: self.params,
            n_candidates: self.params.max_features.resolve(x.ncols()),
            rng: StdRng::seed_from_u64(self.params.seed),
        };
        self.nodes = grower.grow();
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let n_features = self
            .n_features
            .ok_or_else(|| Error::InvalidState("decision tree is not fitted".into()))?;
        if x.ncols() != n_features {
            return Err(Error::InvalidInput(format!(
                "model was fitted on {n_features} features, got {}",
                x.ncols()
            )));
        }
        Ok(x.map_axis(Axis(1), |row| self.predict_one(row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn step() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        (x, y)
    }

    #[test]
    fn test_tree_learns_step() {
        let (x, y) = step();
        let mut tree = DecisionTree::default();
        tree.fit(x.view(), y.view()).unwrap();
        assert_eq!(tree.n_leaves(), 2);
        let predicted = tree.predict(array![[2.5], [4.5]].view()).unwrap();
        assert_eq!(predicted.to_vec(), vec![1.0, 5.0]);
    }

    #[test]
    fn test_fit_accepts_views_with_unrelated_lifetimes() {
        let (x, _) = step();
        let mut tree = DecisionTree::default();
        {
            let targets = vec![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
            tree.fit(x.view(), ArrayView1::from(&targets[..])).unwrap();
        }
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_every_criterion_fits_step() {
        let (x, y) = step();
        for criterion in Criterion::ALL {
            let mut tree = DecisionTree::new(TreeParams {
                criterion,
                ..TreeParams::default()
            });
            tree.fit(x.view(), y.view()).unwrap();
            let predicted = tree.predict(x.view()).unwrap();
            assert_eq!(predicted, y, "criterion {criterion}");
        }
    }

    #[test]
    fn test_unbounded_tree_interpolates_training_set() {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| {
            #[allow(clippy::cast_precision_loss)]
            let v = (i * (j + 3)) as f64;
            v.sin()
        });
        let y = x.column(0).mapv(|v| v * 3.0) + x.column(1);
        let mut tree = DecisionTree::default();
        tree.fit(x.view(), y.view()).unwrap();
        let predicted = tree.predict(x.view()).unwrap();
        for (p, t) in predicted.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-12);
        }
    }

    #[test]
    fn test_max_depth_limits_leaves() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| {
            #[allow(clippy::cast_precision_loss)]
            let v = i as f64;
            v
        });
        let y = x.column(0).to_owned();
        let mut tree = DecisionTree::new(TreeParams {
            max_depth: Some(2),
            ..TreeParams::default()
        });
        tree.fit(x.view(), y.view()).unwrap();
        assert_eq!(tree.n_leaves(), 4);
    }

    #[test]
    fn test_poisson_rejects_negative_targets() {
        let x = array![[1.0], [2.0]];
        let y = array![-1.0, 2.0];
        let mut tree = DecisionTree::new(TreeParams {
            criterion: Criterion::Poisson,
            ..TreeParams::default()
        });
        assert!(matches!(tree.fit(x.view(), y.view()), Err(Error::Model(_))));
    }

    #[test]
    fn test_random_splitter_is_seeded() {
        let (x, y) = step();
        let params = TreeParams {
            splitter: Splitter::Random,
            seed: 11,
            ..TreeParams::default()
        };
        let mut a = DecisionTree::new(params);
        let mut b = DecisionTree::new(params);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a.nodes(), b.nodes());
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Auto.resolve(30), 30);
        assert_eq!(MaxFeatures::Sqrt.resolve(30), 5);
        assert_eq!(MaxFeatures::Log2.resolve(30), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
    }

    #[test]
    fn test_prefix_abs_dev() {
        let costs = prefix_abs_dev(&[1.0, 3.0, 2.0]);
        assert_eq!(costs, vec![0.0, 0.0, 2.0, 2.0]);
    }
}
