//! Gradient-boosted regression trees (second-order, squared error)
//!
//! Each round fits a depth-limited tree to the gradients of the squared
//! loss with exact greedy split finding. Leaf weights are `−G / (H + λ)` and
//! are shrunk by the learning rate before being added to the ensemble.

use super::tree::{predict_row, Node};
use super::Regressor;
use crate::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Boosting rounds
    pub n_estimators: usize,
    /// Depth of every tree
    pub max_depth: usize,
    /// Shrinkage (eta)
    pub learning_rate: f64,
    /// L2 penalty on leaf weights (lambda)
    pub reg_lambda: f64,
    /// Minimum loss reduction for a split (gamma)
    pub min_split_loss: f64,
    /// Minimum hessian sum in a child
    pub min_child_weight: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 1000,
            max_depth: 3,
            learning_rate: 0.3,
            reg_lambda: 1.0,
            min_split_loss: 0.0,
            min_child_weight: 1.0,
        }
    }
}

/// Boosted tree ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    params: BoostingParams,
    base_score: f64,
    n_features: Option<usize>,
    trees: Vec<Vec<Node>>,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new(BoostingParams::default())
    }
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct RoundGrower<'a> {
    x: ArrayView2<'a, f64>,
    grad: &'a [f64],
    // row indices of the whole training set, sorted by each feature
    sorted: &'a [Vec<usize>],
    params: &'a BoostingParams,
}

impl RoundGrower<'_> {
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.reg_lambda)
    }

    fn best_split(&self, rows: &[usize]) -> Option<Candidate> {
        #[allow(clippy::cast_precision_loss)]
        let h_total = rows.len() as f64;
        let g_total: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let parent = self.score(g_total, h_total);

        let mut member = vec![false; self.x.nrows()];
        for &r in rows {
            member[r] = true;
        }

        let mut best: Option<Candidate> = None;
        let mut order = Vec::with_capacity(rows.len());
        for feature in 0..self.x.ncols() {
            order.clear();
            order.extend(self.sorted[feature].iter().copied().filter(|&r| member[r]));
            let mut g_left = 0.0;
            for k in 1..order.len() {
                g_left += self.grad[order[k - 1]];
                let lo = self.x[[order[k - 1], feature]];
                let hi = self.x[[order[k], feature]];
                if lo >= hi {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let (h_left, h_right) = (k as f64, h_total - k as f64);
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                    continue;
                }
                let gain = 0.5
                    * (self.score(g_left, h_left) + self.score(g_total - g_left, h_right) - parent)
                    - self.params.min_split_loss;
                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(Candidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }

    fn leaf_weight(&self, rows: &[usize]) -> f64 {
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        #[allow(clippy::cast_precision_loss)]
        let h = rows.len() as f64;
        -g / (h + self.params.reg_lambda) * self.params.learning_rate
    }

    fn grow(&self) -> Vec<Node> {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack: Vec<(usize, Vec<usize>, usize)> =
            vec![(0, (0..self.x.nrows()).collect(), 0)];
        while let Some((slot, rows, depth)) = stack.pop() {
            let split = if depth < self.params.max_depth && rows.len() >= 2 {
                self.best_split(&rows)
            } else {
                None
            };
            match split {
                Some(c) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                        .into_iter()
                        .partition(|&r| self.x[[r, c.feature]] <= c.threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes[slot] = Node::Split {
                        feature: c.feature,
                        threshold: c.threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_rows, depth + 1));
                    stack.push((left, left_rows, depth + 1));
                }
                None => {
                    nodes[slot] = Node::Leaf {
                        value: self.leaf_weight(&rows),
                    };
                }
            }
        }
        nodes
    }
}

impl GradientBoosting {
    /// Unfitted ensemble
    #[must_use]
    pub const fn new(params: BoostingParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            n_features: None,
            trees: Vec::new(),
        }
    }

    /// Hyperparameters
    #[must_use]
    pub const fn params(&self) -> &BoostingParams {
        &self.params
    }

    /// Number of fitted rounds
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn predict_one(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, nodes| acc + predict_row(nodes, row))
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(Error::Model("gradient boosting needs at least one sample".into()));
        }

        let sorted: Vec<Vec<usize>> = (0..x.ncols())
            .map(|feature| {
                let mut order: Vec<usize> = (0..x.nrows()).collect();
                order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
                order
            })
            .collect();

        self.base_score = y.mean().unwrap_or(0.0);
        let mut prediction = Array1::from_elem(y.len(), self.base_score);
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let grad: Vec<f64> = prediction.iter().zip(y.iter()).map(|(p, t)| p - t).collect();
            let grower = RoundGrower {
                x: x.view(),
                grad: &grad,
                sorted: &sorted,
                params: &self.params,
            };
            let nodes = grower.grow();
            for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                prediction[i] += predict_row(&nodes, row);
            }
            trees.push(nodes);
        }

        debug!(
            rounds = trees.len(),
            max_depth = self.params.max_depth,
            "gradient boosting fitted"
        );
        self.trees = trees;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let n_features = self
            .n_features
            .ok_or_else(|| Error::InvalidState("gradient boosting is not fitted".into()))?;
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
    use ndarray::Array2;

    #[test]
    fn test_boosting_reduces_training_error() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            #[allow(clippy::cast_precision_loss)]
            let v = (i + j * 7) as f64;
            (v * 0.3).sin()
        });
        let y = x.column(0).mapv(|v| v * v) + x.column(1);
        let mut model = GradientBoosting::new(BoostingParams {
            n_estimators: 50,
            ..BoostingParams::default()
        });
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.n_trees(), 50);

        let predicted = model.predict(x.view()).unwrap();
        let mse = (&predicted - &y).mapv(|d| d * d).mean().unwrap();
        let baseline = y.var(0.0);
        assert!(mse < baseline * 0.1, "mse {mse} baseline {baseline}");
    }

    #[test]
    fn test_fit_with_short_lived_targets() {
        let x = Array2::from_shape_fn((8, 1), |(i, _)| f64::from(u32::try_from(i).unwrap()));
        let mut model = GradientBoosting::new(BoostingParams {
            n_estimators: 10,
            ..BoostingParams::default()
        });
        {
            let targets: Vec<f64> = (0..8).map(|i| if i < 4 { 1.0 } else { 3.0 }).collect();
            model.fit(x.view(), ArrayView1::from(&targets[..])).unwrap();
        }
        assert_eq!(model.n_trees(), 10);
        let predicted = model.predict(x.view()).unwrap();
        assert!(predicted[0] < predicted[7]);
    }

    #[test]
    fn test_constant_target_predicts_mean() {
        let x = Array2::from_shape_fn((5, 1), |(i, _)| {
            #[allow(clippy::cast_precision_loss)]
            let v = i as f64;
            v
        });
        let y = Array1::from_elem(5, 2.5);
        let mut model = GradientBoosting::new(BoostingParams {
            n_estimators: 5,
            ..BoostingParams::default()
        });
        model.fit(x.view(), y.view()).unwrap();
        let predicted = model.predict(x.view()).unwrap();
        assert!(predicted.iter().all(|p| (p - 2.5).abs() < 1e-12));
    }
}
