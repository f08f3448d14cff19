//! Exhaustive k-fold grid search
//!
//! Candidates are scored by mean R² over unshuffled folds. A candidate
//! whose fit fails on any fold scores NaN and is ignored; the first
//! candidate with the best score wins.

use super::{
    Criterion, ForestParams, Gamma, Kernel, MaxFeatures, ModelParams, ModelType, Regressor,
    Splitter, SvrParams, TreeParams,
};
use crate::{Error, Result};
use ndarray::{ArrayView1, ArrayView2, Axis};
use tracing::{debug, info, warn};

/// Folds used by [`search`]
pub const DEFAULT_FOLDS: usize = 5;

/// Result of a grid search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Best candidate (defaults when the model has no grid)
    pub best: ModelParams,
    /// Mean cross-validated R² of the best candidate (NaN without a grid)
    pub best_score: f64,
    /// Number of candidates evaluated
    pub evaluated: usize,
}

/// Contiguous k-fold split of `n` rows: `(train, test)` index pairs.
///
/// The first `n % k` folds hold one extra row.
#[must_use]
pub fn kfold(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    let k = k.max(1).min(n.max(1));
    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let test: Vec<usize> = (start..start + size).collect();
        let train: Vec<usize> = (0..start).chain(start + size..n).collect();
        folds.push((train, test));
        start += size;
    }
    folds
}

/// Coefficient of determination `1 − SS_res / SS_tot`.
///
/// A constant target scores 1 for a perfect prediction, 0 otherwise.
#[must_use]
pub fn r2_score(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Hyperparameter grid of a model type (`None` if it has none)
#[must_use]
pub fn grid(model_type: ModelType) -> Option<Vec<ModelParams>> {
    let defaults = ModelParams::default_for(model_type);
    match (model_type, defaults) {
        (ModelType::Svr, ModelParams::Svr(base)) => Some(svr_grid(base)),
        (ModelType::DecisionTree, ModelParams::DecisionTree(base)) => Some(tree_grid(base)),
        (ModelType::RandomForest, ModelParams::RandomForest(base)) => Some(forest_grid(base)),
        _ => None,
    }
}

fn svr_grid(base: SvrParams) -> Vec<ModelParams> {
    let mut out = Vec::new();
    for kernel in Kernel::ALL {
        for c in [1.0, 2.5, 5.0] {
            for gamma in [Gamma::Scale, Gamma::Auto] {
                for degree in [2, 3, 4] {
                    for epsilon in [0.001, 0.01, 0.1, 1.0, 10.0, 100.0] {
                        out.push(ModelParams::Svr(SvrParams {
                            kernel,
                            c,
                            gamma,
                            degree,
                            epsilon,
                            ..base
                        }));
                    }
                }
            }
        }
    }
    out
}

fn tree_grid(base: TreeParams) -> Vec<ModelParams> {
    let mut out = Vec::new();
    for criterion in Criterion::ALL {
        for splitter in Splitter::ALL {
            for max_features in MaxFeatures::ALL {
                out.push(ModelParams::DecisionTree(TreeParams {
                    criterion,
                    splitter,
                    max_features,
                    ..base
                }));
            }
        }
    }
    out
}

fn forest_grid(base: ForestParams) -> Vec<ModelParams> {
    let mut out = Vec::new();
    for n_estimators in [100, 200, 300] {
        for criterion in Criterion::ALL {
            for max_features in MaxFeatures::ALL {
                out.push(ModelParams::RandomForest(ForestParams {
                    n_estimators,
                    criterion,
                    max_features,
                    ..base
                }));
            }
        }
    }
    out
}

/// Mean R² of one candidate over `folds`, NaN if any fold fails to fit
fn cross_val_score(
    params: &ModelParams,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    folds: &[(Vec<usize>, Vec<usize>)],
) -> f64 {
    let mut total = 0.0;
    for (train, test) in folds {
        let mut estimator = params.build();
        let x_train = x.select(Axis(0), train);
        let y_train = y.select(Axis(0), train);
        if let Err(err) = estimator.fit(x_train.view(), y_train.view()) {
            debug!(candidate = %params, error = %err, "candidate failed to fit");
            return f64::NAN;
        }
        let x_test = x.select(Axis(0), test);
        let y_test = y.select(Axis(0), test);
        match estimator.predict(x_test.view()) {
            Ok(predicted) => total += r2_score(y_test.view(), predicted.view()),
            Err(_) => return f64::NAN,
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let count = folds.len() as f64;
    total / count
}

/// Select hyperparameters for `model_type` by grid search.
///
/// Models without a grid return their defaults without fitting anything.
///
/// # Errors
/// Returns error if there are fewer rows than folds or every candidate failed
pub fn search(
    model_type: ModelType,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    n_folds: usize,
) -> Result<SearchOutcome> {
    let Some(candidates) = grid(model_type) else {
        return Ok(SearchOutcome {
            best: ModelParams::default_for(model_type),
            best_score: f64::NAN,
            evaluated: 0,
        });
    };
    if x.nrows() < n_folds || n_folds < 2 {
        return Err(Error::InvalidInput(format!(
            "cannot run {n_folds}-fold search on {} samples",
            x.nrows()
        )));
    }

    let folds = kfold(x.nrows(), n_folds);
    let mut best: Option<(usize, f64)> = None;
    let mut failed = 0;
    for (index, params) in candidates.iter().enumerate() {
        let score = cross_val_score(params, x, y, &folds);
        if score.is_nan() {
            failed += 1;
            continue;
        }
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((index, score));
        }
    }
    if failed > 0 {
        warn!(
            model = %model_type,
            failed,
            total = candidates.len(),
            "grid candidates failed and were ignored"
        );
    }

    let (index, best_score) = best.ok_or_else(|| {
        Error::Model(format!("every {model_type} grid candidate failed to fit"))
    })?;
    let best = candidates[index].clone();
    info!(model = %model_type, params = %best, score = best_score, "grid search finished");
    Ok(SearchOutcome {
        best,
        best_score,
        evaluated: candidates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    #[test]
    fn test_kfold_sizes() {
        let folds = kfold(12, 5);
        let sizes: Vec<usize> = folds.iter().map(|(_, t)| t.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2, 2]);
        assert_eq!(folds[0].1, vec![0, 1, 2]);
        assert_eq!(folds[1].0.len(), 9);
        assert!(!folds[1].0.contains(&3));
    }

    #[test]
    fn test_r2_score() {
        let y = array![1.0, 2.0, 3.0];
        assert!((r2_score(y.view(), y.view()) - 1.0).abs() < f64::EPSILON);
        let mean = array![2.0, 2.0, 2.0];
        assert!(r2_score(y.view(), mean.view()).abs() < f64::EPSILON);
        let constant = array![4.0, 4.0];
        assert!((r2_score(constant.view(), constant.view()) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_grid_sizes() {
        assert_eq!(grid(ModelType::Svr).unwrap().len(), 4 * 3 * 2 * 3 * 6);
        assert_eq!(grid(ModelType::DecisionTree).unwrap().len(), 4 * 2 * 3);
        assert_eq!(grid(ModelType::RandomForest).unwrap().len(), 3 * 4 * 3);
        assert!(grid(ModelType::Ridge).is_none());
    }

    #[test]
    fn test_search_without_grid_returns_defaults() {
        let x = Array2::<f64>::zeros((3, 1));
        let y = Array1::<f64>::zeros(3);
        let outcome = search(ModelType::Lasso, x.view(), y.view(), DEFAULT_FOLDS).unwrap();
        assert_eq!(outcome.best, ModelParams::default_for(ModelType::Lasso));
        assert_eq!(outcome.evaluated, 0);
    }

    #[test]
    fn test_tree_search_skips_poisson_on_negative_targets() {
        #[allow(clippy::cast_precision_loss)]
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = x.column(0).mapv(|v| v - 10.0);
        let outcome = search(ModelType::DecisionTree, x.view(), y.view(), 5).unwrap();
        match outcome.best {
            ModelParams::DecisionTree(p) => assert_ne!(p.criterion, Criterion::Poisson),
            other => panic!("unexpected params {other:?}"),
        }
        assert!(outcome.best_score.is_finite());
    }

    #[test]
    fn test_search_needs_rows_for_folds() {
        let x = Array2::<f64>::zeros((3, 1));
        let y = Array1::<f64>::zeros(3);
        assert!(search(ModelType::DecisionTree, x.view(), y.view(), 5).is_err());
    }
}
