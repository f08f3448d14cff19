//! Linear regressors: ordinary least squares, ridge, lasso, elastic net
//!
//! All of them fit an unpenalized intercept by centering `x` and `y`.
//! Ridge selects its penalty by leave-one-out error; lasso and elastic net
//! select theirs by k-fold cross-validation over a geometric penalty path,
//! solved with cyclic coordinate descent and warm starts.

use super::linalg::{center, solve_spd, solve_spd_many};
use super::search::kfold;
use super::Regressor;
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coefficients and intercept of a fitted linear model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// Per-feature weights
    pub coef: Array1<f64>,
    /// Intercept
    pub intercept: f64,
}

impl LinearFit {
    fn from_centered(coef: Array1<f64>, x_mean: &Array1<f64>, y_mean: f64) -> Self {
        let intercept = y_mean - x_mean.dot(&coef);
        Self { coef, intercept }
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coef.len() {
            return Err(Error::InvalidInput(format!(
                "model was fitted on {} features, got {}",
                self.coef.len(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.coef) + self.intercept)
    }
}

fn require_samples(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, min: usize) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(Error::InvalidInput(format!(
            "{} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() < min {
        return Err(Error::Model(format!(
            "at least {min} samples required, got {}",
            x.nrows()
        )));
    }
    Ok(())
}

fn not_fitted(name: &str) -> Error {
    Error::InvalidState(format!("{name} is not fitted"))
}

// ---------------------------------------------------------------------------
// Ordinary least squares
// ---------------------------------------------------------------------------

/// Ordinary least squares with intercept
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    fit: Option<LinearFit>,
}

impl LinearRegression {
    /// Unfitted model
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted coefficients
    #[must_use]
    pub const fn fitted(&self) -> Option<&LinearFit> {
        self.fit.as_ref()
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        require_samples(x, y, 1)?;
        let (xc, yc, x_mean, y_mean) = center(x, y);
        let gram = xc.t().dot(&xc);
        let rhs = xc.t().dot(&yc);
        let coef = solve_spd(&gram, rhs.view())?;
        self.fit = Some(LinearFit::from_centered(coef, &x_mean, y_mean));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.fit
            .as_ref()
            .ok_or_else(|| not_fitted("LinearRegression"))?
            .predict(x)
    }
}

// ---------------------------------------------------------------------------
// Ridge with leave-one-out penalty selection
// ---------------------------------------------------------------------------

/// Ridge regression, penalty chosen by leave-one-out squared error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeCv {
    alphas: Vec<f64>,
    alpha: Option<f64>,
    fit: Option<LinearFit>,
}

impl Default for RidgeCv {
    fn default() -> Self {
        Self::new(vec![0.1, 1.0, 10.0])
    }
}

impl RidgeCv {
    /// Unfitted model over the given candidate penalties
    #[must_use]
    pub const fn new(alphas: Vec<f64>) -> Self {
        Self {
            alphas,
            alpha: None,
            fit: None,
        }
    }

    /// Selected penalty after fitting
    #[must_use]
    pub const fn alpha(&self) -> Option<f64> {
        self.alpha
    }

    /// Fitted coefficients
    #[must_use]
    pub const fn fitted(&self) -> Option<&LinearFit> {
        self.fit.as_ref()
    }

    /// Mean squared leave-one-out error and centered coefficients for `alpha`.
    ///
    /// The hat matrix of the centered problem plus `1/n` accounts for the
    /// unpenalized intercept.
    fn loo_error(xc: &Array2<f64>, yc: &Array1<f64>, alpha: f64) -> Result<(f64, Array1<f64>)> {
        let n = xc.nrows();
        let p = xc.ncols();
        let mut gram = xc.t().dot(xc);
        gram.diag_mut().mapv_inplace(|v| v + alpha);
        let solved = solve_spd_many(&gram, xc.t())?; // p x n
        let coef = solved.dot(yc);
        let residuals = yc - &xc.dot(&coef);

        #[allow(clippy::cast_precision_loss)]
        let inv_n = 1.0 / n as f64;
        let mut total = 0.0;
        for i in 0..n {
            let mut leverage = inv_n;
            for j in 0..p {
                leverage += xc[[i, j]] * solved[[j, i]];
            }
            let denom = 1.0 - leverage;
            let err = if denom.abs() < 1e-12 {
                f64::INFINITY
            } else {
                residuals[i] / denom
            };
            total += err * err;
        }
        Ok((total * inv_n, coef))
    }
}

impl Regressor for RidgeCv {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        require_samples(x, y, 2)?;
        if self.alphas.is_empty() {
            return Err(Error::InvalidInput("RidgeCv needs at least one alpha".into()));
        }
        let (xc, yc, x_mean, y_mean) = center(x, y);

        let mut best: Option<(f64, f64, Array1<f64>)> = None;
        for &alpha in &self.alphas {
            let (error, coef) = Self::loo_error(&xc, &yc, alpha)?;
            debug!(alpha, error, "ridge leave-one-out");
            if best.as_ref().map_or(true, |(_, e, _)| error < *e) {
                best = Some((alpha, error, coef));
            }
        }
        let (alpha, _, coef) =
            best.ok_or_else(|| Error::Model("no ridge penalty evaluated".into()))?;
        self.alpha = Some(alpha);
        self.fit = Some(LinearFit::from_centered(coef, &x_mean, y_mean));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.fit
            .as_ref()
            .ok_or_else(|| not_fitted("RidgeCv"))?
            .predict(x)
    }
}

// ---------------------------------------------------------------------------
// Lasso / elastic net with cross-validated penalty path
// ---------------------------------------------------------------------------

/// Settings of a cross-validated coordinate-descent model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyPathParams {
    /// Mix between L1 (1.0, lasso) and L2 penalty
    pub l1_ratio: f64,
    /// Length of the penalty path
    pub n_alphas: usize,
    /// `alpha_min / alpha_max`
    pub eps: f64,
    /// Number of folds
    pub cv: usize,
    /// Duality-gap tolerance
    pub tol: f64,
    /// Coordinate-descent sweeps per penalty
    pub max_iter: usize,
}

impl PenaltyPathParams {
    /// Lasso defaults
    #[must_use]
    pub const fn lasso() -> Self {
        Self {
            l1_ratio: 1.0,
            n_alphas: 100,
            eps: 1e-3,
            cv: 5,
            tol: 1e-4,
            max_iter: 1000,
        }
    }

    /// Elastic-net defaults of the benchmark
    #[must_use]
    pub const fn elastic_net() -> Self {
        Self {
            l1_ratio: 0.5,
            n_alphas: 1000,
            eps: 1e-4,
            cv: 10,
            tol: 1e-5,
            max_iter: 3000,
        }
    }
}

/// Lasso or elastic net with the penalty chosen by k-fold cross-validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticNetCv {
    params: PenaltyPathParams,
    alpha: Option<f64>,
    fit: Option<LinearFit>,
}

impl ElasticNetCv {
    /// Unfitted model
    #[must_use]
    pub const fn new(params: PenaltyPathParams) -> Self {
        Self {
            params,
            alpha: None,
            fit: None,
        }
    }

    /// Lasso with default settings
    #[must_use]
    pub const fn lasso() -> Self {
        Self::new(PenaltyPathParams::lasso())
    }

    /// Elastic net with the benchmark settings
    #[must_use]
    pub const fn elastic_net() -> Self {
        Self::new(PenaltyPathParams::elastic_net())
    }

    /// Settings
    #[must_use]
    pub const fn params(&self) -> &PenaltyPathParams {
        &self.params
    }

    /// Selected penalty after fitting
    #[must_use]
    pub const fn alpha(&self) -> Option<f64> {
        self.alpha
    }

    /// Fitted coefficients
    #[must_use]
    pub const fn fitted(&self) -> Option<&LinearFit> {
        self.fit.as_ref()
    }

    /// Descending geometric penalty path for centered data
    fn alpha_path(&self, xc: &Array2<f64>, yc: &Array1<f64>) -> Vec<f64> {
        let n = xc.nrows().max(1);
        let xy = xc.t().dot(yc);
        let max_xy = xy.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        #[allow(clippy::cast_precision_loss)]
        let mut alpha_max = max_xy / (n as f64 * self.params.l1_ratio.max(1e-3));
        if alpha_max <= f64::EPSILON {
            alpha_max = f64::EPSILON;
        }
        let count = self.params.n_alphas.max(1);
        if count == 1 {
            return vec![alpha_max];
        }
        let hi = alpha_max.log10();
        let lo = (alpha_max * self.params.eps).log10();
        #[allow(clippy::cast_precision_loss)]
        let path = (0..count)
            .map(|i| 10f64.powf(hi - (hi - lo) * i as f64 / (count - 1) as f64))
            .collect();
        path
    }
}

/// One penalty of the coordinate-descent solver on centered data.
///
/// Minimizes `0.5 ||y - Xw||² + n·α·ρ ||w||₁ + 0.5 n·α·(1-ρ) ||w||²`,
/// starting from (and updating) `w`.
fn coordinate_descent(
    xc: &Array2<f64>,
    yc: &Array1<f64>,
    column_norms: &Array1<f64>,
    alpha: f64,
    params: &PenaltyPathParams,
    w: &mut Array1<f64>,
) {
    #[allow(clippy::cast_precision_loss)]
    let n = xc.nrows() as f64;
    let l1 = alpha * params.l1_ratio * n;
    let l2 = alpha * (1.0 - params.l1_ratio) * n;
    let tol = params.tol * yc.dot(yc);

    let mut residual = yc - &xc.dot(&*w);
    for _ in 0..params.max_iter {
        let mut w_max = 0.0_f64;
        let mut d_w_max = 0.0_f64;
        for j in 0..w.len() {
            if column_norms[j] == 0.0 {
                continue;
            }
            let column = xc.column(j);
            let old = w[j];
            let rho = column.dot(&residual) + column_norms[j] * old;
            let new = rho.signum() * (rho.abs() - l1).max(0.0) / (column_norms[j] + l2);
            if new != old {
                residual.scaled_add(old - new, &column);
            }
            w[j] = new;
            d_w_max = d_w_max.max((new - old).abs());
            w_max = w_max.max(new.abs());
        }

        if (w_max == 0.0 || d_w_max / w_max < params.tol)
            && duality_gap(xc, yc, &residual, w, l1, l2) < tol
        {
            break;
        }
    }
}

fn duality_gap(
    xc: &Array2<f64>,
    yc: &Array1<f64>,
    residual: &Array1<f64>,
    w: &Array1<f64>,
    l1: f64,
    l2: f64,
) -> f64 {
    let xt_a = xc.t().dot(residual) - &(w * l2);
    let dual_norm = xt_a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let r_norm2 = residual.dot(residual);
    let w_norm2 = w.dot(w);
    let (scale, mut gap) = if dual_norm > l1 {
        let scale = l1 / dual_norm;
        (scale, 0.5 * r_norm2 * (1.0 + scale * scale))
    } else {
        (1.0, r_norm2)
    };
    let l1_norm: f64 = w.iter().map(|v| v.abs()).sum();
    gap += l1 * l1_norm - scale * residual.dot(yc) + 0.5 * l2 * (1.0 + scale * scale) * w_norm2;
    gap
}

fn column_norms(xc: &Array2<f64>) -> Array1<f64> {
    xc.map_axis(Axis(0), |c| c.dot(&c))
}

impl Regressor for ElasticNetCv {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        let folds = self.params.cv.max(2);
        require_samples(x, y, folds)?;
        let (xc, yc, x_mean, y_mean) = center(x, y);
        let alphas = self.alpha_path(&xc, &yc);

        let mut errors = vec![0.0; alphas.len()];
        for (train, test) in kfold(x.nrows(), folds) {
            let x_train = x.select(Axis(0), &train);
            let y_train = y.select(Axis(0), &train);
            let x_test = x.select(Axis(0), &test);
            let y_test = y.select(Axis(0), &test);

            let (fold_xc, fold_yc, fold_x_mean, fold_y_mean) =
                center(x_train.view(), y_train.view());
            let norms = column_norms(&fold_xc);
            let mut w = Array1::zeros(x.ncols());
            for (k, &alpha) in alphas.iter().enumerate() {
                coordinate_descent(&fold_xc, &fold_yc, &norms, alpha, &self.params, &mut w);
                let fit = LinearFit::from_centered(w.clone(), &fold_x_mean, fold_y_mean);
                let predicted = fit.predict(x_test.view())?;
                let mse = (&predicted - &y_test).mapv(|d| d * d).mean().unwrap_or(0.0);
                errors[k] += mse;
            }
        }

        let (best, _) = errors
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |(bi, be), (i, &e)| {
                if e < be {
                    (i, e)
                } else {
                    (bi, be)
                }
            });
        let alpha = alphas[best];
        debug!(alpha, l1_ratio = self.params.l1_ratio, "penalty selected by cross-validation");

        let norms = column_norms(&xc);
        let mut w = Array1::zeros(x.ncols());
        coordinate_descent(&xc, &yc, &norms, alpha, &self.params, &mut w);
        self.alpha = Some(alpha);
        self.fit = Some(LinearFit::from_centered(w, &x_mean, y_mean));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.fit
            .as_ref()
            .ok_or_else(|| not_fitted("ElasticNetCv"))?
            .predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| {
            #[allow(clippy::cast_precision_loss)]
            let v = i as f64;
            if j == 0 {
                v
            } else {
                (v * 0.7).sin()
            }
        });
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        (x, y)
    }

    #[test]
    fn test_ols_recovers_line() {
        let (x, y) = line();
        let mut model = LinearRegression::new();
        model.fit(x.view(), y.view()).unwrap();
        let fit = model.fitted().unwrap();
        assert!((fit.coef[0] - 2.0).abs() < 1e-9);
        assert!(fit.coef[1].abs() < 1e-9);
        assert!((fit.intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ols_predict_before_fit() {
        let model = LinearRegression::new();
        let err = model.predict(array![[1.0]].view()).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_ols_feature_count_checked() {
        let (x, y) = line();
        let mut model = LinearRegression::new();
        model.fit(x.view(), y.view()).unwrap();
        assert!(model.predict(array![[1.0]].view()).is_err());
    }

    #[test]
    fn test_ridge_selects_from_candidates() {
        let (x, y) = line();
        let mut model = RidgeCv::default();
        model.fit(x.view(), y.view()).unwrap();
        let alpha = model.alpha().unwrap();
        assert!([0.1, 1.0, 10.0].contains(&alpha));
        // noiseless data: the smallest penalty wins
        assert!((alpha - 0.1).abs() < f64::EPSILON);
        let predicted = model.predict(x.view()).unwrap();
        assert!((predicted[10] - y[10]).abs() < 0.1);
    }

    #[test]
    fn test_lasso_zeroes_noise_feature() {
        let (x, y) = line();
        let mut model = ElasticNetCv::lasso();
        model.fit(x.view(), y.view()).unwrap();
        let fit = model.fitted().unwrap();
        assert!((fit.coef[0] - 2.0).abs() < 0.05);
        assert!(fit.coef[1].abs() < 0.05);
    }

    #[test]
    fn test_elastic_net_needs_enough_samples_for_folds() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut model = ElasticNetCv::elastic_net();
        assert!(model.fit(x.view(), y.view()).is_err());
    }

    #[test]
    fn test_alpha_path_is_descending() {
        let (x, y) = line();
        let (xc, yc, _, _) = center(x.view(), y.view());
        let model = ElasticNetCv::lasso();
        let path = model.alpha_path(&xc, &yc);
        assert_eq!(path.len(), 100);
        assert!(path.windows(2).all(|w| w[0] > w[1]));
        assert!((path[99] / path[0] - 1e-3).abs() < 1e-9);
    }
}
