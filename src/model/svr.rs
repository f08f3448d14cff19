//! Epsilon-insensitive support vector regression
//!
//! The dual problem
//!
//! ```text
//! min  ½ βᵀ(K + 1)β − yᵀβ + ε‖β‖₁   subject to  −C ≤ βᵢ ≤ C
//! ```
//!
//! is solved by cyclic coordinate descent. Adding 1 to every kernel entry
//! folds the bias into the kernel, which removes the equality constraint
//! `Σβ = 0`; the bias of the decision function is then `Σβ`.

use super::Regressor;
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Kernel function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    /// `⟨x, z⟩`
    Linear,
    /// `(γ⟨x, z⟩ + coef0)^degree`
    Poly,
    /// `exp(−γ‖x − z‖²)`
    Rbf,
    /// `tanh(γ⟨x, z⟩ + coef0)`
    Sigmoid,
}

impl Kernel {
    /// All kernels, in grid-search order
    pub const ALL: [Self; 4] = [Self::Linear, Self::Poly, Self::Rbf, Self::Sigmoid];

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Poly => "poly",
            Self::Rbf => "rbf",
            Self::Sigmoid => "sigmoid",
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kernel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown kernel '{s}'")))
    }
}

/// Kernel coefficient rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gamma {
    /// `1 / (n_features · Var(X))`
    Scale,
    /// `1 / n_features`
    Auto,
    /// Fixed value
    Value(f64),
}

impl Gamma {
    /// Resolve against training data
    #[must_use]
    pub fn resolve(self, x: ArrayView2<'_, f64>) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n_features = x.ncols().max(1) as f64;
        match self {
            Self::Scale => {
                let var = x.var(0.0);
                if var > 0.0 && var.is_finite() {
                    1.0 / (n_features * var)
                } else {
                    1.0
                }
            }
            Self::Auto => 1.0 / n_features,
            Self::Value(v) => v,
        }
    }
}

impl fmt::Display for Gamma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale => f.write_str("scale"),
            Self::Auto => f.write_str("auto"),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

/// SVR hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvrParams {
    /// Kernel function
    pub kernel: Kernel,
    /// Box constraint
    pub c: f64,
    /// Half-width of the insensitive tube
    pub epsilon: f64,
    /// Kernel coefficient for poly, rbf and sigmoid
    pub gamma: Gamma,
    /// Polynomial degree
    pub degree: u32,
    /// Independent term of poly and sigmoid kernels
    pub coef0: f64,
    /// Stopping tolerance on the largest coefficient update
    pub tol: f64,
    /// Maximum number of sweeps over the training set
    pub max_iter: usize,
}

impl Default for SvrParams {
    fn default() -> Self {
        Self {
            kernel: Kernel::Rbf,
            c: 1.0,
            epsilon: 0.1,
            gamma: Gamma::Scale,
            degree: 3,
            coef0: 0.0,
            tol: 1e-3,
            max_iter: 10_000,
        }
    }
}

impl SvrParams {
    /// Kernel value with a resolved `gamma`
    fn kernel(&self, gamma: f64, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self.kernel {
            Kernel::Linear => a.dot(&b),
            Kernel::Poly => {
                let base = gamma.mul_add(a.dot(&b), self.coef0);
                #[allow(clippy::cast_possible_wrap)]
                let degree = self.degree as i32;
                base.powi(degree)
            }
            Kernel::Rbf => {
                let dist2: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum();
                (-gamma * dist2).exp()
            }
            Kernel::Sigmoid => gamma.mul_add(a.dot(&b), self.coef0).tanh(),
        }
    }
}

/// Support vectors and their dual coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SvrFit {
    gamma: f64,
    support_vectors: Array2<f64>,
    dual_coef: Array1<f64>,
    intercept: f64,
}

/// Support vector regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Svr {
    params: SvrParams,
    fit: Option<SvrFit>,
}

impl Default for Svr {
    fn default() -> Self {
        Self::new(SvrParams::default())
    }
}

impl Svr {
    /// Unfitted model
    #[must_use]
    pub const fn new(params: SvrParams) -> Self {
        Self { params, fit: None }
    }

    /// Hyperparameters
    #[must_use]
    pub const fn params(&self) -> &SvrParams {
        &self.params
    }

    /// Number of support vectors after fitting
    #[must_use]
    pub fn n_support(&self) -> usize {
        self.fit.as_ref().map_or(0, |f| f.dual_coef.len())
    }

    /// Kernel matrix of the training set plus the bias term
    fn gram(&self, x: ArrayView2<'_, f64>, gamma: f64) -> Array2<f64> {
        let n = x.nrows();
        let mut q = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in 0..=i {
                let value = self.params.kernel(gamma, x.row(i), x.row(j)) + 1.0;
                q[[i, j]] = value;
                q[[j, i]] = value;
            }
        }
        q
    }
}

impl Regressor for Svr {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(Error::Model("SVR needs at least one sample".into()));
        }
        let params = self.params;
        if params.c <= 0.0 {
            return Err(Error::InvalidInput(format!("C must be positive, got {}", params.c)));
        }

        let gamma = params.gamma.resolve(x);
        let q = self.gram(x, gamma);
        let n = x.nrows();

        let mut beta = Array1::<f64>::zeros(n);
        // q_beta = (K + 1) β
        let mut q_beta = Array1::<f64>::zeros(n);
        let mut sweeps = 0;
        for sweep in 0..params.max_iter {
            sweeps = sweep + 1;
            let mut max_delta = 0.0_f64;
            for i in 0..n {
                let qii = q[[i, i]];
                if qii <= 0.0 {
                    continue;
                }
                let old = beta[i];
                let gradient = q_beta[i] - y[i];
                let target = qii.mul_add(old, -gradient);
                let shrunk = target.signum() * (target.abs() - params.epsilon).max(0.0) / qii;
                let new = shrunk.clamp(-params.c, params.c);
                let delta = new - old;
                if delta != 0.0 {
                    q_beta.scaled_add(delta, &q.row(i));
                    beta[i] = new;
                    max_delta = max_delta.max(delta.abs());
                }
            }
            if max_delta < params.tol {
                break;
            }
        }

        let support: Vec<usize> = (0..n).filter(|&i| beta[i] != 0.0).collect();
        let intercept = beta.sum();
        debug!(
            kernel = %params.kernel,
            sweeps,
            n_support = support.len(),
            "svr fitted"
        );

        self.fit = Some(SvrFit {
            gamma,
            support_vectors: x.select(Axis(0), &support),
            dual_coef: beta.select(Axis(0), &support),
            intercept,
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let fit = self
            .fit
            .as_ref()
            .ok_or_else(|| Error::InvalidState("SVR is not fitted".into()))?;
        if fit.support_vectors.nrows() > 0 && x.ncols() != fit.support_vectors.ncols() {
            return Err(Error::InvalidInput(format!(
                "model was fitted on {} features, got {}",
                fit.support_vectors.ncols(),
                x.ncols()
            )));
        }
        Ok(x.map_axis(Axis(1), |row| {
            fit.support_vectors
                .axis_iter(Axis(0))
                .zip(fit.dual_coef.iter())
                .map(|(sv, coef)| coef * self.params.kernel(fit.gamma, sv, row))
                .sum::<f64>()
                + fit.intercept
        }))
    }
}
