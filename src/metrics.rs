//! Evaluation statistics for predicted vs. measured affinities
//!
//! - MAE, MSE and the population standard deviation of the predictions
//! - Pearson r with a Fisher-z confidence interval
//! - Spearman rank correlation (average ranks for ties)
//! - R², the squared Pearson r of the least-squares line through the points

use crate::table::format_float;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;

/// Round half away from zero to `decimals` places
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn check_pair(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::InvalidInput(format!(
            "length mismatch: {} measured vs {} predicted values",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Err(Error::InvalidInput("no values to evaluate".into()));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean absolute error
///
/// # Errors
/// Returns error on empty or unequal inputs
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let diffs: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).collect();
    Ok(mean(&diffs))
}

/// Mean squared error
///
/// # Errors
/// Returns error on empty or unequal inputs
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let diffs: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| (t - p) * (t - p)).collect();
    Ok(mean(&diffs))
}

/// Population standard deviation (NaN for an empty slice)
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let squares: Vec<f64> = values.iter().map(|v| (v - m) * (v - m)).collect();
    mean(&squares).sqrt()
}

/// Pearson correlation coefficient; NaN if either input is constant
///
/// # Errors
/// Returns error on empty or unequal inputs
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    check_pair(x, y)?;
    let mean_x = mean(x);
    let mean_y = mean(y);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return Ok(f64::NAN);
    }
    Ok((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Two-sided Fisher-z confidence interval of a Pearson r over `n` pairs.
///
/// Three or fewer pairs carry no information: the interval is `[-1, 1]`.
///
/// # Errors
/// Returns error if `level` is not in (0, 1)
pub fn pearson_confidence_interval(r: f64, n: usize, level: f64) -> Result<(f64, f64)> {
    if !(level > 0.0 && level < 1.0) {
        return Err(Error::InvalidInput(format!(
            "confidence level must be in (0, 1), got {level}"
        )));
    }
    if n <= 3 {
        return Ok((-1.0, 1.0));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| Error::Other(e.to_string()))?;
    let z_crit = normal.inverse_cdf((1.0 + level) / 2.0);
    #[allow(clippy::cast_precision_loss)]
    let se = 1.0 / ((n - 3) as f64).sqrt();
    let z = r.atanh();
    Ok(((z - z_crit * se).tanh(), (z + z_crit * se).tanh()))
}

/// 1-based ranks, ties share their average rank
#[must_use]
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Spearman rank correlation
///
/// # Errors
/// Returns error on empty or unequal inputs
pub fn spearman(x: &[f64], y: &[f64]) -> Result<f64> {
    check_pair(x, y)?;
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Least-squares line through `(x, y)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    /// Slope
    pub slope: f64,
    /// Intercept
    pub intercept: f64,
    /// Pearson r of the fit
    pub r: f64,
}

/// Fit `y = slope · x + intercept`
///
/// # Errors
/// Returns error on empty or unequal inputs
pub fn linregress(x: &[f64], y: &[f64]) -> Result<LineFit> {
    check_pair(x, y)?;
    let mean_x = mean(x);
    let mean_y = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mean_x) * (b - mean_y);
        sxx += (a - mean_x) * (a - mean_x);
    }
    let slope = if sxx == 0.0 { f64::NAN } else { sxy / sxx };
    Ok(LineFit {
        slope,
        intercept: mean_y - slope * mean_x,
        r: pearson(x, y)?,
    })
}

/// Coefficient of determination of the least-squares line (`r²`)
///
/// # Errors
/// Returns error on empty or unequal inputs
pub fn r_squared(x: &[f64], y: &[f64]) -> Result<f64> {
    let fit = linregress(x, y)?;
    Ok(fit.r * fit.r)
}

/// Confidence interval of a Pearson r, already rounded for reporting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound (3 decimals)
    pub low: f64,
    /// Upper bound (3 decimals)
    pub high: f64,
    /// Confidence level, e.g. 0.9
    pub level: f64,
}

impl fmt::Display for ConfidenceInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} ~ {}]", format_float(self.low), format_float(self.high))
    }
}

/// Statistics of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean absolute error
    pub mae: f64,
    /// Mean squared error
    pub mse: f64,
    /// Population standard deviation of the predictions
    pub sd: f64,
    /// Pearson r (6 decimals)
    pub r: f64,
    /// Confidence interval of `r`
    pub confidence_interval: ConfidenceInterval,
    /// Spearman r (6 decimals)
    pub spearman: f64,
    /// Squared r of the least-squares line (6 decimals)
    pub r2: f64,
    /// Number of evaluated pairs
    pub n: usize,
}

/// Compute every statistic for measured values `y_true` and predictions
/// `y_pred`.
///
/// # Errors
/// Returns error on empty or unequal inputs or an invalid confidence level
pub fn evaluate(y_true: &[f64], y_pred: &[f64], confidence_level: f64) -> Result<Evaluation> {
    let raw_r = pearson(y_true, y_pred)?;
    let (low, high) = pearson_confidence_interval(raw_r, y_true.len(), confidence_level)?;
    Ok(Evaluation {
        mae: mean_absolute_error(y_true, y_pred)?,
        mse: mean_squared_error(y_true, y_pred)?,
        sd: std_dev(y_pred),
        r: round_to(raw_r, 6),
        confidence_interval: ConfidenceInterval {
            low: round_to(low, 3),
            high: round_to(high, 3),
            level: confidence_level,
        },
        spearman: round_to(spearman(y_true, y_pred)?, 6),
        r2: round_to(r_squared(y_true, y_pred)?, 6),
        n: y_true.len(),
    })
}
