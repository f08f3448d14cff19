//! Per-feature standardization

use super::linalg::column_means;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Removes the mean and divides by the population standard deviation of
/// each feature. Constant features keep a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit on the rows of `x`
    #[must_use]
    pub fn fit(x: &Array2<f64>) -> Self {
        Self::fit_view(x.view())
    }

    /// Fit on a view
    #[must_use]
    pub fn fit_view(x: ArrayView2<'_, f64>) -> Self {
        let mean = column_means(x);
        let scale = if x.nrows() == 0 {
            Array1::ones(x.ncols())
        } else {
            x.std_axis(Axis(0), 0.0)
                .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s })
        };
        Self { mean, scale }
    }

    /// Per-feature means
    #[must_use]
    pub const fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-feature scales
    #[must_use]
    pub const fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// Number of features seen during fit
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize `x`
    #[must_use]
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let scaler = StandardScaler::fit(&x);
        assert_eq!(scaler.mean(), &array![2.0, 5.0]);
        assert_eq!(scaler.scale(), &array![1.0, 1.0]);

        let z = scaler.transform(x.view());
        assert_eq!(z, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_population_std() {
        let x = array![[0.0], [0.0], [4.0], [4.0]];
        let scaler = StandardScaler::fit(&x);
        assert!((scaler.scale()[0] - 2.0).abs() < f64::EPSILON);
    }
}
