//! Property-based tests for metrics and data preparation
//!
//! - Test mathematical invariants
//! - Run with ProptestConfig::with_cases(100)

use grade_affinity::metrics::{evaluate, linregress, pearson, r_squared, spearman};
use grade_affinity::prepare::square_features;
use ndarray::Array2;
use proptest::prelude::*;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Paired samples with enough spread to avoid constant inputs
fn arb_pairs() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (3usize..40).prop_flat_map(|n| {
        (
            proptest::collection::vec(-100.0f64..100.0, n),
            proptest::collection::vec(-100.0f64..100.0, n),
        )
    })
}

fn not_constant(values: &[f64]) -> bool {
    values.iter().any(|v| (v - values[0]).abs() > 1e-6)
}

// ============================================================================
// Metric Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// R² is the square of the regression r and symmetric in its inputs
    #[test]
    fn prop_r_squared_matches_linregress((x, y) in arb_pairs()) {
        prop_assume!(not_constant(&x) && not_constant(&y));
        let fit = linregress(&x, &y).unwrap();
        let r2 = r_squared(&x, &y).unwrap();
        prop_assert!((r2 - fit.r * fit.r).abs() < 1e-9);
        prop_assert!((r2 - r_squared(&y, &x).unwrap()).abs() < 1e-9);
        prop_assert!((0.0..=1.0 + 1e-12).contains(&r2));
    }

    /// Correlations stay in [-1, 1]
    #[test]
    fn prop_correlations_bounded((x, y) in arb_pairs()) {
        prop_assume!(not_constant(&x) && not_constant(&y));
        let r = pearson(&x, &y).unwrap();
        let rho = spearman(&x, &y).unwrap();
        prop_assert!((-1.0..=1.0).contains(&r));
        prop_assert!((-1.0..=1.0 + 1e-12).contains(&rho.abs()));
    }

    /// Perfect predictions give zero error and unit correlation
    #[test]
    fn prop_identity_evaluation((x, _) in arb_pairs()) {
        prop_assume!(not_constant(&x));
        let e = evaluate(&x, &x, 0.9).unwrap();
        prop_assert_eq!(e.mae, 0.0);
        prop_assert_eq!(e.mse, 0.0);
        prop_assert_eq!(e.r, 1.0);
        prop_assert_eq!(e.r2, 1.0);
        prop_assert!(e.confidence_interval.low <= e.confidence_interval.high);
    }

    /// MSE is at least MAE² (Jensen)
    #[test]
    fn prop_mse_bounds_mae((x, y) in arb_pairs()) {
        let e = evaluate(&x, &y, 0.95);
        if let Ok(e) = e {
            prop_assert!(e.mse + 1e-9 >= e.mae * e.mae);
        }
    }
}

// ============================================================================
// Preparation Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Squared features double the columns and keep rows in order
    #[test]
    fn prop_square_features_shape(rows in 1usize..20, cols in 1usize..8, seed in 0u64..1000) {
        let x = Array2::from_shape_fn((rows, cols), |(i, j)| {
            #[allow(clippy::cast_precision_loss)]
            let v = (seed as f64).mul_add(0.01, (i * cols + j) as f64);
            v - 5.0
        });
        let squared = square_features(&x);
        prop_assert_eq!(squared.nrows(), rows);
        prop_assert_eq!(squared.ncols(), 2 * cols);
        for i in 0..rows {
            for j in 0..cols {
                prop_assert_eq!(squared[[i, j]], x[[i, j]]);
                prop_assert_eq!(squared[[i, j + cols]], x[[i, j]] * x[[i, j]]);
            }
        }
    }
}
