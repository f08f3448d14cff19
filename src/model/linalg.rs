//! Small dense linear algebra helpers (normal equations only)

use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix,
/// `None` if a pivot is not positive
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut diag = a[[j, j]];
        for k in 0..j {
            diag -= l[[j, k]] * l[[j, k]];
        }
        if !diag.is_finite() || diag <= 0.0 {
            return None;
        }
        let diag = diag.sqrt();
        l[[j, j]] = diag;
        for i in (j + 1)..n {
            let mut value = a[[i, j]];
            for k in 0..j {
                value -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = value / diag;
        }
    }
    Some(l)
}

fn cholesky_solve(l: &Array2<f64>, b: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut value = b[i];
        for k in 0..i {
            value -= l[[i, k]] * z[k];
        }
        z[i] = value / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut value = z[i];
        for k in (i + 1)..n {
            value -= l[[k, i]] * x[k];
        }
        x[i] = value / l[[i, i]];
    }
    x
}

/// Factorize `a`, adding a growing diagonal jitter when it is only
/// positive semi-definite (collinear features).
fn factorize(a: &Array2<f64>) -> Result<Array2<f64>> {
    if let Some(l) = cholesky(a) {
        return Ok(l);
    }
    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
    let mut jitter = scale * 1e-12;
    while jitter < scale {
        let mut shifted = a.clone();
        shifted.diag_mut().mapv_inplace(|v| v + jitter);
        if let Some(l) = cholesky(&shifted) {
            return Ok(l);
        }
        jitter *= 10.0;
    }
    Err(Error::Model(
        "normal equations are not positive definite".to_string(),
    ))
}

/// Solve `a x = b` for symmetric positive (semi-)definite `a`
pub fn solve_spd(a: &Array2<f64>, b: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    let l = factorize(a)?;
    Ok(cholesky_solve(&l, b))
}

/// Solve `a X = B` column by column
pub fn solve_spd_many(a: &Array2<f64>, b: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    let l = factorize(a)?;
    let mut out = Array2::<f64>::zeros(b.raw_dim());
    for (j, column) in b.axis_iter(Axis(1)).enumerate() {
        out.column_mut(j).assign(&cholesky_solve(&l, column));
    }
    Ok(out)
}

/// Column means
pub fn column_means(x: ArrayView2<'_, f64>) -> Array1<f64> {
    x.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()))
}

/// Centered copies of `x` and `y` with their means
pub fn center(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
    let x_mean = column_means(x);
    let y_mean = y.mean().unwrap_or(0.0);
    let xc = &x - &x_mean;
    let yc = y.mapv(|v| v - y_mean);
    (xc, yc, x_mean, y_mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_spd() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = solve_spd(&a, b.view()).unwrap();
        let back = a.dot(&x);
        assert!((back[0] - 2.0).abs() < 1e-12);
        assert!((back[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_gets_jitter() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        let b = array![2.0, 2.0];
        let x = solve_spd(&a, b.view()).unwrap();
        assert!((x[0] + x[1] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_center() {
        let x = array![[1.0], [3.0]];
        let y = array![2.0, 4.0];
        let (xc, yc, xm, ym) = center(x.view(), y.view());
        assert!((xm[0] - 2.0).abs() < f64::EPSILON);
        assert!((ym - 3.0).abs() < f64::EPSILON);
        assert!((xc[[0, 0]] + 1.0).abs() < f64::EPSILON);
        assert!((yc[1] - 1.0).abs() < f64::EPSILON);
    }
}
