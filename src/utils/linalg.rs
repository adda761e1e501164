//! Dense linear algebra on ndarray types, backed by nalgebra factorizations.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

use super::matrix_convert::{
    nalgebra_to_ndarray, nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};
use crate::error::{FitError, Result};

/// A pivot this much smaller than the largest one marks the matrix as singular.
fn pivot_tolerance(n: usize) -> f64 {
    (n.max(1) as f64) * f64::EPSILON
}

fn check_square(a: &Array2<f64>) -> Result<()> {
    if a.nrows() != a.ncols() {
        return Err(FitError::DimensionMismatch(format!(
            "expected a square matrix, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    Ok(())
}

fn lu_is_singular(lu: &nalgebra::LU<f64, nalgebra::Dyn, nalgebra::Dyn>) -> bool {
    let u = lu.u();
    let pivots = u.diagonal();
    let max = pivots.iter().fold(0.0_f64, |m, p| m.max(p.abs()));
    let min = pivots.iter().fold(f64::INFINITY, |m, p| m.min(p.abs()));
    !max.is_finite() || max == 0.0 || min <= max * pivot_tolerance(pivots.len())
}

/// Solve `a · x = b` by LU decomposition with partial pivoting.
///
/// # Errors
///
/// * `FitError::SingularMatrix` if `a` is singular to working precision
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    check_square(a)?;
    if a.nrows() != b.len() {
        return Err(FitError::DimensionMismatch(format!(
            "matrix has {} rows, right-hand side has {}",
            a.nrows(),
            b.len()
        )));
    }
    let lu = ndarray_to_nalgebra(a)?.lu();
    if lu_is_singular(&lu) {
        return Err(FitError::SingularMatrix);
    }
    let x = lu
        .solve(&ndarray_vec_to_nalgebra(b)?)
        .ok_or(FitError::SingularMatrix)?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SingularMatrix);
    }
    nalgebra_vec_to_ndarray(&x)
}

/// Invert a square matrix.
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>> {
    check_square(a)?;
    let lu = ndarray_to_nalgebra(a)?.lu();
    if lu_is_singular(&lu) {
        return Err(FitError::SingularMatrix);
    }
    let inverse = lu.try_inverse().ok_or(FitError::SingularMatrix)?;
    nalgebra_to_ndarray(&inverse)
}

/// Invert a symmetric positive semi-definite matrix after equilibrating its diagonal.
///
/// Fit normal matrices often mix columns of very different scale; scaling to
/// a unit diagonal first keeps the pivot test meaningful.
pub fn invert_symmetric(a: &Array2<f64>) -> Result<Array2<f64>> {
    check_square(a)?;
    let n = a.nrows();
    let scale: Vec<f64> = (0..n).map(|i| a[[i, i]].sqrt()).collect();
    if scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
        return Err(FitError::SingularMatrix);
    }
    let scaled = DMatrix::from_fn(n, n, |i, j| a[[i, j]] / (scale[i] * scale[j]));
    let inverse = match scaled.clone().cholesky() {
        Some(cholesky) => {
            let pivots: Vec<f64> = cholesky.l_dirty().diagonal().iter().map(|d| d * d).collect();
            let max = pivots.iter().fold(0.0_f64, |m, p| m.max(*p));
            if pivots.iter().any(|p| !p.is_finite() || *p <= max * pivot_tolerance(n)) {
                return Err(FitError::SingularMatrix);
            }
            cholesky.inverse()
        }
        None => {
            let lu = scaled.lu();
            if lu_is_singular(&lu) {
                return Err(FitError::SingularMatrix);
            }
            lu.try_inverse().ok_or(FitError::SingularMatrix)?
        }
    };
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SingularMatrix);
    }
    Ok(Array2::from_shape_fn((n, n), |(i, j)| {
        inverse[(i, j)] / (scale[i] * scale[j])
    }))
}

/// `JᵀJ`.
pub fn normal_matrix(jacobian: &Array2<f64>) -> Array2<f64> {
    jacobian.t().dot(jacobian)
}

/// Parameter covariance `(JᵀJ)⁻¹` for a residual Jacobian already scaled by `√w`.
///
/// # Errors
///
/// * `FitError::SingularJacobian` if the parameters are not linearly independent
pub fn covariance(jacobian: &Array2<f64>) -> Result<Array2<f64>> {
    invert_symmetric(&normal_matrix(jacobian)).map_err(|err| match err {
        FitError::SingularMatrix => FitError::SingularJacobian,
        other => other,
    })
}

/// Weighted linear least squares: minimise `Σ wᵢ (yᵢ − (X·c)ᵢ)²`.
///
/// Returns the coefficients and the unscaled covariance `(XᵀWX)⁻¹`.
pub fn weighted_least_squares(
    design: &Array2<f64>,
    y: &[f64],
    weights: &[f64],
) -> Result<(Array1<f64>, Array2<f64>)> {
    let (n, p) = design.dim();
    if y.len() != n || weights.len() != n {
        return Err(FitError::DimensionMismatch(format!(
            "design has {} rows, y has {}, weights have {}",
            n,
            y.len(),
            weights.len()
        )));
    }
    let mut xtwx = Array2::<f64>::zeros((p, p));
    let mut xtwy = Array1::<f64>::zeros(p);
    for i in 0..n {
        let row = design.row(i);
        for a in 0..p {
            xtwy[a] += weights[i] * row[a] * y[i];
            for b in 0..p {
                xtwx[[a, b]] += weights[i] * row[a] * row[b];
            }
        }
    }
    let covariance = invert_symmetric(&xtwx).map_err(|_| FitError::SingularJacobian)?;
    let coefficients = covariance.dot(&xtwy);
    Ok((coefficients, covariance))
}
