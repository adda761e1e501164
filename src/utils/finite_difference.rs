//! Finite difference methods for numerical differentiation.
//!
//! This module provides functions for computing derivatives and Jacobians
//! using finite difference approximations.

use crate::error::{FitError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default step size for finite differences.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Step for parameter `value`, scaled to its magnitude.
pub(crate) fn step_size(value: f64, eps: f64) -> f64 {
    if value.abs() > eps {
        value.abs() * eps
    } else {
        eps
    }
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// The Jacobian is the matrix of partial derivatives of the residuals with
/// respect to the parameters: J[i,j] = ∂residual[i]/∂param[j].
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The step size for finite differences (optional)
///
/// # Returns
///
/// * `Result<Array2<f64>>` - The Jacobian matrix
pub fn jacobian<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    check_len(&residuals, n_residuals)?;

    let mut jac = Array2::zeros((n_residuals, n_params));
    let mut perturbed = params.clone();
    for j in 0..n_params {
        let h = step_size(params[j], eps);
        perturbed[j] = params[j] + h;
        let shifted = problem.eval(&perturbed)?;
        check_len(&shifted, n_residuals)?;
        perturbed[j] = params[j];

        for i in 0..n_residuals {
            jac[[i, j]] = (shifted[i] - residuals[i]) / h;
        }
    }

    Ok(jac)
}

/// Compute the Jacobian matrix using central finite differences.
///
/// Twice as many evaluations as [`jacobian`], with an error of order `h²`.
pub fn jacobian_central<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(1e-6);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let mut jac = Array2::zeros((n_residuals, n_params));
    let mut perturbed = params.clone();
    for j in 0..n_params {
        let h = step_size(params[j], eps);
        perturbed[j] = params[j] + h;
        let forward = problem.eval(&perturbed)?;
        perturbed[j] = params[j] - h;
        let backward = problem.eval(&perturbed)?;
        perturbed[j] = params[j];
        check_len(&forward, n_residuals)?;
        check_len(&backward, n_residuals)?;

        for i in 0..n_residuals {
            jac[[i, j]] = (forward[i] - backward[i]) / (2.0 * h);
        }
    }

    Ok(jac)
}

/// Derivative of a scalar function of one variable by central differences.
pub fn derivative<F>(f: F, x: f64, epsilon: Option<f64>) -> f64
where
    F: Fn(f64) -> f64,
{
    let h = step_size(x, epsilon.unwrap_or(1e-6));
    (f(x + h) - f(x - h)) / (2.0 * h)
}

pub(crate) fn check_len(residuals: &Array1<f64>, expected: usize) -> Result<()> {
    if residuals.len() != expected {
        return Err(FitError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            expected,
            residuals.len()
        )));
    }
    Ok(())
}
