//! Column-parallel numerical Jacobians with Rayon.

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use super::finite_difference::{check_len, step_size, DEFAULT_EPSILON};
use crate::error::Result;
use crate::problem::Problem;

/// Compute the Jacobian matrix using forward finite differences in parallel.
///
/// Each column needs one extra residual evaluation; the columns are
/// independent and evaluated on the Rayon pool. Worth it when a single
/// evaluation is expensive, e.g. a user expression over many points.
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The step size for finite differences (optional)
pub fn jacobian_parallel<P: Problem + Sync + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    check_len(&residuals, n_residuals)?;

    let columns: Result<Vec<Array1<f64>>> = (0..n_params)
        .into_par_iter()
        .map(|j| {
            let mut perturbed = params.clone();
            let h = step_size(params[j], eps);
            perturbed[j] += h;
            let shifted = problem.eval(&perturbed)?;
            check_len(&shifted, n_residuals)?;
            Ok((shifted - &residuals) / h)
        })
        .collect();

    let mut jac = Array2::zeros((n_residuals, n_params));
    for (j, column) in columns?.into_iter().enumerate() {
        jac.column_mut(j).assign(&column);
    }
    Ok(jac)
}
