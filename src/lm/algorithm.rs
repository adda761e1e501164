//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the core implementation of the Levenberg-Marquardt algorithm
//! for nonlinear least-squares optimization: a damped Gauss-Newton iteration
//! whose damping adapts to whether the last trial step reduced the cost.

use log::{debug, trace};
use ndarray::{Array1, Array2};
use std::fmt;

use crate::control::Deadline;
use crate::error::{FitError, Result};
use crate::problem::Problem;
use crate::utils::{finite_difference, linalg};

use super::config::{Damping, DiffMethod, LmConfig};
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};
use super::step::LmStep;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted steps
    pub iterations: usize,

    /// Number of residual evaluations, including those spent on finite differences
    pub func_evals: usize,

    /// How the run terminated
    pub status: ConvergenceStatus,

    /// Whether the optimization converged
    pub success: bool,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution
    pub jacobian: Array2<f64>,

    /// `(JᵀJ)⁻¹`, absent if not requested or singular at the solution
    pub covariance: Option<Array2<f64>>,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// Outcome of the search for an acceptable damping value.
enum Trial {
    Accepted {
        params: Array1<f64>,
        residuals: Array1<f64>,
        cost: f64,
        step: Array1<f64>,
        predicted_reduction: f64,
    },
    /// Every solvable λ up to `max_lambda` increased the cost.
    Stalled,
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    if residuals.iter().all(|r| r.is_finite()) {
        residuals.iter().map(|r| r * r).sum()
    } else {
        f64::INFINITY
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the damping strategy.
    pub fn with_damping(mut self, damping: Damping) -> Self {
        self.config.damping = damping;
        self
    }

    fn criteria(&self) -> ConvergenceCriteria {
        ConvergenceCriteria::new(self.config.xtol, self.config.ftol, self.config.gtol)
    }

    /// Jacobian according to `diff_method`, with the number of residual evaluations it cost.
    fn jacobian<P: Problem + Sync + ?Sized>(
        &self,
        problem: &P,
        params: &Array1<f64>,
    ) -> Result<(Array2<f64>, usize)> {
        let n = params.len();
        let (jac, evals) = match self.config.diff_method {
            DiffMethod::Auto if problem.has_custom_jacobian() => (problem.jacobian(params)?, 0),
            DiffMethod::Auto | DiffMethod::ForwardDifference => {
                (self.forward_difference(problem, params)?, n + 1)
            }
            DiffMethod::CentralDifference => {
                (finite_difference::jacobian_central(problem, params, None)?, 2 * n)
            }
        };
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NumericalError(
                "non-finite entry in the Jacobian".to_string(),
            ));
        }
        Ok((jac, evals))
    }

    #[cfg(feature = "parallel")]
    fn forward_difference<P: Problem + Sync + ?Sized>(
        &self,
        problem: &P,
        params: &Array1<f64>,
    ) -> Result<Array2<f64>> {
        if self.config.parallel_jacobian {
            crate::utils::parallel::jacobian_parallel(problem, params, None)
        } else {
            finite_difference::jacobian(problem, params, None)
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn forward_difference<P: Problem + Sync + ?Sized>(
        &self,
        problem: &P,
        params: &Array1<f64>,
    ) -> Result<Array2<f64>> {
        finite_difference::jacobian(problem, params, None)
    }

    /// Raise λ until a step lowers the cost or λ saturates.
    #[allow(clippy::too_many_arguments)]
    fn search_damping<P: Problem + Sync + ?Sized>(
        &self,
        problem: &P,
        params: &Array1<f64>,
        cost: f64,
        j_t_j: &Array2<f64>,
        gradient: &Array1<f64>,
        scale: &Array1<f64>,
        lambda: &mut f64,
        func_evals: &mut usize,
    ) -> Result<Trial> {
        let mut solved_any = false;
        loop {
            match LmStep::calculate_step(j_t_j, gradient, *lambda, scale) {
                Ok(step) => {
                    solved_any = true;
                    let trial = params + &step.step;
                    let residuals = problem.eval(&trial)?;
                    *func_evals += 1;
                    let new_cost = sum_of_squares(&residuals);
                    if new_cost < cost {
                        return Ok(Trial::Accepted {
                            params: trial,
                            residuals,
                            cost: new_cost,
                            step: step.step,
                            predicted_reduction: step.predicted_reduction,
                        });
                    }
                    trace!(
                        "LM: step rejected at lambda {:.3e} (cost {:.6e} -> {:.6e})",
                        lambda,
                        cost,
                        new_cost
                    );
                }
                Err(FitError::SingularMatrix) => {
                    trace!("LM: damped system singular at lambda {:.3e}", lambda);
                }
                Err(err) => return Err(err),
            }

            if *lambda >= self.config.max_lambda {
                return if solved_any {
                    Ok(Trial::Stalled)
                } else {
                    Err(FitError::SingularJacobian)
                };
            }
            *lambda = (*lambda * self.config.lambda_up_factor).min(self.config.max_lambda);
        }
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Initial guess for the parameter values
    ///
    /// # Errors
    ///
    /// * `FitError::NumericalError` if the residuals at the starting point are not finite
    /// * `FitError::SingularJacobian` if no damping value yields a solvable step
    /// * `FitError::Cancelled` if the configured token fires between iterations
    pub fn minimize<P: Problem + Sync + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }
        if n_params == 0 {
            return Err(FitError::NoParametersDefined);
        }

        let criteria = self.criteria();
        let deadline = Deadline::from_budget(self.config.time_limit);
        let mut params = initial_params;
        let mut lambda = self.config.initial_lambda;

        let mut residuals = problem.eval(&params)?;
        finite_difference::check_len(&residuals, problem.residual_count())?;
        let mut cost = sum_of_squares(&residuals);
        if !cost.is_finite() {
            return Err(FitError::NumericalError(
                "residuals are not finite at the initial parameters".to_string(),
            ));
        }
        let mut func_evals = 1;

        let (mut jacobian, evals) = self.jacobian(problem, &params)?;
        func_evals += evals;
        let mut iterations = 0;
        let mut scale = Array1::zeros(n_params);

        debug!(
            "LM: start with {} parameters, {} residuals, cost {:.6e}, {:?} damping",
            n_params,
            residuals.len(),
            cost,
            self.config.damping
        );

        let status = loop {
            if let Some(token) = &self.config.cancel {
                token.check()?;
            }
            if cost == 0.0 {
                break ConvergenceStatus::ZeroResidual;
            }

            let gradient = jacobian.t().dot(&residuals);
            let gradient_norm = gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            let status = criteria.check_gradient(gradient_norm);
            if status.is_terminated() {
                break status;
            }
            if iterations >= self.config.max_iterations {
                break ConvergenceStatus::MaxIterationsReached;
            }
            if deadline.expired() {
                break ConvergenceStatus::TimeLimitReached;
            }

            let j_t_j = linalg::normal_matrix(&jacobian);
            LmStep::update_scale(&mut scale, &j_t_j, self.config.damping);
            let trial = self.search_damping(
                problem,
                &params,
                cost,
                &j_t_j,
                &gradient,
                &scale,
                &mut lambda,
                &mut func_evals,
            )?;

            let Trial::Accepted {
                params: new_params,
                residuals: new_residuals,
                cost: new_cost,
                step,
                predicted_reduction,
            } = trial
            else {
                break ConvergenceStatus::Failed(format!(
                    "cannot reduce the sum of squares (lambda reached {:.1e})",
                    self.config.max_lambda
                ));
            };

            let actual = (cost - new_cost) / cost;
            let predicted = predicted_reduction / cost;
            iterations += 1;
            trace!(
                "LM: iteration {} cost {:.6e} lambda {:.3e}",
                iterations,
                new_cost,
                lambda
            );

            params = new_params;
            residuals = new_residuals;
            cost = new_cost;
            lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);

            let (jac, evals) = self.jacobian(problem, &params)?;
            jacobian = jac;
            func_evals += evals;

            let status = criteria.check_step(&params, &step, actual, predicted);
            if status.is_terminated() {
                break status;
            }
        };

        debug!(
            "LM: {} after {} iterations, cost {:.6e}",
            status.description(),
            iterations,
            cost
        );

        let covariance = if self.config.calc_covariance {
            match linalg::covariance(&jacobian) {
                Ok(cov) if self.config.scale_covariance => {
                    let dof = residuals.len().saturating_sub(n_params).max(1);
                    Some(cov * (cost / dof as f64))
                }
                Ok(cov) => Some(cov),
                Err(err) => {
                    debug!("LM: no covariance at the solution: {}", err);
                    None
                }
            }
        } else {
            None
        };

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            success: status.is_converged(),
            message: status.description(),
            status,
            jacobian,
            covariance,
        })
    }
}
