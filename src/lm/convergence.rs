//! Convergence criteria for optimization algorithms.
//!
//! This module defines the criteria used to determine when an optimization
//! algorithm has converged to a solution. The status type is shared with the
//! Nelder-Mead simplex.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Possible convergence states for an optimization algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// The algorithm has converged due to a small parameter change.
    ParameterConvergence,

    /// The algorithm has converged due to a small function value change.
    FunctionValueConvergence,

    /// The algorithm has converged due to a small gradient.
    GradientConvergence,

    /// The residuals vanished exactly.
    ZeroResidual,

    /// The algorithm has terminated due to reaching the maximum number of iterations.
    MaxIterationsReached,

    /// The wall-clock budget ran out; the best estimate so far is reported.
    TimeLimitReached,

    /// The algorithm stopped without a usable step.
    Failed(String),
}

impl ConvergenceStatus {
    /// Returns true if the optimization has terminated (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
                | ConvergenceStatus::ZeroResidual
        )
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> String {
        match self {
            ConvergenceStatus::Running => "Optimization is still running".to_string(),
            ConvergenceStatus::ParameterConvergence => {
                "Converged: small parameter change".to_string()
            }
            ConvergenceStatus::FunctionValueConvergence => {
                "Converged: small function value change".to_string()
            }
            ConvergenceStatus::GradientConvergence => "Converged: small gradient".to_string(),
            ConvergenceStatus::ZeroResidual => "Converged: zero residual".to_string(),
            ConvergenceStatus::MaxIterationsReached => {
                "Terminated: maximum iterations reached".to_string()
            }
            ConvergenceStatus::TimeLimitReached => "Terminated: time limit reached".to_string(),
            ConvergenceStatus::Failed(reason) => format!("Failed: {}", reason),
        }
    }
}

/// Criteria for determining when an optimization algorithm has converged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceCriteria {
    /// Tolerance for change in parameter values.
    pub xtol: f64,

    /// Tolerance for change in function value.
    pub ftol: f64,

    /// Tolerance for gradient norm.
    pub gtol: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            xtol: 1e-8,
            ftol: 1e-8,
            gtol: 1e-8,
        }
    }
}

impl ConvergenceCriteria {
    /// Creates a new set of convergence criteria with the given tolerances.
    pub fn new(xtol: f64, ftol: f64, gtol: f64) -> Self {
        Self { xtol, ftol, gtol }
    }

    /// Gradient test, evaluated before a step is attempted.
    pub fn check_gradient(&self, gradient_norm: f64) -> ConvergenceStatus {
        if gradient_norm < self.gtol {
            ConvergenceStatus::GradientConvergence
        } else {
            ConvergenceStatus::Running
        }
    }

    /// Tests after an accepted step.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values after the step
    /// * `step` - The accepted step
    /// * `actual_reduction` - `(cost - new_cost) / cost`
    /// * `predicted_reduction` - Relative reduction predicted by the linear model
    pub fn check_step(
        &self,
        params: &Array1<f64>,
        step: &Array1<f64>,
        actual_reduction: f64,
        predicted_reduction: f64,
    ) -> ConvergenceStatus {
        let small_step = params
            .iter()
            .zip(step.iter())
            .all(|(p, d)| d.abs() < self.xtol * (p.abs() + self.xtol));
        if small_step {
            return ConvergenceStatus::ParameterConvergence;
        }

        if actual_reduction.abs() < self.ftol && predicted_reduction.abs() < self.ftol {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        ConvergenceStatus::Running
    }
}
