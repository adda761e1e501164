//! Configuration options for the Levenberg-Marquardt algorithm.
//!
//! This module defines the damping strategy, the Jacobian source and the
//! termination thresholds of the solver.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::control::CancellationToken;

/// Method for calculating the Jacobian matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiffMethod {
    /// Use the problem's analytic Jacobian when it has one, forward differences otherwise
    #[default]
    Auto,

    /// Always use forward finite differences
    ForwardDifference,

    /// Always use central finite differences
    CentralDifference,
}

/// Diagonal term added to the normal matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Damping {
    /// `D = diag(JᵀJ)`, as a running maximum over the iterations; 1 for a
    /// parameter that has had no influence yet
    #[default]
    Scaled,

    /// `D = I`
    Unscaled,
}

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Maximum number of iterations (accepted steps). Default: 100
    pub max_iterations: usize,

    /// Tolerance for the relative reduction of the sum of squares. Default: 1e-8
    pub ftol: f64,

    /// Tolerance for the relative change in parameter values. Default: 1e-8
    pub xtol: f64,

    /// Tolerance for the gradient norm `‖Jᵀr‖∞`. Default: 1e-8
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-10
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e10
    pub max_lambda: f64,

    /// Damping matrix. Default: Scaled
    pub damping: Damping,

    /// Method to use for calculating the Jacobian. Default: Auto
    pub diff_method: DiffMethod,

    /// Evaluate finite-difference columns on the Rayon pool. Default: false
    pub parallel_jacobian: bool,

    /// Whether to compute `(JᵀJ)⁻¹` at the solution. Default: true
    pub calc_covariance: bool,

    /// Multiply the covariance by the reduced sum of squares. Default: false
    pub scale_covariance: bool,

    /// Wall-clock budget. Default: none
    pub time_limit: Option<Duration>,

    /// Checked between iterations. Default: none
    pub cancel: Option<CancellationToken>,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-10,
            max_lambda: 1e10,
            damping: Damping::default(),
            diff_method: DiffMethod::default(),
            parallel_jacobian: false,
            calc_covariance: true,
            scale_covariance: false,
            time_limit: None,
            cancel: None,
        }
    }
}

impl LmConfig {
    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set all three tolerances at once.
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.ftol = tol;
        self.xtol = tol;
        self.gtol = tol;
        self
    }

    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    /// Set the range lambda is confined to.
    pub fn with_lambda_range(mut self, min_lambda: f64, max_lambda: f64) -> Self {
        self.min_lambda = min_lambda;
        self.max_lambda = max_lambda;
        self
    }

    pub fn with_damping(mut self, damping: Damping) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_diff_method(mut self, method: DiffMethod) -> Self {
        self.diff_method = method;
        self
    }

    /// Parallel finite differences; ignored without the `parallel` feature.
    pub fn with_parallel_jacobian(mut self, parallel: bool) -> Self {
        self.parallel_jacobian = parallel;
        self
    }

    pub fn with_calc_covariance(mut self, calc: bool) -> Self {
        self.calc_covariance = calc;
        self
    }

    pub fn with_scale_covariance(mut self, scale: bool) -> Self {
        self.scale_covariance = scale;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
