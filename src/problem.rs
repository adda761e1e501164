//! Residual-function abstraction shared by both optimizers.
//!
//! A `Problem` maps a parameter vector to a vector of residuals. The
//! Levenberg-Marquardt solver consumes residuals and the Jacobian; the
//! Nelder-Mead simplex only needs [`Problem::eval_cost`].

use ndarray::{Array1, Array2};

use crate::error::Result;

/// A trait representing a nonlinear least squares problem.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of `residual_count()` residuals, or an error if the evaluation fails
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix `J[i, j] = ∂rᵢ/∂pⱼ` at the given parameters.
    ///
    /// # Default Implementation
    ///
    /// Forward finite differences, see [`crate::utils::finite_difference::jacobian`].
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        crate::utils::finite_difference::jacobian(self, params, None)
    }

    /// Check if this problem provides an analytic Jacobian.
    fn has_custom_jacobian(&self) -> bool {
        false
    }

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// r = a * x² + b - y
    struct Parabola {
        x: Array1<f64>,
        y: Array1<f64>,
    }

    impl Problem for Parabola {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(self
                .x
                .iter()
                .zip(self.y.iter())
                .map(|(x, y)| params[0] * x * x + params[1] - y)
                .collect())
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            self.x.len()
        }
    }

    #[test]
    fn test_default_jacobian_is_numerical() {
        let problem = Parabola {
            x: array![0.0, 1.0, 2.0, 3.0],
            y: array![1.0, 3.0, 9.0, 19.0],
        };
        assert!(!problem.has_custom_jacobian());

        let jac = problem.jacobian(&array![2.0, 1.0]).unwrap();
        assert_eq!(jac.shape(), &[4, 2]);
        for i in 0..4 {
            let x = problem.x[i];
            assert_relative_eq!(jac[[i, 0]], x * x, epsilon = 1e-5);
            assert_relative_eq!(jac[[i, 1]], 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_eval_cost() {
        let problem = Parabola {
            x: array![0.0, 1.0, 2.0, 3.0],
            y: array![1.0, 3.0, 9.0, 19.0],
        };
        assert_relative_eq!(problem.eval_cost(&array![2.0, 1.0]).unwrap(), 0.0);
        // Residuals become -2x² at a = 0.
        let expected: f64 = [0.0f64, 1.0, 2.0, 3.0].iter().map(|x: &f64| (2.0 * x * x).powi(2)).sum();
        assert_relative_eq!(problem.eval_cost(&array![0.0, 1.0]).unwrap(), expected, epsilon = 1e-10);
    }
}
