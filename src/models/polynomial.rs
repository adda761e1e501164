//! Polynomial models for fitting data.
//!
//! `y = a0 + a1·x + … + ak·xᵏ` for orders 1 through 9. The straight line is
//! linear in its parameters and is solved directly.

use ndarray::Array2;

use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::model::{ClosedFormSolution, FitModel};
use crate::utils::linalg;

/// Highest supported polynomial order.
pub const MAX_ORDER: usize = 9;

/// A polynomial model of order 1 to 9.
///
/// Parameters are named `a0` (constant term) through `ak`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialModel {
    order: usize,
}

impl PolynomialModel {
    /// Create a new polynomial model with the specified order.
    ///
    /// # Errors
    ///
    /// * `FitError::InvalidInput` unless `1 <= order <= 9`
    pub fn new(order: usize) -> Result<Self> {
        if !(1..=MAX_ORDER).contains(&order) {
            return Err(FitError::invalid_input(format!(
                "polynomial order must be between 1 and {}, got {}",
                MAX_ORDER, order
            )));
        }
        Ok(Self { order })
    }

    /// The straight line `y = a0 + a1·x`.
    pub fn linear() -> Self {
        Self { order: 1 }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn design_matrix(&self, x: &[f64]) -> Array2<f64> {
        Array2::from_shape_fn((x.len(), self.order + 1), |(i, j)| x[i].powi(j as i32))
    }
}

impl FitModel for PolynomialModel {
    fn name(&self) -> String {
        if self.order == 1 {
            "Linear".to_string()
        } else {
            format!("Polynomial (order {})", self.order)
        }
    }

    fn parameter_names(&self) -> Vec<String> {
        (0..=self.order).map(|i| format!("a{}", i)).collect()
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        // Horner
        params.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }

    fn jacobian(&self, x: f64, _params: &[f64], row: &mut [f64]) -> Result<()> {
        let mut power = 1.0;
        for entry in row.iter_mut().take(self.order + 1) {
            *entry = power;
            power *= x;
        }
        Ok(())
    }

    fn min_points(&self) -> usize {
        self.order + 1
    }

    fn formula(&self) -> String {
        let mut terms = vec!["a0".to_string(), "a1*x".to_string()];
        for k in 2..=self.order {
            terms.push(format!("a{}*x^{}", k, k));
        }
        format!("y = {}", terms.join(" + "))
    }

    /// Zeros for higher orders; the straight line starts from its exact solution.
    fn guess_parameters(&self, data: &Dataset) -> Result<Vec<f64>> {
        if self.order == 1 {
            if let Some(Ok(solution)) = self.closed_form(data) {
                return Ok(solution.params);
            }
        }
        Ok(vec![0.0; self.order + 1])
    }

    fn closed_form(&self, data: &Dataset) -> Option<Result<ClosedFormSolution>> {
        if self.order != 1 {
            return None;
        }
        let design = self.design_matrix(data.x());
        Some(
            linalg::weighted_least_squares(&design, data.y(), data.weights()).map(
                |(coefficients, covariance)| ClosedFormSolution {
                    params: coefficients.to_vec(),
                    covariance,
                },
            ),
        )
    }
}
