//! Optimizer tests on hand-written residual problems.

mod lm_tests;
mod simplex_tests;

use ndarray::Array1;
use numfit_rs::{FitError, Problem, Result};

/// Rosenbrock as residuals: `r = (10(b − a²), 1 − a)`.
pub struct Rosenbrock;

impl Problem for Rosenbrock {
    fn eval(&self, p: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(Array1::from_vec(vec![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]]))
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }
}

/// `y = a·exp(−b·x)` residuals against fixed samples.
pub struct ExpDecay {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl ExpDecay {
    pub fn exact(a: f64, b: f64) -> Self {
        let x: Vec<f64> = (0..25).map(|i| i as f64 * 0.2).collect();
        let y = x.iter().map(|x| a * (-b * x).exp()).collect();
        Self { x, y }
    }
}

impl Problem for ExpDecay {
    fn eval(&self, p: &Array1<f64>) -> Result<Array1<f64>> {
        if p.len() != 2 {
            return Err(FitError::DimensionMismatch(format!(
                "Expected 2 parameters, got {}",
                p.len()
            )));
        }
        Ok(self
            .x
            .iter()
            .zip(&self.y)
            .map(|(x, y)| p[0] * (-p[1] * x).exp() - y)
            .collect())
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        self.x.len()
    }
}
