use approx::assert_relative_eq;
use ndarray::{array, Array1};
use numfit_rs::lm::ConvergenceStatus;
use numfit_rs::simplex::{NelderMead, SimplexConfig};
use numfit_rs::{CancellationToken, FitError, Problem, Result};

use super::{ExpDecay, Rosenbrock};

/// Residuals of the bowl `(a − 3)² + 4(b + 1)²`.
struct Bowl;

impl Problem for Bowl {
    fn eval(&self, p: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(array![p[0] - 3.0, 2.0 * (p[1] + 1.0)])
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }
}

struct NotANumber;

impl Problem for NotANumber {
    fn eval(&self, _p: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(array![f64::NAN])
    }

    fn parameter_count(&self) -> usize {
        1
    }

    fn residual_count(&self) -> usize {
        1
    }
}

fn precise() -> NelderMead {
    NelderMead::with_config(
        SimplexConfig::default()
            .with_tolerance(1e-10)
            .with_max_iterations(5000),
    )
}

#[test]
fn test_bowl_minimum() {
    let result = precise().minimize(&Bowl, array![1.0, 1.0]).unwrap();
    assert_eq!(result.status, ConvergenceStatus::FunctionValueConvergence);
    assert_relative_eq!(result.params[0], 3.0, epsilon = 1e-5);
    assert_relative_eq!(result.params[1], -1.0, epsilon = 1e-5);
    assert!(result.cost < 1e-9);
    assert!(result.func_evals > result.iterations);
}

#[test]
fn test_rosenbrock_valley() {
    let result = precise().minimize(&Rosenbrock, array![-1.2, 1.0]).unwrap();
    assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(result.params[1], 1.0, epsilon = 1e-4);
}

#[test]
fn test_decay_without_derivatives() {
    let result = precise()
        .minimize(&ExpDecay::exact(3.0, 0.7), array![1.0, 1.0])
        .unwrap();
    assert_relative_eq!(result.params[0], 3.0, epsilon = 1e-4);
    assert_relative_eq!(result.params[1], 0.7, epsilon = 1e-4);
}

#[test]
fn test_iteration_cap() {
    let nm = NelderMead::with_config(SimplexConfig::default().with_max_iterations(2));
    let result = nm.minimize(&Bowl, array![1.0, 1.0]).unwrap();
    assert_eq!(result.status, ConvergenceStatus::MaxIterationsReached);
    assert_eq!(result.iterations, 2);
}

#[test]
fn test_cancelled_token() {
    let token = CancellationToken::new();
    token.cancel();
    let nm = NelderMead::with_config(SimplexConfig::default().with_cancellation(token));
    assert!(matches!(
        nm.minimize(&Bowl, array![1.0, 1.0]),
        Err(FitError::Cancelled)
    ));
}

#[test]
fn test_non_finite_start() {
    assert!(matches!(
        NelderMead::new().minimize(&NotANumber, array![1.0]),
        Err(FitError::NumericalError(_))
    ));
}
