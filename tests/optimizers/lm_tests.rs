use std::time::Duration;

use approx::assert_relative_eq;
use ndarray::array;
use numfit_rs::lm::{ConvergenceStatus, Damping, DiffMethod, LevenbergMarquardt, LmConfig};
use numfit_rs::{CancellationToken, FitError};

use super::{ExpDecay, Rosenbrock};

#[test]
fn test_rosenbrock_both_dampings() {
    for damping in [Damping::Scaled, Damping::Unscaled] {
        let lm = LevenbergMarquardt::with_config(
            LmConfig::default()
                .with_damping(damping)
                .with_max_iterations(500)
                .with_tolerance(1e-12),
        );
        let result = lm.minimize(&Rosenbrock, array![-1.2, 1.0]).unwrap();
        assert!(result.success, "{:?}: {}", damping, result.message);
        assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(result.params[1], 1.0, epsilon = 1e-6);
    }
}

#[test]
fn test_central_differences() {
    let lm = LevenbergMarquardt::with_config(
        LmConfig::default().with_diff_method(DiffMethod::CentralDifference),
    );
    let result = lm.minimize(&ExpDecay::exact(3.0, 0.7), array![1.0, 1.0]).unwrap();
    assert_relative_eq!(result.params[0], 3.0, epsilon = 1e-6);
    assert_relative_eq!(result.params[1], 0.7, epsilon = 1e-6);
    assert!(result.cost < 1e-12);
}

#[test]
fn test_covariance_is_optional() {
    let problem = ExpDecay::exact(2.0, 0.5);
    let with = LevenbergMarquardt::with_config(LmConfig::default().with_calc_covariance(true))
        .minimize(&problem, array![1.0, 1.0])
        .unwrap();
    assert!(with.covariance.is_some());
    let without = LevenbergMarquardt::with_config(LmConfig::default().with_calc_covariance(false))
        .minimize(&problem, array![1.0, 1.0])
        .unwrap();
    assert!(without.covariance.is_none());
}

#[test]
fn test_iteration_cap() {
    let lm = LevenbergMarquardt::new().with_max_iterations(1);
    let result = lm.minimize(&Rosenbrock, array![-1.2, 1.0]).unwrap();
    assert_eq!(result.status, ConvergenceStatus::MaxIterationsReached);
    assert!(!result.success);
    assert_eq!(result.iterations, 1);
}

#[test]
fn test_cancelled_token() {
    let token = CancellationToken::new();
    token.cancel();
    let lm = LevenbergMarquardt::with_config(LmConfig::default().with_cancellation(token));
    assert!(matches!(
        lm.minimize(&Rosenbrock, array![-1.2, 1.0]),
        Err(FitError::Cancelled)
    ));
}

#[test]
fn test_zero_time_budget() {
    let lm = LevenbergMarquardt::with_config(
        LmConfig::default().with_time_limit(Duration::from_nanos(0)),
    );
    let result = lm.minimize(&Rosenbrock, array![-1.2, 1.0]).unwrap();
    assert_eq!(result.status, ConvergenceStatus::TimeLimitReached);
}

#[test]
fn test_wrong_parameter_count() {
    let err = LevenbergMarquardt::new()
        .minimize(&Rosenbrock, array![1.0])
        .unwrap_err();
    assert!(matches!(err, FitError::DimensionMismatch(_)));
}
