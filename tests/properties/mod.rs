//! Properties that must hold for whole families of inputs.

use approx::assert_relative_eq;
use numfit_rs::data::Dataset;
use numfit_rs::fit::{FitConfig, FitEngine};
use numfit_rs::models::{MultiPeakModel, PeakShape, PolynomialModel};
use numfit_rs::FitError;

use crate::test_helpers::{exact_dataset, grid, noisy_dataset};

#[test]
fn test_exact_lines_have_unit_r_squared() {
    let x = grid(-3.0, 7.0, 15);
    for (slope, intercept) in [(1.0, 0.0), (-2.5, 4.0), (1e-3, 100.0), (40.0, -7.0)] {
        let data = exact_dataset("line", &x, |x| slope * x + intercept);
        let result = FitEngine::default()
            .fit(&data, &PolynomialModel::linear(), None)
            .unwrap();
        assert_relative_eq!(result.r_squared(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.value("a1").unwrap(), slope, epsilon = 1e-9);
    }
}

#[test]
fn test_line_recovery_tracks_noise_level() {
    let x = grid(0.0, 10.0, 50);
    let (slope, intercept) = (1.7, -0.4);
    let mut last_r_squared = f64::NEG_INFINITY;
    for sigma in [1e-1, 1e-2, 1e-3] {
        let data = noisy_dataset("noisy line", &x, |x| slope * x + intercept, sigma, 21);
        let result = FitEngine::default()
            .fit(&data, &PolynomialModel::linear(), None)
            .unwrap();
        assert!((result.value("a1").unwrap() - slope).abs() <= sigma);
        assert!((result.value("a0").unwrap() - intercept).abs() <= 2.0 * sigma);

        let r_squared = result.r_squared();
        assert!(r_squared > last_r_squared, "sigma {}: {} <= {}", sigma, r_squared, last_r_squared);
        last_r_squared = r_squared;
    }
    assert!(1.0 - last_r_squared < 1e-6);
}

#[test]
fn test_fewer_points_than_parameters_is_rejected() {
    let data = Dataset::from_xy("one", &[1.0], &[2.0]).unwrap();
    let err = FitEngine::default()
        .fit(&data, &PolynomialModel::linear(), None)
        .unwrap_err();
    assert!(matches!(err, FitError::InsufficientPoints { required: 2, got: 1 }));

    for degree in 2..=5 {
        let x = grid(0.0, 1.0, degree);
        let data = exact_dataset("short", &x, |x| x);
        let err = FitEngine::default()
            .fit(&data, &PolynomialModel::new(degree).unwrap(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            FitError::InsufficientPoints { required, got } if required == degree + 1 && got == degree
        ));
    }
}

#[test]
fn test_peak_recovery_ignores_center_order() {
    let truth = |x: f64| {
        PeakShape::Gaussian.value(x, 2.0, 3.0, 1.0) + PeakShape::Gaussian.value(x, 1.0, 7.0, 1.5) + 0.1
    };
    let x = grid(0.0, 10.0, 201);
    let data = exact_dataset("two peaks", &x, truth);
    let engine = FitEngine::new(FitConfig::default().with_tolerance(1e-10));

    let ascending = engine
        .fit(&data, &MultiPeakModel::new(PeakShape::Gaussian, &[2.8, 7.3]).unwrap(), None)
        .unwrap();
    let descending = engine
        .fit(&data, &MultiPeakModel::new(PeakShape::Gaussian, &[7.3, 2.8]).unwrap(), None)
        .unwrap();

    for result in [&ascending, &descending] {
        assert_relative_eq!(result.value("xc1").unwrap(), 3.0, epsilon = 1e-5);
        assert_relative_eq!(result.value("A1").unwrap(), 2.0, epsilon = 1e-5);
        assert_relative_eq!(result.value("xc2").unwrap(), 7.0, epsilon = 1e-5);
        assert_relative_eq!(result.value("w2").unwrap(), 1.5, epsilon = 1e-5);
        assert_relative_eq!(result.value("y0").unwrap(), 0.1, epsilon = 1e-5);
    }
    for name in ascending.parameters.names() {
        assert_relative_eq!(
            ascending.value(&name).unwrap(),
            descending.value(&name).unwrap(),
            epsilon = 1e-9
        );
    }
}

#[cfg(feature = "signal")]
mod signal_properties {
    use super::*;
    use numfit_rs::signal::convolution::{deconvolve, ResponseNorm};
    use numfit_rs::signal::fft::{forward_real, inverse_real};
    use numfit_rs::signal::filter::{fft_filter, FilterOptions};
    use numfit_rs::signal::integration::{integrate_function, IntegrationOptions};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_signal(rng: &mut ChaCha8Rng, n: usize) -> Vec<f64> {
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_fft_round_trip_every_length() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for n in 2..=17 {
            let y = random_signal(&mut rng, n);
            let back = inverse_real(&forward_real(&y).unwrap()).unwrap();
            assert_eq!(back.len(), n);
            for (a, b) in back.iter().zip(&y) {
                assert_relative_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_low_and_high_pass_sum_to_input() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for n in [16, 31, 64, 101] {
            let y = random_signal(&mut rng, n);
            for cutoff in [1.0, 2.5, 7.0, (n / 2) as f64] {
                let low = fft_filter(&y, 0.1, &FilterOptions::low_pass(cutoff).by_index()).unwrap();
                let high = fft_filter(&y, 0.1, &FilterOptions::high_pass(cutoff).by_index()).unwrap();
                for i in 0..n {
                    assert_relative_eq!(low[i] + high[i], y[i], epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_equal_band_limits_are_rejected() {
        let y = [0.0; 32];
        assert!(matches!(
            fft_filter(&y, 1.0, &FilterOptions::band_pass(4.0, 4.0)),
            Err(FitError::InvalidBandLimits { .. })
        ));
    }

    #[test]
    fn test_even_response_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let signal = random_signal(&mut rng, 64);
        for m in [2, 4, 6] {
            let response = vec![1.0; m];
            assert!(matches!(
                deconvolve(&signal, &response, ResponseNorm::Sum),
                Err(FitError::ResponseLengthMustBeOdd(len)) if len == m
            ));
        }
    }

    #[test]
    fn test_quadrature_of_parabola() {
        let exact = 1.0 / 3.0;
        for order in 1..=5 {
            let options = IntegrationOptions::default().with_order(order);
            let result = integrate_function(|x| x * x, 0.0, 1.0, &options).unwrap();
            assert_relative_eq!(result.value, exact, epsilon = 1e-6);

            let mut last_error = f64::INFINITY;
            for cap in 1..=10 {
                let capped = IntegrationOptions::default()
                    .with_order(order)
                    .with_max_iterations(cap);
                let value = integrate_function(|x| x * x, 0.0, 1.0, &capped).unwrap().value;
                let error = (value - exact).abs();
                assert!(
                    error <= last_error + 1e-14,
                    "order {} cap {}: {} > {}",
                    order,
                    cap,
                    error,
                    last_error
                );
                last_error = error;
            }
        }
    }
}
