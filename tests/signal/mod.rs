//! Dataset-level signal utilities.

use std::f64::consts::PI;

use approx::assert_relative_eq;
use numfit_rs::data::Dataset;
use numfit_rs::signal::{
    convolve_dataset, correlate_dataset, cumulative_integral_dataset, deconvolve_dataset,
    fft_filter_dataset, integrate_dataset, interpolate_dataset, smooth_dataset, spectrum_dataset,
    ConvolutionOptions, CorrelationNorm, CorrelationOptions, CumulativeMethod, FilterForm,
    FilterOptions, IntegrationOptions, InterpolationMethod, InterpolationOutput, ResponseNorm,
    SmoothMethod, SmoothOptions, SpectrumOptions, SpectrumOutput,
};
use numfit_rs::FitError;

use crate::test_helpers::{exact_dataset, grid};

/// `n` samples every `dx` starting at zero.
fn sampled(name: &str, n: usize, dx: f64, f: impl Fn(f64) -> f64) -> Dataset {
    let x: Vec<f64> = (0..n).map(|i| i as f64 * dx).collect();
    exact_dataset(name, &x, f)
}

#[test]
fn test_amplitude_spectrum_finds_tone() {
    let data = sampled("tone", 200, 0.01, |x| 2.0 * (2.0 * PI * 5.0 * x).sin());
    let curve = spectrum_dataset(
        &data,
        &SpectrumOptions::default().with_output(SpectrumOutput::Amplitude),
    )
    .unwrap();
    assert_eq!(curve.name, "tone FFT");
    assert_eq!(curve.len(), 101);

    let (peak, _) = curve
        .y
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
    assert_relative_eq!(curve.x[peak], 5.0, epsilon = 1e-12);
    assert_relative_eq!(curve.y[peak], 2.0, epsilon = 1e-9);
}

#[test]
fn test_low_pass_removes_fast_component() {
    let slow = |x: f64| (2.0 * PI * 3.0 * x).sin();
    let data = sampled("mix", 200, 0.005, |x| slow(x) + 0.5 * (2.0 * PI * 40.0 * x).sin());
    let curve = fft_filter_dataset(&data, &FilterOptions::low_pass(10.0)).unwrap();
    assert_eq!(curve.name, "mix filtered");
    assert_eq!(curve.x, data.x());
    for (x, y) in curve.x.iter().zip(&curve.y) {
        assert_relative_eq!(*y, slow(*x), epsilon = 1e-9);
    }

    // a smooth roll-off passes the slow tone nearly untouched
    let soft = fft_filter_dataset(
        &data,
        &FilterOptions::low_pass(10.0).with_form(FilterForm::Butterworth(6)),
    )
    .unwrap();
    for (x, y) in soft.x.iter().zip(&soft.y) {
        assert!((y - slow(*x)).abs() < 0.01);
    }
}

#[test]
fn test_savitzky_golay_keeps_quadratics() {
    let x = grid(-1.0, 1.0, 41);
    let data = exact_dataset("quad", &x, |x| 3.0 * x * x - x + 0.5);
    let options = SmoothOptions::new(SmoothMethod::SavitzkyGolay {
        left: 3,
        right: 3,
        order: 2,
    });
    let curve = smooth_dataset(&data, &options).unwrap();
    assert_eq!(curve.name, "quad smoothed");
    for (smoothed, original) in curve.y.iter().zip(data.y()) {
        assert_relative_eq!(*smoothed, *original, epsilon = 1e-9);
    }
}

#[test]
fn test_convolution_extends_axis() {
    let data = sampled("pulse", 5, 0.5, |x| if x == 1.0 { 1.0 } else { 0.0 });
    let curve = convolve_dataset(&data, &[1.0, 2.0, 1.0], &ConvolutionOptions::default()).unwrap();
    assert_eq!(curve.name, "pulse convolution");
    assert_eq!(curve.len(), 7);
    assert_relative_eq!(curve.x[6], 3.0, epsilon = 1e-12);
    let expected = [0.0, 0.0, 1.0, 2.0, 1.0, 0.0, 0.0];
    for (v, e) in curve.y.iter().zip(expected) {
        assert_relative_eq!(*v, e, epsilon = 1e-12);
    }
}

#[test]
fn test_deconvolution_checks_response() {
    let data = sampled("s", 16, 1.0, |x| x.sin());
    assert!(matches!(
        deconvolve_dataset(&data, &[1.0, 1.0, 1.0, 1.0], ResponseNorm::Sum),
        Err(FitError::ResponseLengthMustBeOdd(4))
    ));
    let curve = deconvolve_dataset(&data, &[1.0], ResponseNorm::None).unwrap();
    assert_eq!(curve.name, "s deconvolution");
    for (v, e) in curve.y.iter().zip(data.y()) {
        assert_relative_eq!(*v, *e, epsilon = 1e-12);
    }
}

#[test]
fn test_correlation_lag_axis() {
    let data = sampled("ref", 6, 0.25, |x| (3.0 * x).cos());
    let options = CorrelationOptions::default().with_normalization(CorrelationNorm::Coefficient);
    let curve = correlate_dataset(&data, data.y(), &options).unwrap();
    assert_eq!(curve.name, "ref correlation");
    assert_eq!(curve.len(), 11);
    assert_relative_eq!(curve.x[0], -1.25, epsilon = 1e-12);
    assert_relative_eq!(curve.x[5], 0.0, epsilon = 1e-12);
    assert_relative_eq!(curve.y[5], 1.0, epsilon = 1e-12);
}

#[test]
fn test_spline_derivative_on_dataset() {
    let x = grid(0.0, 2.0 * PI, 60);
    let data = exact_dataset("sine", &x, f64::sin);
    let curve = interpolate_dataset(
        &data,
        InterpolationMethod::CubicSpline,
        InterpolationOutput::FirstDerivative,
        1.0,
        5.0,
        9,
    )
    .unwrap();
    assert_eq!(curve.name, "sine interpolated");
    assert_eq!(curve.len(), 9);
    for (t, d) in curve.x.iter().zip(&curve.y) {
        assert_relative_eq!(*d, t.cos(), epsilon = 1e-3);
    }

    assert!(matches!(
        interpolate_dataset(
            &data,
            InterpolationMethod::Akima,
            InterpolationOutput::Function,
            -1.0,
            1.0,
            5
        ),
        Err(FitError::BoundsOutOfRange { .. })
    ));
}

#[test]
fn test_area_under_dataset() {
    let x = grid(0.0, PI, 41);
    let data = exact_dataset("half wave", &x, f64::sin);
    let result = integrate_dataset(&data, 0.0, PI, &IntegrationOptions::default()).unwrap();
    assert_eq!(result.source, "half wave");
    assert!(result.converged);
    assert_relative_eq!(result.value, 2.0, epsilon = 1e-5);
    assert!(result.summary().contains("Numerical integration of half wave"));

    let running =
        cumulative_integral_dataset(&data, CumulativeMethod::Simpson, false).unwrap();
    assert_eq!(running.name, "half wave integral");
    assert_relative_eq!(running.y[0], 0.0);
    assert_relative_eq!(running.y[40], 2.0, epsilon = 1e-5);
}
