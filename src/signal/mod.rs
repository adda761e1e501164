//! # Signal utilities
//!
//! FFT spectra and filters, smoothing, convolution, interpolation and
//! quadrature over evenly or unevenly sampled data. Every operation has a
//! slice-level function and a `*_dataset` variant that takes a
//! [`Dataset`] and returns a [`GeneratedCurve`](crate::data::GeneratedCurve)
//! (or, for quadrature, an [`IntegrationResult`]).
//!
//! ```
//! use numfit_rs::signal::filter::{fft_filter, FilterOptions};
//!
//! let y: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin()).collect();
//! let low = fft_filter(&y, 1.0, &FilterOptions::low_pass(5.0).by_index()).unwrap();
//! let high = fft_filter(&y, 1.0, &FilterOptions::high_pass(5.0).by_index()).unwrap();
//! for i in 0..y.len() {
//!     assert!((low[i] + high[i] - y[i]).abs() < 1e-10);
//! }
//! ```

pub mod convolution;
pub mod fft;
pub mod filter;
pub mod integration;
pub mod interpolation;
pub mod smooth;

pub use convolution::{
    convolve, convolve_dataset, correlate, correlate_dataset, deconvolve, deconvolve_dataset,
    kernel, ConvolutionKind, ConvolutionMethod, ConvolutionOptions, CorrelationNorm,
    CorrelationOptions, Kernel, OutputWrap, ResponseNorm,
};
pub use fft::{
    spectrum, spectrum_dataset, FrequencyScale, SpectrumOptions, SpectrumOutput, WindowFunction,
};
pub use filter::{fft_filter, fft_filter_dataset, CutoffUnit, FilterForm, FilterKind, FilterOptions};
pub use integration::{
    cumulative_integral, cumulative_integral_dataset, integrate, integrate_dataset,
    integrate_function, CumulativeMethod, IntegrationOptions, IntegrationResult,
};
pub use interpolation::{
    interpolate, interpolate_dataset, Interpolant, InterpolationMethod, InterpolationOutput,
};
pub use smooth::{
    fft_smooth, moving_average, percentile_filter, savitzky_golay, smooth_dataset,
    MovingAverageKind, Padding, SmoothMethod, SmoothOptions, SmoothWeight,
};

use crate::data::Dataset;
use crate::error::{FitError, Result};

/// Average spacing `(xₙ₋₁ − x₀)/(n − 1)` of ascending abscissae.
pub(crate) fn mean_spacing(x: &[f64]) -> Result<f64> {
    if x.len() < 2 {
        return Err(FitError::InsufficientPoints {
            required: 2,
            got: x.len(),
        });
    }
    let dx = (x[x.len() - 1] - x[0]) / (x.len() - 1) as f64;
    if !(dx > 0.0 && dx.is_finite()) {
        return Err(FitError::invalid_input(
            "x values must increase to define a sample spacing",
        ));
    }
    Ok(dx)
}

/// Evenly spaced x values continuing the dataset's spacing from its first point.
pub(crate) fn extended_axis(data: &Dataset, len: usize) -> Result<Vec<f64>> {
    let dx = mean_spacing(data.x())?;
    let x0 = data.x()[0];
    Ok((0..len).map(|i| x0 + i as f64 * dx).collect())
}
