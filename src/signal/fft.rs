//! Discrete Fourier transforms and spectra.
//!
//! Transforms are planned with RustFFT for any length. The inverse is
//! normalised by `1/n`, so `inverse(forward(x)) == x` up to round-off.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use super::mean_spacing;
use crate::data::{Dataset, GeneratedCurve};
use crate::error::{FitError, Result};

fn require_len(n: usize) -> Result<()> {
    if n < 2 {
        return Err(FitError::InsufficientPoints { required: 2, got: n });
    }
    Ok(())
}

/// Collect into a vector reserved up front, reporting allocation failure.
pub(crate) fn complex_buffer<I>(values: I) -> Result<Vec<Complex<f64>>>
where
    I: ExactSizeIterator<Item = Complex<f64>>,
{
    let len = values.len();
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| FitError::AllocationFailure(len))?;
    buffer.extend(values);
    Ok(buffer)
}

fn transform(mut buffer: Vec<Complex<f64>>, inverse: bool) -> Vec<Complex<f64>> {
    let n = buffer.len();
    let mut planner = FftPlanner::<f64>::new();
    if inverse {
        planner.plan_fft_inverse(n).process(&mut buffer);
        let scale = 1.0 / n as f64;
        buffer.iter_mut().for_each(|c| *c *= scale);
    } else {
        planner.plan_fft_forward(n).process(&mut buffer);
    }
    buffer
}

/// Forward complex transform `Yₖ = Σ xⱼ e^{−2πijk/n}`.
///
/// # Errors
///
/// * `FitError::InsufficientPoints` for fewer than 2 values
pub fn forward(input: &[Complex<f64>]) -> Result<Vec<Complex<f64>>> {
    require_len(input.len())?;
    Ok(transform(complex_buffer(input.iter().copied())?, false))
}

/// Inverse complex transform, normalised by `1/n`.
pub fn inverse(input: &[Complex<f64>]) -> Result<Vec<Complex<f64>>> {
    require_len(input.len())?;
    Ok(transform(complex_buffer(input.iter().copied())?, true))
}

/// Forward transform of a real signal (full, two-sided spectrum).
pub fn forward_real(input: &[f64]) -> Result<Vec<Complex<f64>>> {
    require_len(input.len())?;
    Ok(transform(
        complex_buffer(input.iter().map(|&v| Complex::new(v, 0.0)))?,
        false,
    ))
}

/// Inverse transform keeping the real part.
pub fn inverse_real(spectrum: &[Complex<f64>]) -> Result<Vec<f64>> {
    Ok(inverse(spectrum)?.into_iter().map(|c| c.re).collect())
}

/// Window applied to the signal before a spectrum is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowFunction {
    #[default]
    Rectangular,
    Triangular,
    Hann,
    Hamming,
    Blackman,
    Welch,
}

impl WindowFunction {
    /// The `n` window coefficients.
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        if n < 2 {
            return vec![1.0; n];
        }
        let last = (n - 1) as f64;
        let center = last / 2.0;
        (0..n)
            .map(|i| {
                let i = i as f64;
                match self {
                    WindowFunction::Rectangular => 1.0,
                    WindowFunction::Triangular => 1.0 - ((i - center) / (n as f64 / 2.0)).abs(),
                    WindowFunction::Hann => 0.5 * (1.0 - (2.0 * PI * i / last).cos()),
                    WindowFunction::Hamming => 0.54 - 0.46 * (2.0 * PI * i / last).cos(),
                    WindowFunction::Blackman => {
                        0.42 - 0.5 * (2.0 * PI * i / last).cos() + 0.08 * (4.0 * PI * i / last).cos()
                    }
                    WindowFunction::Welch => 1.0 - ((i - center) / center).powi(2),
                }
            })
            .collect()
    }
}

/// Quantity reported for each frequency bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpectrumOutput {
    /// `|Yₖ|`
    #[default]
    Magnitude,
    /// `|Yₖ|/n`, doubled for interior bins of a one-sided spectrum
    Amplitude,
    /// `|Yₖ|²/n`, doubled for interior bins of a one-sided spectrum
    Power,
    /// `arg Yₖ` in radians
    Phase,
    /// `20·log10` of the amplitude; empty bins give −∞
    Decibel,
    Real,
    Imaginary,
}

/// The x values of a spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrequencyScale {
    /// `k / (n·Δx)`
    #[default]
    Frequency,
    /// Bin index `k`
    Index,
    /// `1/f`
    Period,
}

/// Options for [`spectrum`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectrumOptions {
    pub window: WindowFunction,
    pub output: SpectrumOutput,
    /// All `n` bins instead of `0..=n/2`
    pub two_sided: bool,
    /// Put negative frequencies first (two-sided only)
    pub shift: bool,
    pub scale: FrequencyScale,
}

impl SpectrumOptions {
    pub fn with_window(mut self, window: WindowFunction) -> Self {
        self.window = window;
        self
    }

    pub fn with_output(mut self, output: SpectrumOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_two_sided(mut self, two_sided: bool) -> Self {
        self.two_sided = two_sided;
        self
    }

    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_scale(mut self, scale: FrequencyScale) -> Self {
        self.scale = scale;
        self
    }
}

/// Spectrum of `y` sampled every `dx`, as `(x, value)` vectors.
///
/// # Errors
///
/// * `FitError::InsufficientPoints` for fewer than 2 values
/// * `FitError::InvalidInput` for a non-positive sample spacing
pub fn spectrum(y: &[f64], dx: f64, options: &SpectrumOptions) -> Result<(Vec<f64>, Vec<f64>)> {
    let n = y.len();
    require_len(n)?;
    if !(dx > 0.0 && dx.is_finite()) {
        return Err(FitError::invalid_input(format!(
            "sample spacing must be positive, got {}",
            dx
        )));
    }
    let window = options.window.coefficients(n);
    let windowed: Vec<f64> = y.iter().zip(&window).map(|(v, w)| v * w).collect();
    let bins = forward_real(&windowed)?;

    // (signed bin index, bin)
    let selected: Vec<(isize, usize)> = if options.two_sided {
        let half = n.div_ceil(2);
        let signed = |k: usize| {
            if k >= half {
                k as isize - n as isize
            } else {
                k as isize
            }
        };
        if options.shift {
            (0..n).map(|i| (i + half) % n).map(|k| (signed(k), k)).collect()
        } else {
            (0..n).map(|k| (k as isize, k)).collect()
        }
    } else {
        (0..=n / 2).map(|k| (k as isize, k)).collect()
    };

    let one_sided_factor = |k: usize| {
        let nyquist = n % 2 == 0 && k == n / 2;
        if !options.two_sided && k != 0 && !nyquist {
            2.0
        } else {
            1.0
        }
    };
    let df = 1.0 / (n as f64 * dx);
    let mut freqs = Vec::with_capacity(selected.len());
    let mut values = Vec::with_capacity(selected.len());
    for (signed, k) in selected {
        let c = bins[k];
        let amplitude = c.norm() / n as f64 * one_sided_factor(k);
        let value = match options.output {
            SpectrumOutput::Magnitude => c.norm(),
            SpectrumOutput::Amplitude => amplitude,
            SpectrumOutput::Power => c.norm_sqr() / n as f64 * one_sided_factor(k),
            SpectrumOutput::Phase => c.arg(),
            SpectrumOutput::Decibel => 20.0 * amplitude.log10(),
            SpectrumOutput::Real => c.re,
            SpectrumOutput::Imaginary => c.im,
        };
        let f = signed as f64 * df;
        freqs.push(match options.scale {
            FrequencyScale::Frequency => f,
            FrequencyScale::Index => signed as f64,
            FrequencyScale::Period => 1.0 / f,
        });
        values.push(value);
    }
    Ok((freqs, values))
}

/// Spectrum of a dataset, using its mean x spacing.
pub fn spectrum_dataset(data: &Dataset, options: &SpectrumOptions) -> Result<GeneratedCurve> {
    let dx = mean_spacing(data.x())?;
    let (x, y) = spectrum(data.y(), dx, options)?;
    GeneratedCurve::new(format!("{} FFT", data.name()), x, y)
}
