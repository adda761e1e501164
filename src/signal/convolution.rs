//! Convolution, deconvolution and correlation.

use log::debug;
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use super::fft::{complex_buffer, forward, inverse};
use super::{extended_axis, mean_spacing};
use crate::data::{Dataset, GeneratedCurve};
use crate::error::{FitError, Result};

/// Inputs up to this length are convolved directly in `Auto` mode.
pub const DIRECT_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConvolutionKind {
    /// Zero-padded; `n + m − 1` output values
    #[default]
    Linear,
    /// Periodic over `max(n, m)` values
    Circular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConvolutionMethod {
    #[default]
    Auto,
    Direct,
    Fft,
}

impl ConvolutionMethod {
    fn use_fft(self, n: usize, m: usize) -> bool {
        match self {
            ConvolutionMethod::Auto => n.max(m) > DIRECT_LIMIT,
            ConvolutionMethod::Direct => false,
            ConvolutionMethod::Fft => true,
        }
    }
}

/// Scaling applied to the response before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseNorm {
    #[default]
    None,
    /// Divide by `Σ|rᵢ|`
    Sum,
    /// Divide by `‖r‖₂`
    Euclidean,
}

impl ResponseNorm {
    fn apply(self, response: &[f64]) -> Vec<f64> {
        let norm = match self {
            ResponseNorm::None => 1.0,
            ResponseNorm::Sum => response.iter().map(|r| r.abs()).sum(),
            ResponseNorm::Euclidean => response.iter().map(|r| r * r).sum::<f64>().sqrt(),
        };
        let norm = if norm == 0.0 { 1.0 } else { norm };
        response.iter().map(|r| r / norm).collect()
    }
}

/// Rotation of the output so the response origin lines up with the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputWrap {
    #[default]
    None,
    /// Origin at the largest response value
    Max,
    /// Origin at the middle of the response
    Center,
}

impl OutputWrap {
    fn origin(self, response: &[f64]) -> usize {
        match self {
            OutputWrap::None => 0,
            OutputWrap::Max => response
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |(best, max), (i, &v)| {
                    if v > max {
                        (i, v)
                    } else {
                        (best, max)
                    }
                })
                .0,
            OutputWrap::Center => response.len() / 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConvolutionOptions {
    pub kind: ConvolutionKind,
    pub method: ConvolutionMethod,
    pub normalization: ResponseNorm,
    pub wrap: OutputWrap,
}

impl ConvolutionOptions {
    pub fn circular() -> Self {
        Self {
            kind: ConvolutionKind::Circular,
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: ConvolutionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_normalization(mut self, normalization: ResponseNorm) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_wrap(mut self, wrap: OutputWrap) -> Self {
        self.wrap = wrap;
        self
    }
}

fn require_nonempty(signal: &[f64], response: &[f64]) -> Result<()> {
    if signal.is_empty() || response.is_empty() {
        return Err(FitError::InsufficientPoints {
            required: 1,
            got: signal.len().min(response.len()),
        });
    }
    Ok(())
}

fn padded_spectrum(values: &[f64], size: usize) -> Result<Vec<Complex<f64>>> {
    let padded = complex_buffer(
        (0..size).map(|i| Complex::new(values.get(i).copied().unwrap_or(0.0), 0.0)),
    )?;
    forward(&padded)
}

fn output_size(kind: ConvolutionKind, n: usize, m: usize) -> usize {
    match kind {
        ConvolutionKind::Linear => n + m - 1,
        ConvolutionKind::Circular => n.max(m),
    }
}

fn direct_convolution(signal: &[f64], response: &[f64], kind: ConvolutionKind) -> Vec<f64> {
    let size = output_size(kind, signal.len(), response.len());
    let mut out = vec![0.0; size];
    for (i, &s) in signal.iter().enumerate() {
        for (j, &r) in response.iter().enumerate() {
            let k = match kind {
                ConvolutionKind::Linear => i + j,
                ConvolutionKind::Circular => (i + j) % size,
            };
            out[k] += s * r;
        }
    }
    out
}

fn fft_convolution(signal: &[f64], response: &[f64], kind: ConvolutionKind) -> Result<Vec<f64>> {
    let size = output_size(kind, signal.len(), response.len());
    if size < 2 {
        return Ok(direct_convolution(signal, response, kind));
    }
    let s = padded_spectrum(signal, size)?;
    let r = padded_spectrum(response, size)?;
    let product: Vec<Complex<f64>> = s.iter().zip(&r).map(|(a, b)| a * b).collect();
    Ok(inverse(&product)?.into_iter().map(|c| c.re).collect())
}

/// Convolve `signal` with `response`.
///
/// # Errors
///
/// * `FitError::InsufficientPoints` if either input is empty
pub fn convolve(signal: &[f64], response: &[f64], options: &ConvolutionOptions) -> Result<Vec<f64>> {
    require_nonempty(signal, response)?;
    let response = options.normalization.apply(response);
    let (n, m) = (signal.len(), response.len());
    let result = if options.method.use_fft(n, m) {
        fft_convolution(signal, &response, options.kind)?
    } else {
        direct_convolution(signal, &response, options.kind)
    };
    debug!(
        "convolution of {} by {} points ({:?}), {} values",
        n,
        m,
        options.kind,
        result.len()
    );
    let origin = options.wrap.origin(&response);
    if origin == 0 {
        return Ok(result);
    }
    let size = result.len();
    let mut wrapped = vec![0.0; size];
    for (j, value) in result.into_iter().enumerate() {
        wrapped[(j + size - origin % size) % size] = value;
    }
    Ok(wrapped)
}

/// Convolve a dataset with `response`, continuing its x spacing over the output.
pub fn convolve_dataset(
    signal: &Dataset,
    response: &[f64],
    options: &ConvolutionOptions,
) -> Result<GeneratedCurve> {
    let y = convolve(signal.y(), response, options)?;
    let x = extended_axis(signal, y.len())?;
    GeneratedCurve::new(format!("{} convolution", signal.name()), x, y)
}

/// Undo a circular convolution with a centred, odd-length response by
/// spectral division. Bins where the response vanishes are zeroed.
///
/// # Errors
///
/// * `FitError::ResponseLengthMustBeOdd` for an even response length
/// * `FitError::ResponseTooLarge` if the response is longer than half the signal
pub fn deconvolve(signal: &[f64], response: &[f64], normalization: ResponseNorm) -> Result<Vec<f64>> {
    let (n, m) = (signal.len(), response.len());
    if m % 2 == 0 {
        return Err(FitError::ResponseLengthMustBeOdd(m));
    }
    if m > n / 2 {
        return Err(FitError::ResponseTooLarge {
            response: m,
            signal: n,
        });
    }
    let response = normalization.apply(response);
    let mut centred = vec![0.0; n];
    let half = (m / 2) as isize;
    for (i, &r) in response.iter().enumerate() {
        centred[(i as isize - half).rem_euclid(n as isize) as usize] = r;
    }
    let s = padded_spectrum(signal, n)?;
    let r = padded_spectrum(&centred, n)?;
    let largest = r.iter().fold(0.0_f64, |max, c| max.max(c.norm()));
    let threshold = largest * 1e-12;
    let quotient: Vec<Complex<f64>> = s
        .iter()
        .zip(&r)
        .map(|(a, b)| {
            if b.norm() <= threshold {
                Complex::new(0.0, 0.0)
            } else {
                a / b
            }
        })
        .collect();
    Ok(inverse(&quotient)?.into_iter().map(|c| c.re).collect())
}

pub fn deconvolve_dataset(
    signal: &Dataset,
    response: &[f64],
    normalization: ResponseNorm,
) -> Result<GeneratedCurve> {
    let y = deconvolve(signal.y(), response, normalization)?;
    GeneratedCurve::new(
        format!("{} deconvolution", signal.name()),
        signal.x().to_vec(),
        y,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CorrelationNorm {
    #[default]
    None,
    /// Divide by `max(n, m)`
    Biased,
    /// Divide by the number of overlapping terms at each lag
    Unbiased,
    /// Divide by `√(Σa² Σb²)`
    Coefficient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorrelationOptions {
    pub kind: ConvolutionKind,
    pub method: ConvolutionMethod,
    pub normalization: CorrelationNorm,
}

impl CorrelationOptions {
    pub fn circular() -> Self {
        Self {
            kind: ConvolutionKind::Circular,
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: ConvolutionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_normalization(mut self, normalization: CorrelationNorm) -> Self {
        self.normalization = normalization;
        self
    }
}

/// Lags covered by a correlation, in output order.
fn lags(kind: ConvolutionKind, n: usize, m: usize) -> Vec<isize> {
    match kind {
        ConvolutionKind::Linear => (-(m as isize - 1)..n as isize).collect(),
        ConvolutionKind::Circular => (0..n.max(m) as isize).collect(),
    }
}

/// Cross-correlation `c[lag] = Σᵢ a[i + lag]·b[i]`.
///
/// Linear correlation covers lags `−(m − 1)..=n − 1`; circular covers
/// `0..max(n, m)`.
pub fn correlate(a: &[f64], b: &[f64], options: &CorrelationOptions) -> Result<Vec<f64>> {
    require_nonempty(a, b)?;
    let (n, m) = (a.len(), b.len());
    let lags = lags(options.kind, n, m);
    let mut out = if options.method.use_fft(n, m) && lags.len() >= 2 {
        let size = output_size(options.kind, n, m);
        let fa = padded_spectrum(a, size)?;
        let fb = padded_spectrum(b, size)?;
        let product: Vec<Complex<f64>> = fa.iter().zip(&fb).map(|(x, y)| x * y.conj()).collect();
        let circular: Vec<f64> = inverse(&product)?.into_iter().map(|c| c.re).collect();
        lags.iter()
            .map(|&lag| circular[lag.rem_euclid(size as isize) as usize])
            .collect::<Vec<f64>>()
    } else {
        let size = n.max(m) as isize;
        lags.iter()
            .map(|&lag| {
                (0..m as isize)
                    .filter_map(|i| {
                        let k = match options.kind {
                            ConvolutionKind::Linear => i + lag,
                            ConvolutionKind::Circular => (i + lag).rem_euclid(size),
                        };
                        a.get(usize::try_from(k).ok()?).map(|v| v * b[i as usize])
                    })
                    .sum()
            })
            .collect::<Vec<f64>>()
    };

    match options.normalization {
        CorrelationNorm::None => {}
        CorrelationNorm::Biased => {
            let scale = n.max(m) as f64;
            out.iter_mut().for_each(|v| *v /= scale);
        }
        CorrelationNorm::Unbiased => {
            for (v, &lag) in out.iter_mut().zip(&lags) {
                let overlap = match options.kind {
                    ConvolutionKind::Linear => {
                        let first = (-lag).max(0);
                        let last = (m as isize).min(n as isize - lag);
                        (last - first).max(1)
                    }
                    ConvolutionKind::Circular => n.max(m) as isize,
                };
                *v /= overlap as f64;
            }
        }
        CorrelationNorm::Coefficient => {
            let energy = (a.iter().map(|v| v * v).sum::<f64>() * b.iter().map(|v| v * v).sum::<f64>())
                .sqrt();
            if energy > 0.0 {
                out.iter_mut().for_each(|v| *v /= energy);
            }
        }
    }
    Ok(out)
}

/// Correlate a dataset against `reference`; x values are lags scaled by the spacing.
pub fn correlate_dataset(
    data: &Dataset,
    reference: &[f64],
    options: &CorrelationOptions,
) -> Result<GeneratedCurve> {
    let dx = mean_spacing(data.x())?;
    let y = correlate(data.y(), reference, options)?;
    let x = lags(options.kind, data.len(), reference.len())
        .into_iter()
        .map(|lag| lag as f64 * dx)
        .collect();
    GeneratedCurve::new(format!("{} correlation", data.name()), x, y)
}

/// Standard response kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kernel {
    Average(usize),
    Triangle(usize),
    /// Sizes 5, 7 and 9
    PseudoGaussian(usize),
    FirstDerivative,
    /// Odd sizes
    SmoothFirstDerivative(usize),
    SecondDerivative,
    ThirdDerivative,
    FourthDerivative,
    /// Width `n/5`
    Gaussian(usize),
    /// Width `n/5`
    Lorentzian(usize),
}

/// Coefficients of a standard kernel.
///
/// # Errors
///
/// * `FitError::InvalidInput` for a size the kernel does not support
pub fn kernel(kind: Kernel) -> Result<Vec<f64>> {
    let unsupported = |n: usize| {
        Err(FitError::invalid_input(format!(
            "size {} is not supported by the {:?} kernel",
            n, kind
        )))
    };
    let profile = |n: usize, f: &dyn Fn(f64, f64) -> f64| {
        let s = n as f64 / 5.0;
        (0..n)
            .map(|i| f(i as f64 - (n as f64 - 1.0) / 2.0, s))
            .collect::<Vec<f64>>()
    };
    match kind {
        Kernel::Average(n) | Kernel::Triangle(n) | Kernel::Gaussian(n) | Kernel::Lorentzian(n)
            if n == 0 =>
        {
            unsupported(n)
        }
        Kernel::Average(n) => Ok(vec![1.0; n]),
        Kernel::Triangle(n) => Ok((0..n)
            .map(|i| (if i < n / 2 { i + 1 } else { n - i }) as f64)
            .collect()),
        Kernel::PseudoGaussian(5) => Ok(vec![1.0, 4.0, 6.0, 4.0, 1.0]),
        Kernel::PseudoGaussian(7) => Ok(vec![1.0, 4.0, 8.0, 10.0, 8.0, 4.0, 1.0]),
        Kernel::PseudoGaussian(9) => Ok(vec![1.0, 4.0, 9.0, 14.0, 17.0, 14.0, 9.0, 4.0, 1.0]),
        Kernel::PseudoGaussian(n) => unsupported(n),
        Kernel::FirstDerivative => Ok(vec![-1.0, 1.0]),
        Kernel::SmoothFirstDerivative(n) if n >= 3 && n % 2 == 1 => {
            Ok((0..n).map(|i| i as f64 - (n / 2) as f64).collect())
        }
        Kernel::SmoothFirstDerivative(n) => unsupported(n),
        Kernel::SecondDerivative => Ok(vec![1.0, -2.0, 1.0]),
        Kernel::ThirdDerivative => Ok(vec![1.0, -3.0, 3.0, -1.0]),
        Kernel::FourthDerivative => Ok(vec![1.0, -4.0, 6.0, -4.0, 1.0]),
        Kernel::Gaussian(n) => Ok(profile(n, &|x, s| {
            let norm = 1.0 / (2.0 * std::f64::consts::PI).sqrt() / s;
            norm * (-x * x / (2.0 * s * s)).exp()
        })),
        Kernel::Lorentzian(n) => Ok(profile(n, &|x, s| s / std::f64::consts::PI / (s * s + x * x))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert_relative_eq!(*x, *y, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_linear_convolution() {
        let out = convolve(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5], &ConvolutionOptions::default()).unwrap();
        assert_close(&out, &[0.0, 1.0, 2.5, 4.0, 1.5]);
    }

    #[test]
    fn test_direct_matches_fft() {
        let signal: Vec<f64> = (0..37).map(|i| ((i * 7) % 11) as f64).collect();
        let response = [0.25, 0.5, 0.25, 0.1];
        for options in [ConvolutionOptions::default(), ConvolutionOptions::circular()] {
            let direct = convolve(&signal, &response, &options.with_method(ConvolutionMethod::Direct)).unwrap();
            let fft = convolve(&signal, &response, &options.with_method(ConvolutionMethod::Fft)).unwrap();
            assert_close(&direct, &fft);
        }
    }

    #[test]
    fn test_normalization_and_wrap() {
        let options = ConvolutionOptions::circular()
            .with_normalization(ResponseNorm::Sum)
            .with_wrap(OutputWrap::Center);
        // Impulse at index 2 stays at index 2 after a centred smoothing kernel
        let out = convolve(&[0.0, 0.0, 4.0, 0.0, 0.0, 0.0], &[1.0, 2.0, 1.0], &options).unwrap();
        assert_close(&out, &[0.0, 1.0, 2.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_deconvolution_round_trip() {
        let signal: Vec<f64> = (0..32).map(|i| (i as f64 * 0.4).sin() + 1.0).collect();
        let response = [1.0, 4.0, 1.0];
        let options = ConvolutionOptions::circular().with_wrap(OutputWrap::Center);
        let blurred = convolve(&signal, &response, &options).unwrap();
        let restored = deconvolve(&blurred, &response, ResponseNorm::None).unwrap();
        assert_close(&restored, &signal);
    }

    #[test]
    fn test_deconvolution_preconditions() {
        let signal = [0.0; 16];
        assert!(matches!(
            deconvolve(&signal, &[1.0, 1.0], ResponseNorm::None),
            Err(FitError::ResponseLengthMustBeOdd(2))
        ));
        assert!(matches!(
            deconvolve(&signal, &[1.0; 9], ResponseNorm::None),
            Err(FitError::ResponseTooLarge { response: 9, signal: 16 })
        ));
    }

    #[test]
    fn test_autocorrelation_peaks_at_zero_lag() {
        let a = [1.0, 3.0, -2.0, 0.5, 2.0];
        let options = CorrelationOptions::default().with_normalization(CorrelationNorm::Coefficient);
        let out = correlate(&a, &a, &options).unwrap();
        assert_eq!(out.len(), 9);
        assert_relative_eq!(out[4], 1.0, epsilon = 1e-12);
        assert!(out.iter().all(|&v| v <= 1.0 + 1e-12));

        let fft = correlate(&a, &a, &options.with_method(ConvolutionMethod::Fft)).unwrap();
        assert_close(&out, &fft);
    }

    #[test]
    fn test_unbiased_correlation() {
        let a = [1.0; 4];
        let options = CorrelationOptions::default().with_normalization(CorrelationNorm::Unbiased);
        let out = correlate(&a, &a, &options).unwrap();
        assert_close(&out, &[1.0; 7]);
    }

    #[test]
    fn test_kernels() {
        assert_eq!(kernel(Kernel::Triangle(5)).unwrap(), vec![1.0, 2.0, 3.0, 2.0, 1.0]);
        assert_eq!(kernel(Kernel::SmoothFirstDerivative(5)).unwrap(), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_relative_eq!(kernel(Kernel::PseudoGaussian(7)).unwrap().iter().sum::<f64>(), 36.0);
        assert!(matches!(kernel(Kernel::PseudoGaussian(6)), Err(FitError::InvalidInput(_))));
        let gauss = kernel(Kernel::Gaussian(11)).unwrap();
        assert_relative_eq!(gauss[5], gauss.iter().cloned().fold(f64::MIN, f64::max));
    }
}
