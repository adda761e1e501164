//! Smoothing filters.
//!
//! Savitzky–Golay coefficients come from the least-squares projection
//! `V(VᵀV)⁻¹Vᵀ` of a local polynomial basis. The row of the projection that
//! belongs to the output point is the convolution kernel, so edge points use
//! the row for their position inside a window shifted into the data.

use std::f64::consts::PI;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::fft::{forward_real, inverse_real};
use crate::data::{Dataset, GeneratedCurve};
use crate::error::{FitError, Result};
use crate::utils::{linalg, stats};

/// How windows are completed near the ends of the data.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Padding {
    /// Shrink the window to the available points
    None,
    /// Shift the window so it stays inside the data
    #[default]
    Interpolating,
    /// Reflect about the end points, `y[-k] = y[k]`
    Mirror,
    /// Repeat the end points
    Nearest,
    /// Pad with fixed values
    Constant { left: f64, right: f64 },
    /// Wrap around
    Periodic,
}

impl Padding {
    fn fetch(&self, y: &[f64], index: isize) -> f64 {
        let n = y.len() as isize;
        if (0..n).contains(&index) {
            return y[index as usize];
        }
        match *self {
            Padding::Constant { left, right } => {
                if index < 0 {
                    left
                } else {
                    right
                }
            }
            Padding::Periodic => y[index.rem_euclid(n) as usize],
            Padding::Mirror if n > 1 => {
                let period = 2 * (n - 1);
                let folded = index.rem_euclid(period);
                let i = if folded < n { folded } else { period - folded };
                y[i as usize]
            }
            _ => y[index.clamp(0, n - 1) as usize],
        }
    }

    fn is_padded(&self) -> bool {
        !matches!(self, Padding::None | Padding::Interpolating)
    }
}

fn sg_coefficients(left: usize, right: usize, order: usize, row: usize) -> Result<Vec<f64>> {
    let window = left + right + 1;
    let scale = left.max(right).max(1) as f64;
    let basis = Array2::from_shape_fn((window, order + 1), |(j, p)| {
        ((j as f64 - left as f64) / scale).powi(p as i32)
    });
    let inverse = linalg::invert_symmetric(&linalg::normal_matrix(&basis))?;
    let projection = inverse.dot(&basis.t());
    Ok(basis.row(row).dot(&projection).to_vec())
}

fn apply_kernel(y: &[f64], start: isize, kernel: &[f64], padding: &Padding) -> f64 {
    kernel
        .iter()
        .enumerate()
        .map(|(j, w)| w * padding.fetch(y, start + j as isize))
        .sum()
}

/// Savitzky–Golay smoothing with `left` and `right` neighbours and a local
/// polynomial of degree `order`.
///
/// # Errors
///
/// * `FitError::OrderTooHigh` if `order >= left + right + 1`
/// * `FitError::InsufficientPoints` if the window is longer than the data
pub fn savitzky_golay(
    y: &[f64],
    left: usize,
    right: usize,
    order: usize,
    padding: &Padding,
) -> Result<Vec<f64>> {
    let n = y.len();
    let window = left + right + 1;
    if order >= window {
        return Err(FitError::OrderTooHigh { order, window });
    }
    if window > n {
        return Err(FitError::InsufficientPoints {
            required: window,
            got: n,
        });
    }
    let central = sg_coefficients(left, right, order, left)?;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let value = match padding {
            Padding::Interpolating => {
                let start = i.saturating_sub(left).min(n - window);
                let row = i - start;
                if row == left {
                    apply_kernel(y, start as isize, &central, padding)
                } else {
                    let kernel = sg_coefficients(left, right, order, row)?;
                    apply_kernel(y, start as isize, &kernel, padding)
                }
            }
            Padding::None => {
                let l = left.min(i);
                let r = right.min(n - 1 - i);
                if l == left && r == right {
                    apply_kernel(y, (i - l) as isize, &central, padding)
                } else {
                    let reduced = order.min((l + r + 1).saturating_sub(2));
                    let kernel = sg_coefficients(l, r, reduced, l)?;
                    apply_kernel(y, (i - l) as isize, &kernel, padding)
                }
            }
            _ => apply_kernel(y, i as isize - left as isize, &central, padding),
        };
        out.push(value);
    }
    Ok(out)
}

/// Where a moving-average window sits relative to its output point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovingAverageKind {
    /// Centred on the point; needs an odd window
    #[default]
    Central,
    /// The point and the `points − 1` before it
    Lagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmoothWeight {
    #[default]
    Uniform,
    Triangular,
    Parabolic,
    Tricube,
    Cosine,
}

impl SmoothWeight {
    /// Normalised weights for a window of `np` points.
    fn weights(self, np: usize, kind: MovingAverageKind) -> Vec<f64> {
        let raw: Vec<f64> = (0..np)
            .map(|j| {
                let j = j as f64;
                let size = np as f64;
                match kind {
                    MovingAverageKind::Central => {
                        let d = j - (size - 1.0) / 2.0;
                        let u = 2.0 * d / (size + 1.0);
                        match self {
                            SmoothWeight::Uniform => 1.0,
                            SmoothWeight::Triangular => (j + 1.0).min(size - j),
                            SmoothWeight::Parabolic => 1.0 - u * u,
                            SmoothWeight::Tricube => (1.0 - u.abs().powi(3)).powi(3),
                            SmoothWeight::Cosine => (PI / 2.0 * d / ((size + 1.0) / 2.0)).cos(),
                        }
                    }
                    MovingAverageKind::Lagged => {
                        let u = (size - 1.0 - j) / size;
                        match self {
                            SmoothWeight::Uniform => 1.0,
                            SmoothWeight::Triangular => j + 1.0,
                            SmoothWeight::Parabolic => 1.0 - u * u,
                            SmoothWeight::Tricube => (1.0 - u.powi(3)).powi(3),
                            SmoothWeight::Cosine => (PI / 2.0 * u).cos(),
                        }
                    }
                }
            })
            .collect();
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / total).collect()
    }
}

/// Start and size of the window for output point `i`, before padding.
fn window_for(
    i: usize,
    n: usize,
    points: usize,
    kind: MovingAverageKind,
    padding: &Padding,
) -> (isize, usize) {
    let half = (points - 1) / 2;
    match (kind, padding) {
        (MovingAverageKind::Central, Padding::None) => {
            let h = half.min(i).min(n - 1 - i);
            ((i - h) as isize, 2 * h + 1)
        }
        (MovingAverageKind::Central, Padding::Interpolating) => {
            (i.saturating_sub(half).min(n - points) as isize, points)
        }
        (MovingAverageKind::Central, _) => (i as isize - half as isize, points),
        (MovingAverageKind::Lagged, Padding::None) => {
            let np = points.min(i + 1);
            ((i + 1 - np) as isize, np)
        }
        (MovingAverageKind::Lagged, Padding::Interpolating) => {
            ((i + 1).saturating_sub(points) as isize, points)
        }
        (MovingAverageKind::Lagged, _) => (i as isize + 1 - points as isize, points),
    }
}

fn check_window(n: usize, points: usize, kind: MovingAverageKind, padding: &Padding) -> Result<()> {
    if points == 0 {
        return Err(FitError::invalid_input("smoothing window must have at least 1 point"));
    }
    if kind == MovingAverageKind::Central && points % 2 == 0 {
        return Err(FitError::invalid_input(format!(
            "central smoothing window must be odd, got {}",
            points
        )));
    }
    if n == 0 || (!padding.is_padded() && points > n) {
        return Err(FitError::InsufficientPoints {
            required: points,
            got: n,
        });
    }
    Ok(())
}

/// Weighted moving average over `points` values.
///
/// # Errors
///
/// * `FitError::InvalidInput` for an empty window or an even central window
/// * `FitError::InsufficientPoints` if an unpadded window is longer than the data
pub fn moving_average(
    y: &[f64],
    points: usize,
    kind: MovingAverageKind,
    weight: SmoothWeight,
    padding: &Padding,
) -> Result<Vec<f64>> {
    let n = y.len();
    check_window(n, points, kind, padding)?;
    let full = weight.weights(points, kind);
    let out = (0..n)
        .map(|i| {
            let (start, size) = window_for(i, n, points, kind, padding);
            if size == points {
                apply_kernel(y, start, &full, padding)
            } else {
                apply_kernel(y, start, &weight.weights(size, kind), padding)
            }
        })
        .collect();
    Ok(out)
}

/// Running percentile over a centred window of `points` values. `p = 0.5`
/// is a running median.
pub fn percentile_filter(y: &[f64], points: usize, p: f64, padding: &Padding) -> Result<Vec<f64>> {
    if !(0.0..=1.0).contains(&p) {
        return Err(FitError::invalid_input(format!(
            "percentile must be within [0, 1], got {}",
            p
        )));
    }
    let n = y.len();
    let kind = MovingAverageKind::Central;
    check_window(n, points, kind, padding)?;
    let mut window = Vec::with_capacity(points);
    let out = (0..n)
        .map(|i| {
            let (start, size) = window_for(i, n, points, kind, padding);
            window.clear();
            window.extend((0..size).map(|j| padding.fetch(y, start + j as isize)));
            stats::percentile(&window, p)
        })
        .collect();
    Ok(out)
}

/// Low-pass smoothing in the frequency domain.
///
/// The cutoff sits at bin `n / points`; gains follow a raised cosine from 1
/// at zero frequency down to 0 at the cutoff.
pub fn fft_smooth(y: &[f64], points: usize) -> Result<Vec<f64>> {
    if points < 2 {
        return Err(FitError::invalid_input(format!(
            "FFT smoothing needs at least 2 points, got {}",
            points
        )));
    }
    let n = y.len();
    let mut bins = forward_real(y)?;
    let cutoff = n as f64 / points as f64;
    for (k, bin) in bins.iter_mut().enumerate() {
        let m = k.min(n - k) as f64;
        let gain = if m < cutoff {
            0.5 * (1.0 + (PI * m / cutoff).cos())
        } else {
            0.0
        };
        *bin *= gain;
    }
    inverse_real(&bins)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SmoothMethod {
    SavitzkyGolay {
        left: usize,
        right: usize,
        order: usize,
    },
    Fft {
        points: usize,
    },
    MovingAverage {
        points: usize,
        kind: MovingAverageKind,
        weight: SmoothWeight,
    },
    Percentile {
        points: usize,
        percentile: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothOptions {
    pub method: SmoothMethod,
    pub padding: Padding,
}

impl SmoothOptions {
    pub fn new(method: SmoothMethod) -> Self {
        Self {
            method,
            padding: Padding::default(),
        }
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// Run the configured smoother over `y`.
    pub fn apply(&self, y: &[f64]) -> Result<Vec<f64>> {
        match self.method {
            SmoothMethod::SavitzkyGolay { left, right, order } => {
                savitzky_golay(y, left, right, order, &self.padding)
            }
            SmoothMethod::Fft { points } => fft_smooth(y, points),
            SmoothMethod::MovingAverage {
                points,
                kind,
                weight,
            } => moving_average(y, points, kind, weight, &self.padding),
            SmoothMethod::Percentile { points, percentile } => {
                percentile_filter(y, points, percentile, &self.padding)
            }
        }
    }
}

/// Smooth the y values of a dataset.
pub fn smooth_dataset(data: &Dataset, options: &SmoothOptions) -> Result<GeneratedCurve> {
    let y = options.apply(data.y())?;
    GeneratedCurve::new(format!("{} smoothed", data.name()), data.x().to_vec(), y)
}
