//! Piecewise-cubic interpolation.
//!
//! All three methods are stored as `a + b·h + c·h² + d·h³` on each interval
//! (`h = t − xᵢ`), so values, derivatives and running integrals share one
//! evaluator.

use serde::{Deserialize, Serialize};

use crate::data::{linspace, Dataset, GeneratedCurve};
use crate::error::{FitError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMethod {
    #[default]
    Linear,
    /// Natural cubic spline (zero curvature at both ends)
    CubicSpline,
    Akima,
}

impl InterpolationMethod {
    pub fn min_points(self) -> usize {
        match self {
            InterpolationMethod::Linear => 2,
            InterpolationMethod::CubicSpline => 3,
            InterpolationMethod::Akima => 5,
        }
    }
}

/// What is sampled from the interpolant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationOutput {
    #[default]
    Function,
    FirstDerivative,
    SecondDerivative,
    /// `∫ from x₀ to t`
    Integral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interpolant {
    method: InterpolationMethod,
    x: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
    // integral from x[0] to x[i]
    cumulative: Vec<f64>,
}

impl Interpolant {
    /// Build an interpolant through `(x, y)`. Points are sorted by x first.
    ///
    /// # Errors
    ///
    /// * `FitError::DimensionMismatch` if `x` and `y` differ in length
    /// * `FitError::InsufficientPoints` below 2 (linear), 3 (spline) or 5 (Akima) points
    /// * `FitError::DuplicateXValues` if two points share an x value
    pub fn new(x: &[f64], y: &[f64], method: InterpolationMethod) -> Result<Self> {
        if x.len() != y.len() {
            return Err(FitError::DimensionMismatch(format!(
                "{} x values but {} y values",
                x.len(),
                y.len()
            )));
        }
        let required = method.min_points();
        if x.len() < required {
            return Err(FitError::InsufficientPoints {
                required,
                got: x.len(),
            });
        }
        let mut points: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        points.sort_by(|p, q| p.0.total_cmp(&q.0));
        if let Some(pair) = points.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(FitError::DuplicateXValues(pair[0].0));
        }
        let (x, y): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();

        let n = x.len();
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let slopes: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / h[i]).collect();
        let a = y[..n - 1].to_vec();
        let (b, c, d) = match method {
            InterpolationMethod::Linear => (slopes, vec![0.0; n - 1], vec![0.0; n - 1]),
            InterpolationMethod::CubicSpline => natural_spline(&h, &slopes),
            InterpolationMethod::Akima => {
                let tangents = akima_tangents(&slopes);
                hermite(&h, &slopes, &tangents)
            }
        };

        let mut cumulative = Vec::with_capacity(n);
        cumulative.push(0.0);
        for i in 0..n - 1 {
            let hi = h[i];
            let piece = a[i] * hi + b[i] * hi.powi(2) / 2.0 + c[i] * hi.powi(3) / 3.0
                + d[i] * hi.powi(4) / 4.0;
            cumulative.push(cumulative[i] + piece);
        }
        Ok(Self {
            method,
            x,
            a,
            b,
            c,
            d,
            cumulative,
        })
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// `(x₀, xₙ₋₁)`
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    fn locate(&self, t: f64) -> (usize, f64) {
        let last = self.x.len() - 2;
        let i = self.x.partition_point(|&xi| xi <= t).saturating_sub(1).min(last);
        (i, t - self.x[i])
    }

    pub fn value(&self, t: f64) -> f64 {
        let (i, h) = self.locate(t);
        self.a[i] + h * (self.b[i] + h * (self.c[i] + h * self.d[i]))
    }

    pub fn derivative(&self, t: f64) -> f64 {
        let (i, h) = self.locate(t);
        self.b[i] + h * (2.0 * self.c[i] + 3.0 * self.d[i] * h)
    }

    pub fn second_derivative(&self, t: f64) -> f64 {
        let (i, h) = self.locate(t);
        2.0 * self.c[i] + 6.0 * self.d[i] * h
    }

    /// Integral from `x₀` to `t`.
    pub fn integral(&self, t: f64) -> f64 {
        let (i, h) = self.locate(t);
        self.cumulative[i]
            + h * (self.a[i] + h * (self.b[i] / 2.0 + h * (self.c[i] / 3.0 + h * self.d[i] / 4.0)))
    }

    pub fn evaluate(&self, t: f64, output: InterpolationOutput) -> f64 {
        match output {
            InterpolationOutput::Function => self.value(t),
            InterpolationOutput::FirstDerivative => self.derivative(t),
            InterpolationOutput::SecondDerivative => self.second_derivative(t),
            InterpolationOutput::Integral => self.integral(t),
        }
    }
}

/// Coefficients `(b, c, d)` of the natural spline from its second derivatives.
fn natural_spline(h: &[f64], slopes: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = h.len() + 1;
    let mut second = vec![0.0; n];
    if n > 2 {
        // Thomas algorithm on the interior equations
        let inner = n - 2;
        let mut diag = vec![0.0; inner];
        let mut rhs = vec![0.0; inner];
        for k in 0..inner {
            diag[k] = 2.0 * (h[k] + h[k + 1]);
            rhs[k] = 6.0 * (slopes[k + 1] - slopes[k]);
        }
        for k in 1..inner {
            let factor = h[k] / diag[k - 1];
            diag[k] -= factor * h[k];
            rhs[k] -= factor * rhs[k - 1];
        }
        second[inner] = rhs[inner - 1] / diag[inner - 1];
        for k in (0..inner - 1).rev() {
            second[k + 1] = (rhs[k] - h[k + 1] * second[k + 2]) / diag[k];
        }
    }
    let mut b = Vec::with_capacity(n - 1);
    let mut c = Vec::with_capacity(n - 1);
    let mut d = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        b.push(slopes[i] - h[i] * (2.0 * second[i] + second[i + 1]) / 6.0);
        c.push(second[i] / 2.0);
        d.push((second[i + 1] - second[i]) / (6.0 * h[i]));
    }
    (b, c, d)
}

/// Akima tangents, extending the slopes by two extrapolated values at each end.
fn akima_tangents(slopes: &[f64]) -> Vec<f64> {
    let count = slopes.len();
    let mut m = Vec::with_capacity(count + 4);
    let first = 2.0 * slopes[0] - slopes[1];
    m.push(2.0 * first - slopes[0]);
    m.push(first);
    m.extend_from_slice(slopes);
    let last = 2.0 * slopes[count - 1] - slopes[count - 2];
    m.push(last);
    m.push(2.0 * last - slopes[count - 1]);

    // slope m_k lives at m[k + 2]
    (0..=count)
        .map(|i| {
            let w1 = (m[i + 3] - m[i + 2]).abs();
            let w2 = (m[i + 1] - m[i]).abs();
            if w1 + w2 == 0.0 {
                (m[i + 1] + m[i + 2]) / 2.0
            } else {
                (w1 * m[i + 1] + w2 * m[i + 2]) / (w1 + w2)
            }
        })
        .collect()
}

fn hermite(h: &[f64], slopes: &[f64], tangents: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let b = tangents[..h.len()].to_vec();
    let (c, d) = (0..h.len())
        .map(|i| {
            let c = (3.0 * slopes[i] - 2.0 * tangents[i] - tangents[i + 1]) / h[i];
            let d = (tangents[i] + tangents[i + 1] - 2.0 * slopes[i]) / (h[i] * h[i]);
            (c, d)
        })
        .unzip();
    (b, c, d)
}

fn check_request(interpolant: &Interpolant, from: f64, to: f64, points: usize) -> Result<()> {
    if points < 2 {
        return Err(FitError::invalid_input(format!(
            "at least 2 output points are required, got {}",
            points
        )));
    }
    if !(from < to) {
        return Err(FitError::InvalidRange { min: from, max: to });
    }
    let (data_min, data_max) = interpolant.domain();
    if from < data_min || to > data_max {
        return Err(FitError::BoundsOutOfRange {
            lower: from,
            upper: to,
            data_min,
            data_max,
        });
    }
    Ok(())
}

/// Resample `(x, y)` at `points` evenly spaced values over `[from, to]`.
///
/// # Errors
///
/// * `FitError::InvalidRange` unless `from < to`
/// * `FitError::BoundsOutOfRange` if the range reaches outside the data
/// * the construction errors of [`Interpolant::new`]
pub fn interpolate(
    x: &[f64],
    y: &[f64],
    method: InterpolationMethod,
    output: InterpolationOutput,
    from: f64,
    to: f64,
    points: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let interpolant = Interpolant::new(x, y, method)?;
    check_request(&interpolant, from, to, points)?;
    let xs = linspace(from, to, points)?;
    let ys = xs.iter().map(|&t| interpolant.evaluate(t, output)).collect();
    Ok((xs, ys))
}

pub fn interpolate_dataset(
    data: &Dataset,
    method: InterpolationMethod,
    output: InterpolationOutput,
    from: f64,
    to: f64,
    points: usize,
) -> Result<GeneratedCurve> {
    let (x, y) = interpolate(data.x(), data.y(), method, output, from, to, points)?;
    GeneratedCurve::new(format!("{} interpolated", data.name()), x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_interpolation() {
        let interp = Interpolant::new(&[0.0, 1.0, 3.0], &[0.0, 2.0, 0.0], InterpolationMethod::Linear).unwrap();
        assert_relative_eq!(interp.value(0.5), 1.0);
        assert_relative_eq!(interp.value(2.0), 1.0);
        assert_relative_eq!(interp.derivative(2.0), -1.0);
        assert_relative_eq!(interp.integral(3.0), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cubic_methods_reproduce_lines() {
        let x: Vec<f64> = vec![0.0, 0.5, 1.5, 2.0, 3.0, 4.5];
        let y: Vec<f64> = x.iter().map(|x| 3.0 * x - 1.0).collect();
        for method in [InterpolationMethod::CubicSpline, InterpolationMethod::Akima] {
            let interp = Interpolant::new(&x, &y, method).unwrap();
            for t in [0.1, 1.0, 2.7, 4.4] {
                assert_relative_eq!(interp.value(t), 3.0 * t - 1.0, epsilon = 1e-10);
                assert_relative_eq!(interp.derivative(t), 3.0, epsilon = 1e-10);
                assert_relative_eq!(interp.second_derivative(t), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_spline_approximates_sine() {
        let x: Vec<f64> = (0..=20).map(|i| i as f64 * 0.1 * std::f64::consts::PI).collect();
        let y: Vec<f64> = x.iter().map(|x| x.sin()).collect();
        let interp = Interpolant::new(&x, &y, InterpolationMethod::CubicSpline).unwrap();
        assert_relative_eq!(interp.value(1.0), 1.0_f64.sin(), epsilon = 1e-4);
        // natural end conditions
        assert_relative_eq!(interp.second_derivative(0.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(interp.integral(std::f64::consts::PI), 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let interp = Interpolant::new(&[2.0, 0.0, 1.0], &[4.0, 0.0, 1.0], InterpolationMethod::Linear).unwrap();
        assert_eq!(interp.domain(), (0.0, 2.0));
        assert_relative_eq!(interp.value(1.5), 2.5);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Interpolant::new(&[0.0, 1.0, 1.0], &[0.0, 1.0, 2.0], InterpolationMethod::CubicSpline),
            Err(FitError::DuplicateXValues(v)) if v == 1.0
        ));
        assert!(matches!(
            Interpolant::new(&[0.0, 1.0, 2.0, 3.0], &[0.0; 4], InterpolationMethod::Akima),
            Err(FitError::InsufficientPoints { required: 5, got: 4 })
        ));
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 4.0];
        let out = InterpolationOutput::Function;
        assert!(matches!(
            interpolate(&x, &y, InterpolationMethod::Linear, out, 1.0, 1.0, 5),
            Err(FitError::InvalidRange { .. })
        ));
        assert!(matches!(
            interpolate(&x, &y, InterpolationMethod::Linear, out, -1.0, 1.0, 5),
            Err(FitError::BoundsOutOfRange { .. })
        ));
    }

    #[test]
    fn test_resample_dataset() {
        let data = Dataset::from_xy("raw", &[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]).unwrap();
        let curve = interpolate_dataset(
            &data,
            InterpolationMethod::Linear,
            InterpolationOutput::Function,
            0.0,
            2.0,
            5,
        )
        .unwrap();
        assert_eq!(curve.x, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_relative_eq!(curve.y[3], 1.5);
    }
}
