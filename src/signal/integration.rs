//! Numerical integration.
//!
//! [`integrate_function`] refines the trapezoid rule by halving the step
//! and extrapolates the last `order` estimates to zero step length with
//! Neville's scheme in `h²`. Order 1 is the plain trapezoid rule.

use std::fmt::Write as _;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::interpolation::{Interpolant, InterpolationMethod};
use crate::data::{Dataset, GeneratedCurve};
use crate::error::{FitError, Result};
use crate::fit::ResultsLog;

pub const MAX_ORDER: usize = 5;
pub const MAX_ITERATIONS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationOptions {
    /// Number of estimates extrapolated together, `1..=5`
    pub order: usize,
    /// Trapezoid refinements, `1..=30`
    pub max_iterations: usize,
    /// Relative change at which the estimate is accepted
    pub tolerance: f64,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            order: 4,
            max_iterations: 20,
            tolerance: 1e-6,
        }
    }
}

impl IntegrationOptions {
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_ORDER).contains(&self.order) {
            return Err(FitError::ConfigurationError(format!(
                "integration order must be between 1 and {}, got {}",
                MAX_ORDER, self.order
            )));
        }
        if !(1..=MAX_ITERATIONS).contains(&self.max_iterations) {
            return Err(FitError::ConfigurationError(format!(
                "iteration limit must be between 1 and {}, got {}",
                MAX_ITERATIONS, self.max_iterations
            )));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(FitError::ConfigurationError(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationResult {
    /// Name of what was integrated, for the summary
    pub source: String,
    pub lower: f64,
    pub upper: f64,
    pub order: usize,
    pub tolerance: f64,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Magnitude of the last extrapolation correction
    pub error_estimate: f64,
}

impl IntegrationResult {
    pub fn summary(&self) -> String {
        let mut info = String::new();
        let _ = writeln!(
            info,
            "Numerical integration of {} order {} from x = {} to x = {}",
            self.source, self.order, self.lower, self.upper
        );
        let _ = writeln!(info, "Tolerance = {}", self.tolerance);
        let _ = writeln!(info, "Iterations = {}", self.iterations);
        let _ = writeln!(info, "Area = {}", self.value);
        let _ = writeln!(info, "Error estimate = {}", self.error_estimate);
        if !self.converged {
            let _ = writeln!(info, "Status = requested tolerance not reached");
        }
        info
    }

    pub fn write_to(&self, log: &mut dyn ResultsLog) {
        log.append_block(&self.summary());
    }
}

/// Polynomial through `(xs, ys)` evaluated at 0, with the size of the last
/// correction.
fn neville_at_zero(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let k = xs.len();
    let mut table = ys.to_vec();
    let mut correction = 0.0;
    for level in 1..k {
        for i in 0..k - level {
            let (lo, hi) = (xs[i], xs[i + level]);
            let next = (hi * table[i] - lo * table[i + 1]) / (hi - lo);
            if i == k - level - 1 {
                correction = next - table[i + 1];
            }
            table[i] = next;
        }
    }
    (table[0], correction)
}

/// Integrate `f` over `[lower, upper]`.
///
/// # Errors
///
/// * `FitError::InvalidBounds` unless `lower < upper`
/// * `FitError::ConfigurationError` for an order, iteration cap or tolerance out of range
pub fn integrate_function<F>(
    f: F,
    lower: f64,
    upper: f64,
    options: &IntegrationOptions,
) -> Result<IntegrationResult>
where
    F: Fn(f64) -> f64,
{
    if !(lower < upper) {
        return Err(FitError::InvalidBounds { lower, upper });
    }
    options.validate()?;

    let width = upper - lower;
    let mut trapezoid = 0.5 * width * (f(lower) + f(upper));
    let mut steps: Vec<f64> = vec![1.0];
    let mut estimates: Vec<f64> = vec![trapezoid];
    let mut value = trapezoid;
    let mut error_estimate = f64::INFINITY;
    let mut converged = false;
    let mut iterations = 1;
    let mut intervals = 1_usize;

    while iterations < options.max_iterations {
        // add the midpoints of the current intervals
        let h = width / intervals as f64;
        let midpoints: f64 = (0..intervals)
            .map(|i| f(lower + (i as f64 + 0.5) * h))
            .sum();
        trapezoid = 0.5 * (trapezoid + h * midpoints);
        intervals *= 2;
        iterations += 1;

        let scale = *steps.last().unwrap_or(&1.0) / 4.0;
        steps.push(scale);
        estimates.push(trapezoid);

        let used = options.order.min(estimates.len());
        let start = estimates.len() - used;
        let previous = value;
        if used > 1 {
            let (extrapolated, correction) = neville_at_zero(&steps[start..], &estimates[start..]);
            value = extrapolated;
            error_estimate = correction.abs();
        } else {
            value = trapezoid;
            error_estimate = (value - previous).abs();
        }
        if error_estimate <= options.tolerance * value.abs() {
            converged = true;
            break;
        }
    }

    if converged {
        debug!("integration converged after {} iterations: {}", iterations, value);
    } else {
        warn!(
            "integration stopped after {} iterations with error estimate {}",
            iterations, error_estimate
        );
    }
    Ok(IntegrationResult {
        source: "function".to_string(),
        lower,
        upper,
        order: options.order,
        tolerance: options.tolerance,
        value,
        iterations,
        converged,
        error_estimate,
    })
}

/// Integrate sampled data over `[lower, upper]` through an interpolant:
/// linear for order 1 or fewer than 3 points, natural spline otherwise.
///
/// # Errors
///
/// * `FitError::InvalidBounds` unless `lower < upper`
/// * `FitError::BoundsOutOfRange` if the bounds reach outside the data
pub fn integrate(
    x: &[f64],
    y: &[f64],
    lower: f64,
    upper: f64,
    options: &IntegrationOptions,
) -> Result<IntegrationResult> {
    if !(lower < upper) {
        return Err(FitError::InvalidBounds { lower, upper });
    }
    let method = if options.order == 1 || x.len() < 3 {
        InterpolationMethod::Linear
    } else {
        InterpolationMethod::CubicSpline
    };
    let interpolant = Interpolant::new(x, y, method)?;
    let (data_min, data_max) = interpolant.domain();
    if lower < data_min || upper > data_max {
        return Err(FitError::BoundsOutOfRange {
            lower,
            upper,
            data_min,
            data_max,
        });
    }
    let mut result = integrate_function(|t| interpolant.value(t), lower, upper, options)?;
    result.source = "data".to_string();
    Ok(result)
}

pub fn integrate_dataset(
    data: &Dataset,
    lower: f64,
    upper: f64,
    options: &IntegrationOptions,
) -> Result<IntegrationResult> {
    let mut result = integrate(data.x(), data.y(), lower, upper, options)?;
    result.source = data.name().to_string();
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CumulativeMethod {
    /// Left rectangles
    Rectangle,
    #[default]
    Trapezoid,
    /// Simpson on pairs of intervals, trapezoid on a trailing odd interval
    Simpson,
}

/// Running integral `∫ from x₀ to xₖ` at every sample. With `absolute`,
/// `|y|` is integrated instead.
pub fn cumulative_integral(
    x: &[f64],
    y: &[f64],
    method: CumulativeMethod,
    absolute: bool,
) -> Result<Vec<f64>> {
    if x.len() != y.len() {
        return Err(FitError::DimensionMismatch(format!(
            "{} x values but {} y values",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(FitError::InsufficientPoints {
            required: 2,
            got: x.len(),
        });
    }
    if x.windows(2).any(|w| !(w[1] >= w[0])) {
        return Err(FitError::invalid_input("x values must be sorted ascending"));
    }
    let value = |i: usize| if absolute { y[i].abs() } else { y[i] };
    let trapezoid = |i: usize| 0.5 * (value(i - 1) + value(i)) * (x[i] - x[i - 1]);

    let mut out = Vec::with_capacity(x.len());
    out.push(0.0);
    for k in 1..x.len() {
        let next = match method {
            CumulativeMethod::Rectangle => out[k - 1] + value(k - 1) * (x[k] - x[k - 1]),
            CumulativeMethod::Trapezoid => out[k - 1] + trapezoid(k),
            CumulativeMethod::Simpson if k % 2 == 0 => {
                let h0 = x[k - 1] - x[k - 2];
                let h1 = x[k] - x[k - 1];
                if h0 == 0.0 || h1 == 0.0 {
                    out[k - 1] + trapezoid(k)
                } else {
                    let total = h0 + h1;
                    out[k - 2]
                        + total / 6.0
                            * ((2.0 - h1 / h0) * value(k - 2)
                                + total * total / (h0 * h1) * value(k - 1)
                                + (2.0 - h0 / h1) * value(k))
                }
            }
            CumulativeMethod::Simpson => out[k - 1] + trapezoid(k),
        };
        out.push(next);
    }
    Ok(out)
}

pub fn cumulative_integral_dataset(
    data: &Dataset,
    method: CumulativeMethod,
    absolute: bool,
) -> Result<GeneratedCurve> {
    let y = cumulative_integral(data.x(), data.y(), method, absolute)?;
    GeneratedCurve::new(format!("{} integral", data.name()), data.x().to_vec(), y)
}
