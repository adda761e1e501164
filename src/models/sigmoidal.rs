//! Sigmoidal (Boltzmann) step model.

use crate::data::Dataset;
use crate::error::Result;
use crate::model::FitModel;

/// `1 / (1 + exp(z))` without overflow for large `|z|`.
fn logistic(z: f64) -> f64 {
    if z > 0.0 {
        let e = (-z).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + z.exp())
    }
}

/// A Boltzmann step.
///
/// `y = A2 + (A1 − A2) / (1 + exp((x − x0)/dx))`
///
/// Parameters:
///
/// * `A1` - The level as x → −∞
/// * `A2` - The level as x → +∞
/// * `x0` - The center of the step (x value at half height)
/// * `dx` - The width of the transition region
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoltzmannModel;

impl BoltzmannModel {
    pub fn new() -> Self {
        Self
    }
}

impl FitModel for BoltzmannModel {
    fn name(&self) -> String {
        "Boltzmann".to_string()
    }

    fn parameter_names(&self) -> Vec<String> {
        ["A1", "A2", "x0", "dx"].iter().map(|s| s.to_string()).collect()
    }

    fn evaluate(&self, x: f64, p: &[f64]) -> f64 {
        let (a1, a2, x0, dx) = (p[0], p[1], p[2], p[3]);
        a2 + (a1 - a2) * logistic((x - x0) / dx)
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }

    fn jacobian(&self, x: f64, p: &[f64], row: &mut [f64]) -> Result<()> {
        let (a1, a2, x0, dx) = (p[0], p[1], p[2], p[3]);
        let z = (x - x0) / dx;
        let l = logistic(z);
        let slope = (a1 - a2) * l * (1.0 - l) / dx;
        row[0] = l;
        row[1] = 1.0 - l;
        row[2] = slope;
        row[3] = slope * z;
        Ok(())
    }

    fn formula(&self) -> String {
        "y = A2 + (A1 - A2)/(1 + exp((x - x0)/dx))".to_string()
    }

    /// Levels from the observed extremes ordered by the trend, `x0` at the
    /// mid-level crossing and `dx` a tenth of the x span.
    fn guess_parameters(&self, data: &Dataset) -> Result<Vec<f64>> {
        data.require_points(2)?;
        let x = data.x();
        let y = data.y();
        let n = x.len();
        let (y_min, y_max) = data.y_range().unwrap_or((0.0, 1.0));
        let (x_min, x_max) = data.x_range().unwrap_or((0.0, 1.0));

        // Compare the mean levels of the first and last quarters.
        let quarter = (n / 4).max(1);
        let head = y[..quarter].iter().sum::<f64>() / quarter as f64;
        let tail = y[n - quarter..].iter().sum::<f64>() / quarter as f64;
        let (a1, a2) = if head <= tail {
            (y_min, y_max)
        } else {
            (y_max, y_min)
        };

        let mid = 0.5 * (a1 + a2);
        let x0 = x
            .windows(2)
            .zip(y.windows(2))
            .find(|(_, yw)| (yw[0] - mid) * (yw[1] - mid) <= 0.0 && yw[0] != yw[1])
            .map(|(xw, yw)| xw[0] + (mid - yw[0]) * (xw[1] - xw[0]) / (yw[1] - yw[0]))
            .unwrap_or(0.5 * (x_min + x_max));

        let span = x_max - x_min;
        let dx = if span > 0.0 { span / 10.0 } else { 1.0 };
        Ok(vec![a1, a2, x0, dx])
    }
}
