use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// A sampled curve handed back to the host for plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCurve {
    /// Suggested display name.
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl GeneratedCurve {
    /// Create a curve from matching x and y vectors.
    pub fn new(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(FitError::DimensionMismatch(format!(
                "curve has {} x values but {} y values",
                x.len(),
                y.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            x,
            y,
        })
    }

    /// Sample `f` at `points` evenly spaced x values spanning `[from, to]`.
    pub fn sample<F>(name: impl Into<String>, from: f64, to: f64, points: usize, f: F) -> Result<Self>
    where
        F: Fn(f64) -> f64,
    {
        let x = linspace(from, to, points)?;
        let y = x.iter().map(|&xi| f(xi)).collect();
        Ok(Self {
            name: name.into(),
            x,
            y,
        })
    }

    /// Evaluate `f` at the given x values.
    pub fn from_points<F>(name: impl Into<String>, x: &[f64], f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            name: name.into(),
            x: x.to_vec(),
            y: x.iter().map(|&xi| f(xi)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// `points` evenly spaced values from `from` to `to` inclusive.
pub fn linspace(from: f64, to: f64, points: usize) -> Result<Vec<f64>> {
    if points < 2 {
        return Err(FitError::invalid_input(format!(
            "at least 2 sample points are required, got {}",
            points
        )));
    }
    let step = (to - from) / (points - 1) as f64;
    let mut values: Vec<f64> = (0..points).map(|i| from + step * i as f64).collect();
    // Avoid round-off past the requested end point.
    values[points - 1] = to;
    Ok(values)
}
