use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// Ordered `(x, y, weight)` triples, sorted by x unless built otherwise.
///
/// A dataset never changes after construction; wrap it in an `Arc` to share
/// it between a background fit and the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    name: String,
    x: Vec<f64>,
    y: Vec<f64>,
    weights: Vec<f64>,
    weighted: bool,
    dropped: usize,
}

impl Dataset {
    /// Build an unweighted dataset, dropping rows with NaN coordinates.
    pub fn from_xy(name: impl Into<String>, x: &[f64], y: &[f64]) -> Result<Self> {
        let weights = vec![1.0; x.len()];
        Self::build(name.into(), x, y, &weights, false)
    }

    /// Build a dataset with explicit weights (`1/σ²`).
    pub fn from_xyw(name: impl Into<String>, x: &[f64], y: &[f64], weights: &[f64]) -> Result<Self> {
        if let Some((row, &w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(FitError::InvalidWeight { row, value: w });
        }
        Self::build(name.into(), x, y, weights, true)
    }

    fn build(name: String, x: &[f64], y: &[f64], weights: &[f64], weighted: bool) -> Result<Self> {
        if x.len() != y.len() || x.len() != weights.len() {
            return Err(FitError::DimensionMismatch(format!(
                "x has {} values, y has {}, weights have {}",
                x.len(),
                y.len(),
                weights.len()
            )));
        }
        let rows: Vec<(f64, f64, f64)> = x
            .iter()
            .zip(y)
            .zip(weights)
            .filter(|((xi, yi), wi)| !xi.is_nan() && !yi.is_nan() && !wi.is_nan())
            .map(|((&xi, &yi), &wi)| (xi, yi, wi))
            .collect();
        let dropped = x.len() - rows.len();
        Ok(Self::from_rows(name, rows, weighted, dropped, true))
    }

    /// Assemble from pre-validated rows.
    pub(crate) fn from_rows(
        name: String,
        mut rows: Vec<(f64, f64, f64)>,
        weighted: bool,
        dropped: usize,
        sort_by_x: bool,
    ) -> Self {
        if sort_by_x {
            // Stable, so rows sharing an x keep their source order.
            rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
        let mut x = Vec::with_capacity(rows.len());
        let mut y = Vec::with_capacity(rows.len());
        let mut weights = Vec::with_capacity(rows.len());
        for (xi, yi, wi) in rows {
            x.push(xi);
            y.push(yi);
            weights.push(wi);
        }
        Self {
            name,
            x,
            y,
            weights,
            weighted,
            dropped,
        }
    }

    /// Same data under another display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Per-point weights; all ones when unweighted.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Whether the weights came from a weighting scheme.
    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    /// Rows discarded during construction because of missing values.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Smallest and largest x, or `None` for an empty dataset.
    pub fn x_range(&self) -> Option<(f64, f64)> {
        min_max(&self.x)
    }

    /// Smallest and largest y, or `None` for an empty dataset.
    pub fn y_range(&self) -> Option<(f64, f64)> {
        min_max(&self.y)
    }

    /// Fail with `InsufficientPoints` if fewer than `required` points exist.
    pub fn require_points(&self, required: usize) -> Result<()> {
        if self.len() < required {
            return Err(FitError::InsufficientPoints {
                required,
                got: self.len(),
            });
        }
        Ok(())
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_xy_sorts_and_drops_nan() {
        let data = Dataset::from_xy(
            "d",
            &[3.0, 1.0, f64::NAN, 2.0],
            &[30.0, 10.0, 5.0, f64::NAN],
        )
        .unwrap();
        assert_eq!(data.x(), &[1.0, 3.0]);
        assert_eq!(data.y(), &[10.0, 30.0]);
        assert_eq!(data.dropped(), 2);
        assert!(!data.is_weighted());
        assert_eq!(data.weights(), &[1.0, 1.0]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_x() {
        let data = Dataset::from_xy("d", &[1.0, 0.0, 1.0], &[1.0, 0.0, 2.0]).unwrap();
        assert_eq!(data.y(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_ranges_and_requirements() {
        let data = Dataset::from_xy("d", &[2.0, -1.0, 4.0], &[0.5, 7.0, -3.0]).unwrap();
        assert_eq!(data.x_range(), Some((-1.0, 4.0)));
        assert_eq!(data.y_range(), Some((-3.0, 7.0)));
        assert!(data.require_points(3).is_ok());
        assert!(matches!(
            data.require_points(4),
            Err(FitError::InsufficientPoints { required: 4, got: 3 })
        ));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let result = Dataset::from_xyw("d", &[1.0, 2.0], &[1.0, 2.0], &[1.0, -2.0]);
        assert!(matches!(result, Err(FitError::InvalidWeight { row: 1, .. })));
    }
}
