use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::dataset::Dataset;
use super::range::Range;
use super::source::{ColumnData, ColumnSource};
use crate::error::{FitError, Result};

/// How per-point weights are derived. Weights are `1/σ²`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightingScheme {
    /// Every point weighs 1.
    #[default]
    None,
    /// σ is taken from the curve's error column.
    Instrumental,
    /// σ² is y itself (counting statistics).
    Statistical,
    /// σ is taken from an arbitrary column.
    ArbitraryDataset(String),
}

impl fmt::Display for WeightingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightingScheme::None => write!(f, "No weighting"),
            WeightingScheme::Instrumental => write!(f, "Instrumental"),
            WeightingScheme::Statistical => write!(f, "Statistical"),
            WeightingScheme::ArbitraryDataset(column) => write!(f, "Arbitrary Dataset: {}", column),
        }
    }
}

/// Names the columns forming one curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveRef {
    /// Display name used in results and logs.
    pub name: String,
    pub x: String,
    pub y: String,
    /// Error-bar column, needed by instrumental weighting.
    pub error: Option<String>,
}

impl CurveRef {
    pub fn new(name: impl Into<String>, x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x: x.into(),
            y: y.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, column: impl Into<String>) -> Self {
        self.error = Some(column.into());
        self
    }
}

/// Options for [`extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub range: Range,
    pub weighting: WeightingScheme,
    /// Fewer surviving rows than this fail with `InsufficientPoints`.
    pub min_points: usize,
    pub sort_by_x: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            range: Range::whole(),
            weighting: WeightingScheme::None,
            min_points: 1,
            sort_by_x: true,
        }
    }
}

impl ExtractOptions {
    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    pub fn with_weighting(mut self, weighting: WeightingScheme) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    pub fn with_sort_by_x(mut self, sort: bool) -> Self {
        self.sort_by_x = sort;
        self
    }
}

fn lookup<'a, S: ColumnSource + ?Sized>(source: &'a S, name: &str) -> Result<ColumnData<'a>> {
    source
        .column(name)
        .ok_or_else(|| FitError::EmptySelection(name.to_string()))
}

fn cell(column: &ColumnData<'_>, name: &str, row: usize) -> Result<Option<f64>> {
    column.value(row).map_err(|_| FitError::NonNumeric {
        column: name.to_string(),
        row,
    })
}

/// Pull one curve out of `source` as a [`Dataset`].
///
/// Rows with a missing x, y or weight source value are dropped and counted;
/// text that is not a number is an error.
pub fn extract<S: ColumnSource + ?Sized>(
    source: &S,
    curve: &CurveRef,
    options: &ExtractOptions,
) -> Result<Dataset> {
    let x_col = lookup(source, &curve.x)?;
    let y_col = lookup(source, &curve.y)?;
    let rows = x_col.len().min(y_col.len());

    let weight_column = match &options.weighting {
        WeightingScheme::None | WeightingScheme::Statistical => None,
        WeightingScheme::Instrumental => {
            let name = curve.error.as_deref().ok_or_else(|| {
                FitError::ConfigurationError(format!(
                    "instrumental weighting needs an error column for curve '{}'",
                    curve.name
                ))
            })?;
            Some((name, lookup(source, name)?))
        }
        WeightingScheme::ArbitraryDataset(name) => Some((name.as_str(), lookup(source, name)?)),
    };
    if let Some((name, column)) = &weight_column {
        if column.len() < rows {
            return Err(FitError::ConfigurationError(format!(
                "weight column '{}' has {} rows, the data has {}",
                name,
                column.len(),
                rows
            )));
        }
    }

    let mut dropped = 0;
    let mut valid = Vec::with_capacity(rows);
    for row in 0..rows {
        match (cell(&x_col, &curve.x, row)?, cell(&y_col, &curve.y, row)?) {
            (Some(x), Some(y)) => valid.push((row, x, y)),
            _ => dropped += 1,
        }
    }
    if valid.is_empty() {
        return Err(FitError::InsufficientPoints {
            required: options.min_points.max(1),
            got: 0,
        });
    }

    let (data_min, data_max) = valid
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, x, _)| {
            (lo.min(x), hi.max(x))
        });
    let (min, max) = options.range.resolve(data_min, data_max)?;

    let mut triples = Vec::with_capacity(valid.len());
    let mut in_range = 0;
    for (row, x, y) in valid {
        if x < min || x > max {
            continue;
        }
        in_range += 1;
        let weight = match (&options.weighting, &weight_column) {
            (WeightingScheme::Statistical, _) => {
                if y <= 0.0 {
                    return Err(FitError::InvalidWeight { row, value: y });
                }
                1.0 / y
            }
            (_, Some((name, column))) => match cell(column, name, row)? {
                Some(sigma) => {
                    let weight = 1.0 / (sigma * sigma);
                    if !weight.is_finite() {
                        return Err(FitError::InvalidWeight { row, value: sigma });
                    }
                    weight
                }
                None => {
                    dropped += 1;
                    continue;
                }
            },
            _ => 1.0,
        };
        triples.push((x, y, weight));
    }
    if in_range == 0 {
        return Err(FitError::RangeEmpty { min, max });
    }
    if triples.len() < options.min_points {
        return Err(FitError::InsufficientPoints {
            required: options.min_points,
            got: triples.len(),
        });
    }
    if dropped > 0 {
        warn!(
            "curve '{}': dropped {} row(s) with missing values",
            curve.name, dropped
        );
    }
    debug!(
        "extracted {} points of '{}' in [{}, {}] ({})",
        triples.len(),
        curve.name,
        min,
        max,
        options.weighting
    );

    let weighted = options.weighting != WeightingScheme::None;
    Ok(Dataset::from_rows(
        curve.name.clone(),
        triples,
        weighted,
        dropped,
        options.sort_by_x,
    ))
}
