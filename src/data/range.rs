use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// A closed x interval. An unset end means "the dataset's own minimum/maximum"
/// and is resolved when data is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Range {
    /// The whole dataset.
    pub fn whole() -> Self {
        Self::default()
    }

    /// An explicit interval `[min, max]`.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let range = Self {
            min: Some(min),
            max: Some(max),
        };
        range.validate()?;
        Ok(range)
    }

    /// From `min` up to the end of the data.
    pub fn from(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// From the start of the data up to `max`.
    pub fn to(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn is_whole(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Check the explicit ends.
    pub fn validate(&self) -> Result<()> {
        for end in [self.min, self.max].into_iter().flatten() {
            if !end.is_finite() {
                return Err(FitError::invalid_input(format!(
                    "range end {} is not finite",
                    end
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min >= max {
                return Err(FitError::InvalidRange { min, max });
            }
        }
        Ok(())
    }

    /// Resolve against the data's x extent.
    pub fn resolve(&self, data_min: f64, data_max: f64) -> Result<(f64, f64)> {
        self.validate()?;
        let min = self.min.unwrap_or(data_min);
        let max = self.max.unwrap_or(data_max);
        if min > max {
            return Err(FitError::RangeEmpty { min, max });
        }
        Ok((min, max))
    }
}
