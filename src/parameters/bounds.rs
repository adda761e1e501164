//! Parameter bounds implementation
//!
//! Box bounds are enforced by optimising an unbounded internal coordinate and
//! mapping it onto the allowed interval (Minuit-style transformation).

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// Represents the bounds constraints on a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

// Infinite ends serialize as null so the JSON stays valid.
impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Bounds", 2)?;
        state.serialize_field("min", &self.min.is_finite().then_some(self.min))?;
        state.serialize_field("max", &self.max.is_finite().then_some(self.max))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,

            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;
        Ok(Bounds {
            min: helper.min.unwrap_or(f64::NEG_INFINITY),
            max: helper.max.unwrap_or(f64::INFINITY),
        })
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }
}

impl Bounds {
    /// Create bounds `[min, max]`.
    ///
    /// # Errors
    ///
    /// * `FitError::InvalidBounds` unless `min < max`
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if min.is_nan() || max.is_nan() || min >= max {
            return Err(FitError::InvalidBounds {
                lower: min,
                upper: max,
            });
        }
        Ok(Self { min, max })
    }

    /// Create an unbounded constraint (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create a bounds constraint with only a minimum value
    pub fn min_only(min: f64) -> Self {
        Self {
            min,
            max: f64::INFINITY,
        }
    }

    /// Create a bounds constraint with only a maximum value
    pub fn max_only(max: f64) -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max,
        }
    }

    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    pub fn is_unbounded(&self) -> bool {
        !self.has_lower_bound() && !self.has_upper_bound()
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Map an internal (unbounded) value to the external, bounded one.
    pub fn to_external(&self, internal: f64) -> f64 {
        match (self.has_lower_bound(), self.has_upper_bound()) {
            (false, false) => internal,
            (true, false) => self.min - 1.0 + (internal * internal + 1.0).sqrt(),
            (false, true) => self.max + 1.0 - (internal * internal + 1.0).sqrt(),
            (true, true) => self.min + (internal.sin() + 1.0) * (self.max - self.min) / 2.0,
        }
    }

    /// Map an external value to the internal coordinate.
    ///
    /// # Errors
    ///
    /// * `FitError::InvalidInput` if the value is not finite or lies outside the bounds
    pub fn to_internal(&self, external: f64) -> Result<f64> {
        if !external.is_finite() || !self.is_within_bounds(external) {
            return Err(FitError::invalid_input(format!(
                "value {} is outside the bounds [{}, {}]",
                external, self.min, self.max
            )));
        }
        Ok(match (self.has_lower_bound(), self.has_upper_bound()) {
            (false, false) => external,
            (true, false) => ((external - self.min + 1.0).powi(2) - 1.0).sqrt(),
            (false, true) => ((self.max - external + 1.0).powi(2) - 1.0).sqrt(),
            (true, true) => {
                let scaled = 2.0 * (external - self.min) / (self.max - self.min) - 1.0;
                scaled.clamp(-1.0, 1.0).asin()
            }
        })
    }

    /// `d(external)/d(internal)` at the given internal value.
    pub fn derivative(&self, internal: f64) -> f64 {
        match (self.has_lower_bound(), self.has_upper_bound()) {
            (false, false) => 1.0,
            (true, false) => internal / (internal * internal + 1.0).sqrt(),
            (false, true) => -internal / (internal * internal + 1.0).sqrt(),
            (true, true) => internal.cos() * (self.max - self.min) / 2.0,
        }
    }
}
