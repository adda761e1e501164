//! Parameter definition and implementation
//!
//! A parameter is a named value that the optimizer may vary, optionally held
//! inside box bounds. After a fit it also carries its standard error.

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};
use crate::parameters::bounds::Bounds;

/// A named fit parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name of the parameter
    name: String,

    /// Current value of the parameter
    value: f64,

    /// Whether this parameter can be varied during optimization
    vary: bool,

    /// Minimum and maximum bounds for the parameter value
    #[serde(default)]
    bounds: Bounds,

    /// Standard error of the parameter (set after fitting)
    #[serde(default)]
    stderr: Option<f64>,
}

impl Parameter {
    /// Create a varying, unbounded parameter.
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            vary: true,
            bounds: Bounds::unbounded(),
            stderr: None,
        }
    }

    /// Create a parameter restricted to `[min, max]`.
    ///
    /// # Errors
    ///
    /// * `FitError::InvalidBounds` for unordered bounds
    /// * `FitError::InvalidInput` if `value` lies outside them
    pub fn with_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<Self> {
        let mut param = Self::new(name, value);
        param.set_bounds(Bounds::new(min, max)?)?;
        Ok(param)
    }

    /// Create a parameter that is held at `value`.
    pub fn fixed(name: &str, value: f64) -> Self {
        let mut param = Self::new(name, value);
        param.vary = false;
        param
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value, which must respect the bounds.
    pub fn set_value(&mut self, value: f64) -> Result<()> {
        if !self.bounds.is_within_bounds(value) {
            return Err(FitError::invalid_input(format!(
                "value {} of parameter '{}' is outside [{}, {}]",
                value, self.name, self.bounds.min, self.bounds.max
            )));
        }
        self.value = value;
        Ok(())
    }

    pub fn vary(&self) -> bool {
        self.vary
    }

    pub fn set_vary(&mut self, vary: bool) {
        self.vary = vary;
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Replace the bounds; the current value must lie inside the new ones.
    pub fn set_bounds(&mut self, bounds: Bounds) -> Result<()> {
        if !bounds.is_within_bounds(self.value) {
            return Err(FitError::invalid_input(format!(
                "value {} of parameter '{}' is outside [{}, {}]",
                self.value, self.name, bounds.min, bounds.max
            )));
        }
        self.bounds = bounds;
        Ok(())
    }

    pub fn is_bounded(&self) -> bool {
        !self.bounds.is_unbounded()
    }

    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }

    pub fn set_stderr(&mut self, stderr: Option<f64>) {
        self.stderr = stderr;
    }

    /// The value in the optimizer's unbounded coordinate.
    pub fn to_internal(&self) -> Result<f64> {
        self.bounds.to_internal(self.value)
    }

    /// The external value corresponding to an internal coordinate.
    pub fn from_internal(&self, internal: f64) -> f64 {
        self.bounds.to_external(internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_defaults() {
        let param = Parameter::new("amplitude", 10.0);
        assert_eq!(param.name(), "amplitude");
        assert_eq!(param.value(), 10.0);
        assert!(param.vary());
        assert!(!param.is_bounded());
        assert!(param.stderr().is_none());
        assert!(!Parameter::fixed("y0", 1.0).vary());
    }

    #[test]
    fn test_bounded_values() {
        let mut param = Parameter::with_bounds("w", 1.0, 0.0, 5.0).unwrap();
        assert!(param.set_value(6.0).is_err());
        assert!(param.set_value(4.0).is_ok());
        assert!(Parameter::with_bounds("w", 9.0, 0.0, 5.0).is_err());
        assert!(param.set_bounds(Bounds::max_only(3.0)).is_err());
    }
}
