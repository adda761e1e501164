//! Ordered parameter collections
//!
//! A [`ParameterSet`] keeps parameters in model order. The fit engine works on
//! a private copy, maps the varying subset into the optimizer's internal
//! coordinates and writes the final values and errors back.

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};
use crate::parameters::parameter::Parameter;

/// An ordered collection of uniquely named parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build varying parameters from parallel name and value lists.
    pub fn from_values<S: AsRef<str>>(names: &[S], values: &[f64]) -> Result<Self> {
        if names.len() != values.len() {
            return Err(FitError::DimensionMismatch(format!(
                "{} parameter names but {} values",
                names.len(),
                values.len()
            )));
        }
        let mut set = Self::new();
        for (name, &value) in names.iter().zip(values) {
            set.add_param(name.as_ref(), value)?;
        }
        Ok(set)
    }

    /// Append a parameter.
    ///
    /// # Errors
    ///
    /// * `FitError::InvalidInput` if a parameter with the same name exists
    pub fn add(&mut self, param: Parameter) -> Result<()> {
        if self.contains(param.name()) {
            return Err(FitError::invalid_input(format!(
                "parameter '{}' is defined twice",
                param.name()
            )));
        }
        self.params.push(param);
        Ok(())
    }

    pub fn add_param(&mut self, name: &str, value: f64) -> Result<()> {
        self.add(Parameter::new(name, value))
    }

    pub fn add_param_with_bounds(&mut self, name: &str, value: f64, min: f64, max: f64) -> Result<()> {
        self.add(Parameter::with_bounds(name, value, min, max)?)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name() == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(Parameter::value).collect()
    }

    /// Value of the named parameter.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(Parameter::value)
    }

    /// Hold the named parameter at its current value.
    pub fn fix(&mut self, name: &str) -> Result<()> {
        let param = self
            .get_mut(name)
            .ok_or_else(|| FitError::invalid_input(format!("no parameter named '{}'", name)))?;
        param.set_vary(false);
        Ok(())
    }

    /// Positions of the varying parameters.
    pub fn varying_indices(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.vary())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn varying_count(&self) -> usize {
        self.params.iter().filter(|p| p.vary()).count()
    }

    /// Whether any parameter is fixed or bounded.
    pub fn is_constrained(&self) -> bool {
        self.params.iter().any(|p| !p.vary() || p.is_bounded())
    }

    /// Internal coordinates of the varying parameters, in order.
    pub fn varying_internal_values(&self) -> Result<Vec<f64>> {
        self.params
            .iter()
            .filter(|p| p.vary())
            .map(Parameter::to_internal)
            .collect()
    }

    /// Full external parameter vector for the given internal coordinates of the varying subset.
    pub fn external_from_internal(&self, internal: &[f64]) -> Vec<f64> {
        let mut varying = internal.iter();
        self.params
            .iter()
            .map(|p| {
                if p.vary() {
                    varying
                        .next()
                        .map_or(p.value(), |&u| p.from_internal(u))
                } else {
                    p.value()
                }
            })
            .collect()
    }

    /// `d(external)/d(internal)` for each varying parameter.
    pub fn internal_derivatives(&self, internal: &[f64]) -> Vec<f64> {
        self.params
            .iter()
            .filter(|p| p.vary())
            .zip(internal)
            .map(|(p, &u)| p.bounds().derivative(u))
            .collect()
    }

    /// Overwrite all values, keeping each within its bounds.
    pub fn set_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.params.len() {
            return Err(FitError::DimensionMismatch(format!(
                "expected {} values, got {}",
                self.params.len(),
                values.len()
            )));
        }
        for (param, &value) in self.params.iter_mut().zip(values) {
            let clamped = param.bounds().clamp(value);
            param.set_value(clamped)?;
        }
        Ok(())
    }

    /// Record standard errors, one per parameter.
    pub fn set_stderrs(&mut self, errors: &[f64]) {
        for (param, &err) in self.params.iter_mut().zip(errors) {
            param.set_stderr(Some(err));
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let set: Self = serde_json::from_str(json)?;
        let mut checked = Self::new();
        for param in set.params {
            checked.add(param)?;
        }
        Ok(checked)
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_order_and_uniqueness() {
        let mut set = ParameterSet::from_values(&["b", "a", "c"], &[2.0, 1.0, 3.0]).unwrap();
        assert_eq!(set.names(), vec!["b", "a", "c"]);
        assert_eq!(set.index_of("c"), Some(2));
        assert!(set.add_param("a", 5.0).is_err());
        assert!(ParameterSet::from_values(&["a"], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_internal_mapping_skips_fixed() {
        let mut set = ParameterSet::new();
        set.add_param("a", 1.5).unwrap();
        set.add_param_with_bounds("b", 2.0, 0.0, 4.0).unwrap();
        set.add_param("c", -7.0).unwrap();
        set.fix("c").unwrap();

        assert_eq!(set.varying_indices(), vec![0, 1]);
        assert!(set.is_constrained());

        let internal = set.varying_internal_values().unwrap();
        assert_eq!(internal.len(), 2);
        let external = set.external_from_internal(&internal);
        assert_relative_eq!(external[0], 1.5);
        assert_relative_eq!(external[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(external[2], -7.0);

        let derivatives = set.internal_derivatives(&internal);
        assert_relative_eq!(derivatives[0], 1.0);
        // Midpoint of [0, 4]: internal 0, slope (max - min) / 2.
        assert_relative_eq!(derivatives[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_json_roundtrip_rejects_duplicates() {
        let mut set = ParameterSet::from_values(&["x0", "dx"], &[0.5, 2.0]).unwrap();
        set.fix("dx").unwrap();
        let json = set.to_json().unwrap();
        let back = ParameterSet::from_json(&json).unwrap();
        assert_eq!(back, set);

        let duplicated = r#"{"params":[{"name":"a","value":1.0,"vary":true},{"name":"a","value":2.0,"vary":true}]}"#;
        assert!(ParameterSet::from_json(duplicated).is_err());
    }
}
