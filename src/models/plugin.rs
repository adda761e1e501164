//! Models provided by externally loaded units.
//!
//! A unit exports named symbols: the strings `name`, `parameters` (a comma
//! separated list) and optionally `formula`, the evaluation callable
//! `function_eval` and optionally the Jacobian callable `function_df`.
//! How units are found and loaded is up to the [`PluginLoader`]; the crate
//! ships the in-memory [`PluginRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::model::FitModel;

/// `f(x, params)`.
pub type EvalFn = Arc<dyn Fn(f64, &[f64]) -> f64 + Send + Sync>;

/// Writes `∂f/∂pⱼ` at `x` into the row.
pub type JacobianFn = Arc<dyn Fn(f64, &[f64], &mut [f64]) + Send + Sync>;

pub const SYMBOL_NAME: &str = "name";
pub const SYMBOL_PARAMETERS: &str = "parameters";
pub const SYMBOL_FORMULA: &str = "formula";
pub const SYMBOL_EVAL: &str = "function_eval";
pub const SYMBOL_JACOBIAN: &str = "function_df";

/// One exported symbol.
#[derive(Clone)]
pub enum PluginSymbol {
    Text(String),
    Eval(EvalFn),
    Jacobian(JacobianFn),
}

impl fmt::Debug for PluginSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginSymbol::Text(text) => write!(f, "Text({:?})", text),
            PluginSymbol::Eval(_) => write!(f, "Eval(..)"),
            PluginSymbol::Jacobian(_) => write!(f, "Jacobian(..)"),
        }
    }
}

/// The symbols exported by one unit.
#[derive(Debug, Clone, Default)]
pub struct PluginUnit {
    symbols: HashMap<String, PluginSymbol>,
}

impl PluginUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, symbol: &str, text: &str) -> Self {
        self.symbols
            .insert(symbol.to_string(), PluginSymbol::Text(text.to_string()));
        self
    }

    pub fn with_eval<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
    {
        self.symbols
            .insert(SYMBOL_EVAL.to_string(), PluginSymbol::Eval(Arc::new(f)));
        self
    }

    pub fn with_jacobian<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &[f64], &mut [f64]) + Send + Sync + 'static,
    {
        self.symbols
            .insert(SYMBOL_JACOBIAN.to_string(), PluginSymbol::Jacobian(Arc::new(f)));
        self
    }

    pub fn symbol(&self, name: &str) -> Option<&PluginSymbol> {
        self.symbols.get(name)
    }

    fn text(&self, name: &str) -> Result<Option<String>> {
        match self.symbols.get(name) {
            None => Ok(None),
            Some(PluginSymbol::Text(text)) => Ok(Some(text.clone())),
            Some(_) => Err(FitError::InvalidModel(format!(
                "plugin symbol '{}' is not a string",
                name
            ))),
        }
    }
}

/// Resolves a unit path to its symbols.
pub trait PluginLoader {
    /// # Errors
    ///
    /// * `FitError::InvalidModel` if no unit exists at `path`
    fn load(&self, path: &str) -> Result<PluginUnit>;
}

/// A caller-populated table of units keyed by path.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    units: HashMap<String, PluginUnit>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: &str, unit: PluginUnit) {
        self.units.insert(path.to_string(), unit);
    }

    pub fn with_unit(mut self, path: &str, unit: PluginUnit) -> Self {
        self.register(path, unit);
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.units.contains_key(path)
    }
}

impl PluginLoader for PluginRegistry {
    fn load(&self, path: &str) -> Result<PluginUnit> {
        self.units
            .get(path)
            .cloned()
            .ok_or_else(|| FitError::InvalidModel(format!("no plugin unit at '{}'", path)))
    }
}

/// A model whose evaluation lives in a plugin unit.
#[derive(Clone)]
pub struct PluginModel {
    name: String,
    parameters: Vec<String>,
    formula: Option<String>,
    eval: EvalFn,
    jacobian: Option<JacobianFn>,
}

impl fmt::Debug for PluginModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModel")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("formula", &self.formula)
            .field("has_jacobian", &self.jacobian.is_some())
            .finish()
    }
}

impl PluginModel {
    /// Resolve the unit at `path` and read its symbols.
    ///
    /// # Errors
    ///
    /// * `FitError::InvalidModel` if the unit does not exist or a symbol has the wrong kind
    /// * `FitError::MissingPluginSymbol` if `name`, `parameters` or `function_eval` is absent
    /// * `FitError::NoParametersDefined` if the parameter list is empty
    pub fn load<L: PluginLoader + ?Sized>(loader: &L, path: &str) -> Result<Self> {
        let unit = loader.load(path)?;
        Self::from_unit(&unit)
    }

    pub fn from_unit(unit: &PluginUnit) -> Result<Self> {
        let name = unit
            .text(SYMBOL_NAME)?
            .ok_or_else(|| FitError::MissingPluginSymbol(SYMBOL_NAME.to_string()))?;
        let parameters: Vec<String> = unit
            .text(SYMBOL_PARAMETERS)?
            .ok_or_else(|| FitError::MissingPluginSymbol(SYMBOL_PARAMETERS.to_string()))?
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if parameters.is_empty() {
            return Err(FitError::NoParametersDefined);
        }
        let formula = unit.text(SYMBOL_FORMULA)?;
        let eval = match unit.symbol(SYMBOL_EVAL) {
            Some(PluginSymbol::Eval(f)) => Arc::clone(f),
            Some(_) => {
                return Err(FitError::InvalidModel(format!(
                    "plugin symbol '{}' is not an evaluation function",
                    SYMBOL_EVAL
                )))
            }
            None => return Err(FitError::MissingPluginSymbol(SYMBOL_EVAL.to_string())),
        };
        let jacobian = match unit.symbol(SYMBOL_JACOBIAN) {
            Some(PluginSymbol::Jacobian(f)) => Some(Arc::clone(f)),
            Some(_) => {
                return Err(FitError::InvalidModel(format!(
                    "plugin symbol '{}' is not a Jacobian function",
                    SYMBOL_JACOBIAN
                )))
            }
            None => None,
        };
        debug!(
            "loaded plugin model '{}' with parameters {:?} (analytic Jacobian: {})",
            name,
            parameters,
            jacobian.is_some()
        );
        Ok(Self {
            name,
            parameters,
            formula,
            eval,
            jacobian,
        })
    }
}

impl FitModel for PluginModel {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameters.clone()
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        (self.eval)(x, params)
    }

    fn has_custom_jacobian(&self) -> bool {
        self.jacobian.is_some()
    }

    fn jacobian(&self, x: f64, params: &[f64], row: &mut [f64]) -> Result<()> {
        match &self.jacobian {
            Some(df) => {
                df(x, params, row);
                Ok(())
            }
            None => Err(FitError::MissingPluginSymbol(SYMBOL_JACOBIAN.to_string())),
        }
    }

    fn formula(&self) -> String {
        self.formula
            .clone()
            .unwrap_or_else(|| format!("y = {}(x; {})", self.name, self.parameters.join(", ")))
    }

    fn guess_parameters(&self, _data: &Dataset) -> Result<Vec<f64>> {
        Ok(vec![1.0; self.parameters.len()])
    }
}
