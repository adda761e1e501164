//! User-defined formula models.

use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::expression::{detect_parameters, CompiledExpr, Compiler, ExpressionContext};
use crate::model::FitModel;

/// Initial value given to parameters the caller does not set.
pub const DEFAULT_INITIAL_VALUE: f64 = 1.0;

/// A model defined by a formula in `x`, e.g. `A*exp(-x/t) + y0`.
///
/// The Jacobian is computed by finite differences.
#[derive(Debug, Clone)]
pub struct ExpressionModel {
    name: String,
    expr: CompiledExpr,
    initial: Vec<f64>,
}

impl ExpressionModel {
    /// Compile `text`, taking every free identifier as a parameter.
    ///
    /// # Errors
    ///
    /// * `FitError::EmptyExpression` for blank text
    /// * `FitError::NoParametersInExpression` if nothing but `x` and constants appear
    /// * any compile error of [`Compiler::compile`]
    pub fn new(text: &str, ctx: &ExpressionContext) -> Result<Self> {
        let parameters = detect_parameters(text, "x", ctx)?;
        Self::with_parameters(text, &parameters, ctx)
    }

    /// Compile `text` with an explicit, ordered parameter list.
    pub fn with_parameters<S: AsRef<str>>(
        text: &str,
        parameters: &[S],
        ctx: &ExpressionContext,
    ) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(FitError::EmptyExpression);
        }
        if parameters.is_empty() {
            return Err(FitError::NoParametersInExpression);
        }
        let expr = Compiler::new(ctx).parameters(parameters).compile(text)?;
        Ok(Self {
            name: "User function".to_string(),
            initial: vec![DEFAULT_INITIAL_VALUE; parameters.len()],
            expr,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Starting values in parameter order.
    ///
    /// # Errors
    ///
    /// * `FitError::DimensionMismatch` if the count differs from the parameter count
    pub fn with_initial_values(mut self, values: &[f64]) -> Result<Self> {
        if values.len() != self.initial.len() {
            return Err(FitError::DimensionMismatch(format!(
                "expected {} initial values, got {}",
                self.initial.len(),
                values.len()
            )));
        }
        self.initial = values.to_vec();
        Ok(self)
    }

    pub fn expression(&self) -> &CompiledExpr {
        &self.expr
    }
}

impl FitModel for ExpressionModel {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.expr.parameter_names().to_vec()
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        self.expr.eval(x, params)
    }

    fn formula(&self) -> String {
        format!("y = {}", self.expr.text())
    }

    fn guess_parameters(&self, _data: &Dataset) -> Result<Vec<f64>> {
        Ok(self.initial.clone())
    }
}
