//! Built-in model families.
//!
//! Every model implements [`FitModel`](crate::model::FitModel): it names its
//! parameters, evaluates at a point and estimates starting values from data.
//! Most families also provide an analytic Jacobian.

mod exponential;
mod expression;
mod peak;
mod plugin;
mod polynomial;
mod sigmoidal;

pub use exponential::{ExponentialKind, ExponentialModel};
pub use expression::{ExpressionModel, DEFAULT_INITIAL_VALUE};
pub use peak::{MultiPeakModel, PeakShape};
pub use plugin::{
    EvalFn, JacobianFn, PluginLoader, PluginModel, PluginRegistry, PluginSymbol, PluginUnit,
    SYMBOL_EVAL, SYMBOL_FORMULA, SYMBOL_JACOBIAN, SYMBOL_NAME, SYMBOL_PARAMETERS,
};
pub use polynomial::{PolynomialModel, MAX_ORDER};
pub use sigmoidal::BoltzmannModel;
