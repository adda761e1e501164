//! Levenberg-Marquardt algorithm implementation.
//!
//! The solver minimises `‖r(p)‖²` by repeatedly solving the damped normal
//! equations `(JᵀJ + λD) δ = −Jᵀr`, with `D` either `diag(JᵀJ)` or the
//! identity (see [`Damping`]).

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod step;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::{Damping, DiffMethod, LmConfig};
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
pub use step::{LmStep, StepResult};
