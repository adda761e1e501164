//! # numfit-rs
//!
//! `numfit-rs` is the numerical analysis core of a plotting workbench: curve
//! fitting with Levenberg-Marquardt and Nelder-Mead optimizers, and signal
//! utilities that work on the same extracted datasets.
//!
//! The library provides:
//! - Dataset extraction from named columns with ranges and weighting schemes
//! - Built-in models (polynomial, exponential family, Boltzmann, multi-peak),
//!   user expressions and plugin-provided functions
//! - A fit engine reporting parameters, standard errors, χ², R² and a fitted curve
//! - FFT spectra and filters, smoothing, convolution, interpolation and quadrature
//!
//! ## Basic Usage
//!
//! ```
//! use numfit_rs::data::{CurveRef, Table};
//! use numfit_rs::fit::{FitConfig, FitEngine};
//! use numfit_rs::models::ExponentialModel;
//!
//! let x: Vec<f64> = (0..40).map(|i| i as f64 * 0.25).collect();
//! let y: Vec<f64> = x.iter().map(|x| 3.0 * (-x / 2.0).exp() + 0.5).collect();
//! let table = Table::new("decay").with_numeric("t", x).with_numeric("counts", y);
//!
//! let engine = FitEngine::new(FitConfig::default());
//! let model = ExponentialModel::decay(1).unwrap();
//! let result = engine
//!     .fit_source(&table, &CurveRef::new("counts", "t", "counts"), &model, None)
//!     .unwrap();
//! assert!((result.value("t").unwrap() - 2.0).abs() < 1e-3);
//! ```

pub mod control;
pub mod data;
pub mod error;
pub mod expression;
pub mod fit;
pub mod lm;
pub mod model;
pub mod models;
pub mod parameters;
pub mod problem;
pub mod simplex;
pub mod utils;

#[cfg(feature = "signal")]
pub mod signal;

// Re-exports for convenience
pub use control::{CancellationToken, Deadline};
pub use data::{CurveRef, Dataset, GeneratedCurve, Table};
pub use error::{FitError, Result};
pub use fit::{Algorithm, FitConfig, FitEngine, FitResult, FitWorker};
pub use lm::LevenbergMarquardt;
pub use model::FitModel;
pub use parameters::{Parameter, ParameterSet};
pub use problem::Problem;
pub use simplex::NelderMead;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
