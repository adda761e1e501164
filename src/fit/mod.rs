//! # Fit engine
//!
//! [`FitEngine`] ties the pieces together: it extracts a [`Dataset`](crate::data::Dataset),
//! builds the weighted residual problem of a [`FitModel`](crate::model::FitModel), runs
//! the configured optimizer and returns a [`FitResult`] with statistics,
//! standard errors and the generated curve.
//!
//! ```
//! use numfit_rs::data::Dataset;
//! use numfit_rs::fit::{FitConfig, FitEngine};
//! use numfit_rs::models::PolynomialModel;
//!
//! let x = [0.0, 1.0, 2.0, 3.0];
//! let y = [1.0, 3.0, 5.0, 7.0];
//! let data = Dataset::from_xy("line", &x, &y).unwrap();
//! let result = FitEngine::new(FitConfig::default())
//!     .fit(&data, &PolynomialModel::linear(), None)
//!     .unwrap();
//! assert!((result.value("a1").unwrap() - 2.0).abs() < 1e-10);
//! ```

pub mod config;
pub mod engine;
pub mod report;
pub mod result;
pub mod statistics;
pub mod worker;

pub use config::{Algorithm, CurveSampling, FitConfig};
pub use engine::{FitEngine, FitState};
pub use report::{CurveCollector, PlotHandle, PlotSink, ResultsLog};
pub use result::{FitResult, FitStatus, PeakComponent};
pub use statistics::{FitStatistics, ParameterTest};
pub use worker::{FitHandle, FitWorker};
