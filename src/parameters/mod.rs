//! # Parameter System
//!
//! Named fit parameters with fixed flags and box bounds.
//!
//! - [`Parameter`]: one named value with a varying flag, bounds and its standard error
//! - [`ParameterSet`]: an ordered collection in model order
//! - [`Bounds`]: box bounds and the internal-coordinate transformation used during optimization
//!
//! ## Example Usage
//!
//! ```rust
//! use numfit_rs::parameters::ParameterSet;
//!
//! let mut params = ParameterSet::new();
//! params.add_param("A", 3.0).unwrap();
//! params.add_param_with_bounds("t", 0.5, 0.0, 10.0).unwrap();
//! params.add_param("y0", 0.0).unwrap();
//!
//! // Hold the offset while fitting the rest.
//! params.fix("y0").unwrap();
//! assert_eq!(params.varying_count(), 2);
//! ```

pub mod bounds;
pub mod parameter;
pub mod parameters;

// Re-export key types
pub use bounds::Bounds;
pub use parameter::Parameter;
pub use parameters::ParameterSet;
