//! Utility functions and helpers for the numfit-rs library.

pub mod finite_difference;
pub mod linalg;
pub mod matrix_convert;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod stats;

// Re-export commonly used utilities
pub use matrix_convert::{
    nalgebra_to_ndarray, nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};
