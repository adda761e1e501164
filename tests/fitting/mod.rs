//! Fit engine tests through the public API.

mod engine_tests;
mod models_tests;
