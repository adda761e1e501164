//! Dataset extraction.
//!
//! A [`ColumnSource`] is the host's column store. [`extract`] turns one curve
//! of it into an immutable, x-sorted [`Dataset`] of `(x, y, weight)` triples
//! restricted to a [`Range`] and weighted by a [`WeightingScheme`]. The same
//! datasets feed the fit engine and the signal utilities, whose outputs come
//! back as [`GeneratedCurve`]s.

pub mod curve;
pub mod dataset;
pub mod extract;
pub mod range;
pub mod source;

pub use curve::{linspace, GeneratedCurve};
pub use dataset::Dataset;
pub use extract::{extract, CurveRef, ExtractOptions, WeightingScheme};
pub use range::Range;
pub use source::{ColumnData, ColumnSource, Table};
