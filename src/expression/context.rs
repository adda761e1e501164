//! Caller-owned evaluation context: constants and dataset columns visible to formulas.

use std::collections::HashMap;
use std::sync::Arc;

use crate::data::{ColumnData, ColumnSource};

/// A column available to `cell(...)` and column statistics.
#[derive(Debug, Clone)]
pub(crate) enum ColumnDef {
    Values(Arc<[f64]>),
    /// Values defined by a formula in the 1-based row index `i`.
    Formula { text: String, rows: usize },
}

/// Named constants and columns for the expression compiler.
///
/// Nothing here is global: each host document (or test) builds its own
/// context and hands it to the compiler.
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    constants: HashMap<String, f64>,
    columns: HashMap<String, ColumnDef>,
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every column of a source. Text cells that are not numbers become NaN.
    pub fn from_source<S: ColumnSource + ?Sized>(source: &S) -> Self {
        let mut ctx = Self::new();
        for name in source.column_names() {
            if let Some(column) = source.column(&name) {
                let values: Vec<f64> = match column {
                    ColumnData::Numeric(values) => values.to_vec(),
                    ColumnData::Text(_) => (0..column.len())
                        .map(|row| column.value(row).ok().flatten().unwrap_or(f64::NAN))
                        .collect(),
                };
                ctx.set_column(&name, values);
            }
        }
        ctx
    }

    pub fn with_constant(mut self, name: &str, value: f64) -> Self {
        self.set_constant(name, value);
        self
    }

    pub fn set_constant(&mut self, name: &str, value: f64) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }

    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Self {
        self.set_column(name, values);
        self
    }

    pub fn set_column(&mut self, name: &str, values: Vec<f64>) {
        self.columns
            .insert(name.to_string(), ColumnDef::Values(values.into()));
    }

    /// Define a column by a formula in the row index `i` (1-based) with `rows` rows.
    ///
    /// The formula is compiled when another expression first looks the column up.
    pub fn with_formula_column(mut self, name: &str, formula: &str, rows: usize) -> Self {
        self.set_formula_column(name, formula, rows);
        self
    }

    pub fn set_formula_column(&mut self, name: &str, formula: &str, rows: usize) {
        self.columns.insert(
            name.to_string(),
            ColumnDef::Formula {
                text: formula.to_string(),
                rows,
            },
        );
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub(crate) fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }
}
