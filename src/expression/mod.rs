//! User formula parsing and evaluation.
//!
//! Text is parsed with nom into an [`ast::Ast`], then resolved against a
//! caller-owned [`ExpressionContext`] into a [`CompiledExpr`]. Resolution
//! binds the independent variable, the ordered parameter names, constants
//! and dataset lookups (`cell("col", i)`, `mean("col")`, ...). All lookups
//! and cycle checks happen at compile time; evaluation is a pure tree walk.

pub mod ast;
pub mod compiler;
pub mod context;
pub mod functions;
pub mod parser;

pub use compiler::{compile, detect_parameters, CompiledExpr, Compiler};
pub use context::ExpressionContext;
pub use parser::parse;
