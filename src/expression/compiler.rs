//! Name resolution and evaluation of parsed expressions.

use std::fmt;
use std::sync::Arc;

use log::trace;

use super::ast::{Ast, BinaryOp, UnaryOp};
use super::context::{ColumnDef, ExpressionContext};
use super::functions::{self, ColumnStatistic, Function};
use super::parser;
use crate::error::{FitError, Result};

/// Resolved expression tree.
#[derive(Debug, Clone)]
enum Node {
    Const(f64),
    Variable,
    Param(usize),
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
    /// `cell(column, row)` with a 1-based row.
    Cell(Arc<[f64]>, Box<Node>),
}

impl Node {
    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        match self {
            Node::Const(v) => *v,
            Node::Variable => x,
            Node::Param(i) => params.get(*i).copied().unwrap_or(f64::NAN),
            Node::Neg(operand) => -operand.eval(x, params),
            Node::Binary(op, lhs, rhs) => op.apply(lhs.eval(x, params), rhs.eval(x, params)),
            Node::Call(function, args) => match args.as_slice() {
                [a] => function.apply(&[a.eval(x, params)]),
                [a, b] => function.apply(&[a.eval(x, params), b.eval(x, params)]),
                [a, b, c] => function.apply(&[
                    a.eval(x, params),
                    b.eval(x, params),
                    c.eval(x, params),
                ]),
                _ => {
                    let values: Vec<f64> = args.iter().map(|a| a.eval(x, params)).collect();
                    function.apply(&values)
                }
            },
            Node::Cell(values, row) => {
                let row = row.eval(x, params).round();
                if row >= 1.0 && row <= values.len() as f64 {
                    values[row as usize - 1]
                } else {
                    f64::NAN
                }
            }
        }
    }

    fn is_const(&self) -> bool {
        matches!(self, Node::Const(_))
    }

    /// Replace by a constant when every input is constant.
    fn folded(self) -> Node {
        let foldable = match &self {
            Node::Neg(operand) => operand.is_const(),
            Node::Binary(_, lhs, rhs) => lhs.is_const() && rhs.is_const(),
            Node::Call(_, args) => args.iter().all(Node::is_const),
            _ => false,
        };
        if foldable {
            Node::Const(self.eval(0.0, &[]))
        } else {
            self
        }
    }
}

/// A compiled formula, reusable for every residual evaluation.
///
/// Evaluation is pure, so a compiled expression can be shared between threads.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    text: String,
    variable: String,
    parameters: Vec<String>,
    root: Node,
}

impl CompiledExpr {
    /// Evaluate at `x` with parameter values in the order given to the compiler.
    pub fn eval(&self, x: f64, params: &[f64]) -> f64 {
        self.root.eval(x, params)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameters
    }

    /// Whether the expression folded to a constant.
    pub fn is_constant(&self) -> bool {
        self.root.is_const()
    }
}

impl fmt::Display for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Builder for compiling formulas against an [`ExpressionContext`].
///
/// # Example
///
/// ```
/// use numfit_rs::expression::{Compiler, ExpressionContext};
///
/// let ctx = ExpressionContext::new();
/// let expr = Compiler::new(&ctx)
///     .parameters(&["a", "b"])
///     .compile("a * x + b")
///     .unwrap();
/// assert_eq!(expr.eval(2.0, &[3.0, 1.0]), 7.0);
/// ```
#[derive(Debug, Clone)]
pub struct Compiler<'a> {
    ctx: &'a ExpressionContext,
    variable: String,
    parameters: Vec<String>,
    target: Option<String>,
}

impl<'a> Compiler<'a> {
    pub fn new(ctx: &'a ExpressionContext) -> Self {
        Self {
            ctx,
            variable: "x".to_string(),
            parameters: Vec::new(),
            target: None,
        }
    }

    /// Name of the independent variable (default `x`).
    pub fn variable(mut self, name: &str) -> Self {
        self.variable = name.to_string();
        self
    }

    pub fn parameters<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.parameters = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    /// Name of the column (or formula) being defined; lookups may not reach it.
    pub fn target(mut self, name: &str) -> Self {
        self.target = Some(name.to_string());
        self
    }

    pub fn compile(&self, text: &str) -> Result<CompiledExpr> {
        let ast = parser::parse(text)?;
        let mut resolver = Resolver {
            ctx: self.ctx,
            variable: &self.variable,
            parameters: &self.parameters,
            visiting: self.target.iter().cloned().collect(),
        };
        let root = resolver.resolve(&ast)?;
        trace!("compiled '{}' with parameters {:?}", text, self.parameters);
        Ok(CompiledExpr {
            text: text.to_string(),
            variable: self.variable.clone(),
            parameters: self.parameters.clone(),
            root,
        })
    }
}

struct Resolver<'a> {
    ctx: &'a ExpressionContext,
    variable: &'a str,
    parameters: &'a [String],
    /// Columns whose definitions are being resolved, outermost first.
    visiting: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn resolve(&mut self, ast: &Ast) -> Result<Node> {
        Ok(match ast {
            Ast::Number(v) => Node::Const(*v),
            Ast::Text(text) => {
                return Err(FitError::ParseError {
                    message: format!("string \"{}\" is only allowed as a column name", text),
                    position: 0,
                })
            }
            Ast::Identifier(name) => self.identifier(name)?,
            Ast::Unary(UnaryOp::Neg, operand) => Node::Neg(Box::new(self.resolve(operand)?)).folded(),
            Ast::Binary(op, lhs, rhs) => {
                Node::Binary(*op, Box::new(self.resolve(lhs)?), Box::new(self.resolve(rhs)?))
                    .folded()
            }
            Ast::Call(name, args) => self.call(name, args)?,
        })
    }

    fn identifier(&self, name: &str) -> Result<Node> {
        if name == self.variable {
            return Ok(Node::Variable);
        }
        if let Some(index) = self.parameters.iter().position(|p| p == name) {
            return Ok(Node::Param(index));
        }
        if let Some(value) = self.ctx.constant(name).or_else(|| functions::constant(name)) {
            return Ok(Node::Const(value));
        }
        Err(FitError::UnknownIdentifier(name.to_string()))
    }

    fn call(&mut self, name: &str, args: &[Ast]) -> Result<Node> {
        if let Some(Ast::Text(column)) = args.first() {
            if name == "cell" {
                if args.len() != 2 {
                    return Err(arity_error(name, args.len()));
                }
                let values = self.column_values(column)?;
                let row = self.resolve(&args[1])?;
                return Ok(Node::Cell(values, Box::new(row)));
            }
            if let Some(statistic) = ColumnStatistic::lookup(name) {
                if args.len() != 1 {
                    return Err(arity_error(name, args.len()));
                }
                let values = self.column_values(column)?;
                return Ok(Node::Const(statistic.apply(&values)));
            }
        }
        let function = Function::lookup(name).ok_or_else(|| FitError::ParseError {
            message: format!("unknown function '{}'", name),
            position: 0,
        })?;
        if !function.arity().accepts(args.len()) {
            return Err(arity_error(name, args.len()));
        }
        let args = args
            .iter()
            .map(|arg| self.resolve(arg))
            .collect::<Result<Vec<_>>>()?;
        Ok(Node::Call(function, args).folded())
    }

    /// Values of a column, materialising formula columns on the way.
    fn column_values(&mut self, name: &str) -> Result<Arc<[f64]>> {
        if self.visiting.iter().any(|v| v == name) {
            return Err(FitError::RecursiveReference(name.to_string()));
        }
        let ctx = self.ctx;
        match ctx.column(name) {
            None => Err(FitError::EmptySelection(name.to_string())),
            Some(ColumnDef::Values(values)) => Ok(Arc::clone(values)),
            Some(ColumnDef::Formula { text, rows }) => {
                let ast = parser::parse(text)?;
                self.visiting.push(name.to_string());
                let mut inner = Resolver {
                    ctx,
                    variable: "i",
                    parameters: &[],
                    visiting: std::mem::take(&mut self.visiting),
                };
                let resolved = inner.resolve(&ast);
                self.visiting = inner.visiting;
                self.visiting.pop();
                let node = resolved?;
                let values: Vec<f64> = (1..=*rows).map(|i| node.eval(i as f64, &[])).collect();
                Ok(values.into())
            }
        }
    }
}

fn arity_error(name: &str, count: usize) -> FitError {
    FitError::ParseError {
        message: format!("wrong number of arguments ({}) for '{}'", count, name),
        position: 0,
    }
}

/// Free identifiers of `text` in order of first appearance, excluding the
/// variable, function names and known constants.
pub fn detect_parameters(text: &str, variable: &str, ctx: &ExpressionContext) -> Result<Vec<String>> {
    let ast = parser::parse(text)?;
    Ok(ast
        .identifiers()
        .into_iter()
        .filter(|name| {
            name != variable && ctx.constant(name).is_none() && functions::constant(name).is_none()
        })
        .collect())
}

/// Compile `text` in variable `x` with the given parameter names.
pub fn compile<S: AsRef<str>>(text: &str, parameters: &[S], ctx: &ExpressionContext) -> Result<CompiledExpr> {
    Compiler::new(ctx).parameters(parameters).compile(text)
}
