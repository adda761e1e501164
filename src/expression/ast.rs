//! Syntax tree produced by the parser, before names are resolved.

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Number(f64),
    /// A quoted string; only meaningful as a column name argument.
    Text(String),
    Identifier(String),
    Unary(UnaryOp, Box<Ast>),
    Binary(BinaryOp, Box<Ast>, Box<Ast>),
    Call(String, Vec<Ast>),
}

impl Ast {
    /// Identifiers in order of first appearance, without duplicates.
    /// Function names are not identifiers.
    pub fn identifiers(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers(&self, names: &mut Vec<String>) {
        match self {
            Ast::Number(_) | Ast::Text(_) => {}
            Ast::Identifier(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Ast::Unary(_, operand) => operand.collect_identifiers(names),
            Ast::Binary(_, lhs, rhs) => {
                lhs.collect_identifiers(names);
                rhs.collect_identifiers(names);
            }
            Ast::Call(_, args) => {
                for arg in args {
                    arg.collect_identifiers(names);
                }
            }
        }
    }
}
