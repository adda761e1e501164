//! Built-in functions and constants.

use std::f64::consts::PI;

/// Built-in functions that take numeric arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Sec,
    Csc,
    Cot,
    Sech,
    Exp,
    Ln,
    Log10,
    Log2,
    Sqrt,
    Cbrt,
    Abs,
    Sign,
    Floor,
    Ceil,
    Round,
    Trunc,
    Min,
    Max,
    Pow,
    Hypot,
    Mod,
    If,
    Gauss,
    Lorentz,
}

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl Function {
    pub fn lookup(name: &str) -> Option<Self> {
        use Function::*;
        Some(match name {
            "sin" => Sin,
            "cos" => Cos,
            "tan" => Tan,
            "asin" => Asin,
            "acos" => Acos,
            "atan" => Atan,
            "atan2" => Atan2,
            "sinh" => Sinh,
            "cosh" => Cosh,
            "tanh" => Tanh,
            "asinh" => Asinh,
            "acosh" => Acosh,
            "atanh" => Atanh,
            "sec" => Sec,
            "csc" => Csc,
            "cot" => Cot,
            "sech" => Sech,
            "exp" => Exp,
            "ln" => Ln,
            "log" | "log10" => Log10,
            "log2" => Log2,
            "sqrt" => Sqrt,
            "cbrt" => Cbrt,
            "abs" => Abs,
            "sign" | "sgn" => Sign,
            "floor" => Floor,
            "ceil" => Ceil,
            "round" | "rint" => Round,
            "trunc" => Trunc,
            "min" => Min,
            "max" => Max,
            "pow" => Pow,
            "hypot" => Hypot,
            "mod" => Mod,
            "if" => If,
            "gauss" => Gauss,
            "lorentz" => Lorentz,
            _ => return None,
        })
    }

    pub fn arity(self) -> Arity {
        use Function::*;
        match self {
            Min | Max => Arity::AtLeast(1),
            Atan2 | Pow | Hypot | Mod => Arity::Exactly(2),
            If | Gauss | Lorentz => Arity::Exactly(3),
            _ => Arity::Exactly(1),
        }
    }

    /// Apply to already evaluated arguments; the arity has been checked at compile time.
    pub fn apply(self, args: &[f64]) -> f64 {
        use Function::*;
        let a = args.first().copied().unwrap_or(f64::NAN);
        let b = args.get(1).copied().unwrap_or(f64::NAN);
        let c = args.get(2).copied().unwrap_or(f64::NAN);
        match self {
            Sin => a.sin(),
            Cos => a.cos(),
            Tan => a.tan(),
            Asin => a.asin(),
            Acos => a.acos(),
            Atan => a.atan(),
            Atan2 => a.atan2(b),
            Sinh => a.sinh(),
            Cosh => a.cosh(),
            Tanh => a.tanh(),
            Asinh => a.asinh(),
            Acosh => a.acosh(),
            Atanh => a.atanh(),
            Sec => 1.0 / a.cos(),
            Csc => 1.0 / a.sin(),
            Cot => 1.0 / a.tan(),
            Sech => 1.0 / a.cosh(),
            Exp => a.exp(),
            Ln => a.ln(),
            Log10 => a.log10(),
            Log2 => a.log2(),
            Sqrt => a.sqrt(),
            Cbrt => a.cbrt(),
            Abs => a.abs(),
            Sign => {
                if a > 0.0 {
                    1.0
                } else if a < 0.0 {
                    -1.0
                } else {
                    a
                }
            }
            Floor => a.floor(),
            Ceil => a.ceil(),
            Round => a.round(),
            Trunc => a.trunc(),
            Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Pow => a.powf(b),
            Hypot => a.hypot(b),
            Mod => a % b,
            If => {
                if a != 0.0 && !a.is_nan() {
                    b
                } else {
                    c
                }
            }
            // gauss(x, mu, sigma): normalized Gaussian density.
            Gauss => (-(a - b).powi(2) / (2.0 * c * c)).exp() / (c.abs() * (2.0 * PI).sqrt()),
            // lorentz(x, x0, gamma): Cauchy density with half width gamma.
            Lorentz => c / (PI * ((a - b).powi(2) + c * c)),
        }
    }
}

/// Value of a built-in constant.
pub fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

/// Aggregates of a whole column, folded at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStatistic {
    Mean,
    Sum,
    Min,
    Max,
    Size,
    StdDev,
    Median,
}

impl ColumnStatistic {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "mean" => ColumnStatistic::Mean,
            "sum" => ColumnStatistic::Sum,
            "min" => ColumnStatistic::Min,
            "max" => ColumnStatistic::Max,
            "size" => ColumnStatistic::Size,
            "stddev" => ColumnStatistic::StdDev,
            "median" => ColumnStatistic::Median,
            _ => return None,
        })
    }

    /// Evaluate over the non-NaN values of a column.
    pub fn apply(self, values: &[f64]) -> f64 {
        use crate::utils::stats;
        let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        match self {
            ColumnStatistic::Mean => stats::mean(&finite),
            ColumnStatistic::Sum => finite.iter().sum(),
            ColumnStatistic::Min => stats::min(&finite),
            ColumnStatistic::Max => stats::max(&finite),
            ColumnStatistic::Size => finite.len() as f64,
            ColumnStatistic::StdDev => stats::std_dev(&finite),
            ColumnStatistic::Median => stats::median(&finite),
        }
    }
}
