//! Exponential growth and decay models.
//!
//! `y = Σ Aᵢ·exp(±x/tᵢ) + y0` with one to three terms.

use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::model::FitModel;

/// Direction of the exponential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExponentialKind {
    /// `exp(x/t)`
    Growth,
    /// `exp(-x/t)`
    Decay,
}

impl ExponentialKind {
    fn sign(self) -> f64 {
        match self {
            ExponentialKind::Growth => 1.0,
            ExponentialKind::Decay => -1.0,
        }
    }
}

/// Sum of one to three exponential terms plus an offset.
///
/// A single term has parameters `A, t, y0`; more terms use
/// `A1, t1, A2, t2, …, y0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialModel {
    kind: ExponentialKind,
    terms: usize,
}

impl ExponentialModel {
    /// # Errors
    ///
    /// * `FitError::InvalidInput` unless `1 <= terms <= 3`
    pub fn new(kind: ExponentialKind, terms: usize) -> Result<Self> {
        if !(1..=3).contains(&terms) {
            return Err(FitError::invalid_input(format!(
                "exponential models have 1 to 3 terms, got {}",
                terms
            )));
        }
        Ok(Self { kind, terms })
    }

    pub fn decay(terms: usize) -> Result<Self> {
        Self::new(ExponentialKind::Decay, terms)
    }

    pub fn growth(terms: usize) -> Result<Self> {
        Self::new(ExponentialKind::Growth, terms)
    }

    pub fn kind(&self) -> ExponentialKind {
        self.kind
    }

    pub fn terms(&self) -> usize {
        self.terms
    }

    /// Time constant multipliers used to spread the initial guess over the terms.
    fn spread(&self) -> &'static [f64] {
        match self.terms {
            1 => &[1.0],
            2 => &[0.5, 2.0],
            _ => &[0.25, 1.0, 4.0],
        }
    }
}

impl FitModel for ExponentialModel {
    fn name(&self) -> String {
        let kind = match self.kind {
            ExponentialKind::Growth => "Exponential growth",
            ExponentialKind::Decay => "Exponential decay",
        };
        match self.terms {
            1 => kind.to_string(),
            n => format!("{} ({} terms)", kind, n),
        }
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(2 * self.terms + 1);
        if self.terms == 1 {
            names.push("A".to_string());
            names.push("t".to_string());
        } else {
            for i in 1..=self.terms {
                names.push(format!("A{}", i));
                names.push(format!("t{}", i));
            }
        }
        names.push("y0".to_string());
        names
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        let s = self.kind.sign();
        let sum: f64 = params[..2 * self.terms]
            .chunks_exact(2)
            .map(|p| p[0] * (s * x / p[1]).exp())
            .sum();
        sum + params[2 * self.terms]
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }

    fn jacobian(&self, x: f64, params: &[f64], row: &mut [f64]) -> Result<()> {
        let s = self.kind.sign();
        for i in 0..self.terms {
            let (a, t) = (params[2 * i], params[2 * i + 1]);
            let e = (s * x / t).exp();
            row[2 * i] = e;
            row[2 * i + 1] = -a * e * s * x / (t * t);
        }
        row[2 * self.terms] = 1.0;
        Ok(())
    }

    fn formula(&self) -> String {
        let exponent = match self.kind {
            ExponentialKind::Growth => "x",
            ExponentialKind::Decay => "-x",
        };
        let terms: Vec<String> = if self.terms == 1 {
            vec![format!("A*exp({}/t)", exponent)]
        } else {
            (1..=self.terms)
                .map(|i| format!("A{i}*exp({}/t{i})", exponent, i = i))
                .collect()
        };
        format!("y = {} + y0", terms.join(" + "))
    }

    /// Log-linearise the first and last points around an offset placed just
    /// beyond the asymptotic end of the data.
    fn guess_parameters(&self, data: &Dataset) -> Result<Vec<f64>> {
        data.require_points(2)?;
        let x = data.x();
        let y = data.y();
        let n = x.len();
        let (x_first, x_last) = (x[0], x[n - 1]);
        let span = x_last - x_first;
        if span <= 0.0 {
            return Err(FitError::invalid_input(
                "cannot estimate a time constant from a zero x span",
            ));
        }

        // The asymptote sits at the last point for decay and the first for growth.
        let (near, far) = match self.kind {
            ExponentialKind::Decay => (y[n - 1], y[0]),
            ExponentialKind::Growth => (y[0], y[n - 1]),
        };
        let delta = far - near;
        let (amplitude, tau, offset) = if delta == 0.0 {
            (0.01 * near.abs().max(1.0), span, near)
        } else {
            let offset = near - 0.01 * delta;
            // (far - offset) / (near - offset) = 101
            let tau = span / ((far - offset) / (near - offset)).ln();
            let anchor = match self.kind {
                ExponentialKind::Decay => x_first,
                ExponentialKind::Growth => x_last,
            };
            let amplitude = (far - offset) / (self.kind.sign() * anchor / tau).exp();
            (amplitude, tau, offset)
        };

        let mut guess = Vec::with_capacity(2 * self.terms + 1);
        for factor in self.spread() {
            guess.push(amplitude / self.terms as f64);
            guess.push(tau * factor);
        }
        guess.push(offset);
        if guess.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NumericalError(
                "initial exponential estimate is not finite".to_string(),
            ));
        }
        Ok(guess)
    }
}
