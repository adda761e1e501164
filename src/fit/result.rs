//! The outcome of a fit.

use std::fmt;
use std::fmt::Write as _;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::config::Algorithm;
use super::report::{PlotHandle, PlotSink, ResultsLog};
use super::statistics::{self, FitStatistics, ParameterTest};
use crate::data::{GeneratedCurve, WeightingScheme};
use crate::error::{FitError, Result};
use crate::lm::ConvergenceStatus;
use crate::parameters::ParameterSet;

const RULE: &str = "---------------------------------------------------------------------------------------";

/// How the optimizer finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    Converged,
    MaxIterationsReached,
    TimeLimitReached,
    Failed(String),
}

impl FitStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, FitStatus::Converged)
    }
}

impl From<&ConvergenceStatus> for FitStatus {
    fn from(status: &ConvergenceStatus) -> Self {
        match status {
            s if s.is_converged() => FitStatus::Converged,
            ConvergenceStatus::MaxIterationsReached => FitStatus::MaxIterationsReached,
            ConvergenceStatus::TimeLimitReached => FitStatus::TimeLimitReached,
            ConvergenceStatus::Failed(reason) => FitStatus::Failed(reason.clone()),
            other => FitStatus::Failed(other.description()),
        }
    }
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitStatus::Converged => write!(f, "success"),
            FitStatus::MaxIterationsReached => write!(f, "maximum number of iterations reached"),
            FitStatus::TimeLimitReached => write!(f, "time limit reached"),
            FitStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// One peak of a multi-peak fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakComponent {
    pub index: usize,

    /// Peak plus the shared offset, sampled like the fit curve
    pub curve: Option<GeneratedCurve>,

    pub area: f64,

    /// Propagated from the parameter covariance
    pub area_error: f64,
}

/// Everything a fit produced. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model_name: String,
    pub dataset_name: String,
    pub formula: String,
    pub algorithm: Algorithm,
    pub tolerance: f64,
    pub weighting: WeightingScheme,

    /// x extent of the fitted data
    pub x_range: (f64, f64),

    pub points: usize,
    pub iterations: usize,
    pub func_evals: usize,
    pub status: FitStatus,

    /// Final values with their standard errors
    pub parameters: ParameterSet,

    /// In parameter order; zero for fixed parameters
    pub errors: Vec<f64>,

    /// t test of each parameter, in parameter order
    pub parameter_tests: Vec<ParameterTest>,

    /// Percent, for the margins of `parameter_tests`
    pub confidence_level: f64,

    /// Unscaled `(JᵀWJ)⁻¹`, `p × p`, zero rows for fixed parameters
    pub covariance: Array2<f64>,

    pub statistics: FitStatistics,
    pub curve: Option<GeneratedCurve>,
    pub components: Vec<PeakComponent>,
}

impl FitResult {
    pub fn values(&self) -> Vec<f64> {
        self.parameters.values()
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.parameters.value(name)
    }

    pub fn error(&self, name: &str) -> Option<f64> {
        self.parameters.index_of(name).map(|i| self.errors[i])
    }

    pub fn chi_square(&self) -> f64 {
        self.statistics.chi_square
    }

    pub fn reduced_chi_square(&self) -> f64 {
        self.statistics.reduced_chi_square
    }

    pub fn r_squared(&self) -> f64 {
        self.statistics.r_squared
    }

    pub fn correlation(&self) -> Array2<f64> {
        statistics::correlation(&self.covariance)
    }

    /// # Errors
    ///
    /// * `FitError::NonConvergence` unless the status is `Converged`
    pub fn require_converged(&self) -> Result<&Self> {
        if self.status.is_converged() {
            Ok(self)
        } else {
            Err(FitError::NonConvergence {
                iterations: self.iterations,
                reason: self.status.to_string(),
            })
        }
    }

    /// The block written to the results log.
    pub fn summary(&self) -> String {
        let mut info = String::new();
        let _ = writeln!(
            info,
            "{} fit of dataset: {}, using function: {}",
            self.model_name, self.dataset_name, self.formula
        );
        let _ = writeln!(info, "Weighting Method: {}", self.weighting);
        if self.algorithm.is_iterative() {
            let _ = writeln!(
                info,
                "{} algorithm with tolerance = {}",
                self.algorithm, self.tolerance
            );
        } else {
            let _ = writeln!(info, "{}", self.algorithm);
        }
        let _ = writeln!(info, "From x = {} to x = {}", self.x_range.0, self.x_range.1);
        for ((param, err), test) in self
            .parameters
            .iter()
            .zip(&self.errors)
            .zip(&self.parameter_tests)
        {
            let _ = writeln!(
                info,
                "{} = {} +/- {} (t = {}, p = {}, {}% margin = {})",
                param.name(),
                param.value(),
                err,
                test.t_value,
                test.p_value,
                self.confidence_level,
                test.margin
            );
        }
        let stats = &self.statistics;
        let _ = writeln!(info, "{}", RULE);
        let _ = writeln!(info, "Chi^2/doF = {}", stats.reduced_chi_square);
        let _ = writeln!(info, "R^2 = {}", stats.r_squared);
        let _ = writeln!(info, "Adj. R^2 = {}", stats.adjusted_r_squared);
        let _ = writeln!(
            info,
            "SSE = {}, MSE = {}, RMSE = {}, MAE = {}",
            stats.sse(),
            stats.mse,
            stats.rmse,
            stats.mae
        );
        let _ = writeln!(info, "Chi^2 p = {}", stats.chi_square_p);
        let _ = writeln!(info, "F = {} (p = {})", stats.f_statistic, stats.f_p_value);
        let _ = writeln!(info, "log-likelihood = {}", stats.log_likelihood);
        let _ = writeln!(info, "AIC = {}, BIC = {}", stats.aic, stats.bic);
        let _ = writeln!(info, "{}", RULE);
        let _ = writeln!(info, "Iterations = {}", self.iterations);
        let _ = writeln!(info, "Status = {}", self.status);
        let _ = writeln!(info, "{}", RULE);
        for component in &self.components {
            let _ = writeln!(
                info,
                "Peak {} area = {} +/- {}",
                component.index + 1,
                component.area,
                component.area_error
            );
        }
        info
    }

    /// Append [`summary`](Self::summary) to a results log.
    pub fn write_to(&self, log: &mut dyn ResultsLog) {
        log.append_block(&self.summary());
    }

    /// Hand the fitted curve to the plot. `None` when no curve was generated.
    pub fn register_curve(&self, sink: &mut dyn PlotSink) -> Option<PlotHandle> {
        self.curve
            .as_ref()
            .map(|curve| sink.add_curve(curve, &curve.name))
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
