//! Fit engine configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data::{ExtractOptions, Range, WeightingScheme};
use crate::error::Result;

/// The minimizer used by the fit engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    /// Nelder–Mead downhill simplex on the sum of squares
    Simplex,

    /// Levenberg–Marquardt with `D = I`
    LevenbergMarquardt,

    /// Levenberg–Marquardt with `D = diag(JᵀJ)`
    #[default]
    ScaledLevenbergMarquardt,

    /// Direct weighted linear least squares (closed-form models only)
    LinearLeastSquares,
}

impl Algorithm {
    pub fn is_iterative(self) -> bool {
        self != Algorithm::LinearLeastSquares
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Simplex => "Nelder-Mead Simplex",
            Algorithm::LevenbergMarquardt => "Unscaled Levenberg-Marquardt",
            Algorithm::ScaledLevenbergMarquardt => "Scaled Levenberg-Marquardt",
            Algorithm::LinearLeastSquares => "Linear least squares",
        };
        write!(f, "{}", name)
    }
}

/// Where the fitted curve is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveSampling {
    /// No curve
    None,

    /// At the x values of the fitted data
    DataPoints,

    /// At `n` evenly spaced points across the fit range
    Uniform(usize),
}

impl Default for CurveSampling {
    fn default() -> Self {
        CurveSampling::Uniform(100)
    }
}

/// Configuration for one fit invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Default: ScaledLevenbergMarquardt
    pub algorithm: Algorithm,

    /// Relative step tolerance of the optimizer. Default: 1e-4
    pub tolerance: f64,

    /// Default: 1000
    pub max_iterations: usize,

    /// Default: 100 uniform points
    pub sampling: CurveSampling,

    /// Solve closed-form models directly when nothing is fixed or bounded. Default: true
    pub prefer_closed_form: bool,

    /// Multiply parameter errors by `√(χ²/dof)`. Default: false
    pub scale_errors: bool,

    /// Confidence level of the parameter margins, in percent. Default: 95
    pub confidence_level: f64,

    /// Wall-clock budget for the optimizer. Default: none
    pub time_limit: Option<Duration>,

    /// Range, weighting and sorting used when extracting from a column source
    pub extract: ExtractOptions,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            tolerance: 1e-4,
            max_iterations: 1000,
            sampling: CurveSampling::default(),
            prefer_closed_form: true,
            scale_errors: false,
            confidence_level: 95.0,
            time_limit: None,
            extract: ExtractOptions::default(),
        }
    }
}

impl FitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_sampling(mut self, sampling: CurveSampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_prefer_closed_form(mut self, prefer: bool) -> Self {
        self.prefer_closed_form = prefer;
        self
    }

    pub fn with_scale_errors(mut self, scale: bool) -> Self {
        self.scale_errors = scale;
        self
    }

    pub fn with_confidence_level(mut self, percent: f64) -> Self {
        self.confidence_level = percent;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.extract.range = range;
        self
    }

    pub fn with_weighting(mut self, weighting: WeightingScheme) -> Self {
        self.extract.weighting = weighting;
        self
    }

    pub fn with_sort_by_x(mut self, sort: bool) -> Self {
        self.extract.sort_by_x = sort;
        self
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FitConfig::default();
        assert_eq!(config.algorithm, Algorithm::ScaledLevenbergMarquardt);
        assert_eq!(config.tolerance, 1e-4);
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.sampling, CurveSampling::Uniform(100));
        assert!(config.prefer_closed_form);
        assert!(!config.scale_errors);
        assert_eq!(config.confidence_level, 95.0);
        assert!(config.extract.sort_by_x);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = FitConfig::new()
            .with_algorithm(Algorithm::Simplex)
            .with_sampling(CurveSampling::DataPoints)
            .with_weighting(WeightingScheme::ArbitraryDataset("sigma".to_string()))
            .with_time_limit(Duration::from_millis(250));
        let json = config.to_json().unwrap();
        assert_eq!(FitConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(Algorithm::Simplex.to_string(), "Nelder-Mead Simplex");
        assert!(!Algorithm::LinearLeastSquares.is_iterative());
    }
}
