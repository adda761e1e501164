//! Goodness-of-fit statistics and covariance helpers.

use std::f64::consts::PI;

use ndarray::Array2;
use serde::{Deserialize, Deserializer, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};

use crate::utils::stats;

/// p-values below this are reported as 0.
const P_FLOOR: f64 = 1e-9;

/// Summary statistics of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    /// `Σ wᵢ (yᵢ − fᵢ)²`
    pub chi_square: f64,

    /// Number of points minus the number of varying parameters
    pub dof: usize,

    /// `χ² / dof`, with the denominator floored at 1
    pub reduced_chi_square: f64,

    pub r_squared: f64,

    pub adjusted_r_squared: f64,

    /// `√(χ² / dof)`
    pub rms: f64,

    /// `χ² / n`
    pub mse: f64,

    pub rmse: f64,

    /// `Σ |rᵢ| / n` over the weighted residuals
    pub mae: f64,

    /// Probability of a larger χ² with `dof` degrees of freedom
    #[serde(deserialize_with = "nullable")]
    pub chi_square_p: f64,

    #[serde(deserialize_with = "nullable")]
    pub f_statistic: f64,

    #[serde(deserialize_with = "nullable")]
    pub f_p_value: f64,

    #[serde(deserialize_with = "nullable")]
    pub log_likelihood: f64,

    #[serde(deserialize_with = "nullable")]
    pub aic: f64,

    #[serde(deserialize_with = "nullable")]
    pub bic: f64,
}

impl FitStatistics {
    /// Statistics from the weighted residuals `√wᵢ (fᵢ − yᵢ)`.
    pub fn compute(residuals: &[f64], y: &[f64], weights: &[f64], varying: usize) -> Self {
        let n = y.len();
        let chi_square: f64 = residuals.iter().map(|r| r * r).sum();
        let dof = n.saturating_sub(varying);
        let denominator = dof.max(1) as f64;
        let reduced_chi_square = chi_square / denominator;

        let sst = stats::total_sum_of_squares(y, weights);
        let r_squared = if sst > 0.0 {
            1.0 - chi_square / sst
        } else if chi_square == 0.0 {
            1.0
        } else {
            0.0
        };
        let adjusted_r_squared = if n > 1 {
            1.0 - (1.0 - r_squared) * (n - 1) as f64 / denominator
        } else {
            r_squared
        };

        let points = n.max(1) as f64;
        let mse = chi_square / points;
        let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / points;

        let f_statistic = f_statistic(r_squared, varying, dof);
        let f_p_value = if f_statistic.is_nan() || f_statistic == f64::INFINITY {
            0.0
        } else {
            FisherSnedecor::new(varying as f64, dof as f64)
                .map(|dist| floor_p(dist.sf(f_statistic)))
                .unwrap_or(f64::NAN)
        };
        let chi_square_p = ChiSquared::new(dof as f64)
            .map(|dist| floor_p(dist.sf(chi_square)))
            .unwrap_or(f64::NAN);

        let (n_f, p_f) = (n as f64, varying as f64);
        let log_mse = mse.ln();
        let log_2pi = (2.0 * PI).ln();

        Self {
            chi_square,
            dof,
            reduced_chi_square,
            r_squared,
            adjusted_r_squared,
            rms: reduced_chi_square.sqrt(),
            mse,
            rmse: mse.sqrt(),
            mae,
            chi_square_p,
            f_statistic,
            f_p_value,
            log_likelihood: -n_f / 2.0 * (log_mse + log_2pi + 1.0),
            aic: n_f * log_mse + 2.0 * (p_f + 1.0) + n_f * log_2pi + n_f,
            bic: n_f * log_mse + (p_f + 1.0) * n_f.ln() + n_f + n_f * log_2pi,
        }
    }

    /// Sum of squared weighted residuals; the same number as `chi_square`.
    pub fn sse(&self) -> f64 {
        self.chi_square
    }
}

/// JSON writes non-finite numbers as `null`; read them back as NaN.
fn nullable<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// `dof/(p−1) / (1/R² − 1)` with `p` floored at 2.
fn f_statistic(r_squared: f64, parameters: usize, dof: usize) -> f64 {
    let p = parameters.max(2) as f64;
    dof as f64 / (p - 1.0) / (1.0 / r_squared - 1.0)
}

fn floor_p(p: f64) -> f64 {
    if p < P_FLOOR {
        0.0
    } else {
        p
    }
}

/// Student's t test of one parameter against zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterTest {
    /// `value / error`; `f64::MAX` for a zero error
    pub t_value: f64,

    /// Two-sided
    #[serde(deserialize_with = "nullable")]
    pub p_value: f64,

    /// Half-width of the confidence interval
    #[serde(deserialize_with = "nullable")]
    pub margin: f64,
}

/// One [`ParameterTest`] per parameter at `confidence_level` percent.
pub fn parameter_tests(
    values: &[f64],
    errors: &[f64],
    dof: usize,
    confidence_level: f64,
) -> Vec<ParameterTest> {
    let dist = StudentsT::new(0.0, 1.0, dof as f64).ok();
    let alpha = 1.0 - confidence_level / 100.0;
    let quantile = dist
        .as_ref()
        .map_or(f64::NAN, |d| d.inverse_cdf(1.0 - alpha / 2.0));

    values
        .iter()
        .zip(errors)
        .map(|(&value, &error)| {
            let t_value = if error > 0.0 { value / error } else { f64::MAX };
            let p_value = dist
                .as_ref()
                .map_or(f64::NAN, |d| floor_p(2.0 * d.sf(t_value.abs())));
            let margin = if error == 0.0 { 0.0 } else { quantile * error };
            ParameterTest {
                t_value,
                p_value,
                margin,
            }
        })
        .collect()
}

/// Square roots of the covariance diagonal; non-positive entries give 0.
pub fn standard_errors(covariance: &Array2<f64>) -> Vec<f64> {
    covariance
        .diag()
        .iter()
        .map(|&v| if v > 0.0 { v.sqrt() } else { 0.0 })
        .collect()
}

/// Correlation matrix `Cᵢⱼ / √(CᵢᵢCⱼⱼ)`.
pub fn correlation(covariance: &Array2<f64>) -> Array2<f64> {
    let n = covariance.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = (covariance[[i, i]] * covariance[[j, j]]).sqrt();
        if denom > 0.0 {
            covariance[[i, j]] / denom
        } else {
            0.0
        }
    })
}

/// Embed a covariance over the varying parameters into the full `p × p`
/// matrix, leaving rows and columns of fixed parameters at zero.
pub fn embed_covariance(varying: &Array2<f64>, indices: &[usize], total: usize) -> Array2<f64> {
    let mut full = Array2::zeros((total, total));
    for (a, &i) in indices.iter().enumerate() {
        for (b, &j) in indices.iter().enumerate() {
            full[[i, j]] = varying[[a, b]];
        }
    }
    full
}
