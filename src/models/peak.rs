//! Multi-peak models for fitting data.
//!
//! Sums of Gaussian or Lorentzian peaks over a shared offset, common in
//! spectroscopy and diffraction. Each peak `i` has parameters `A_i`
//! (area or height), `xc_i` (center) and `w_i` (width); `y0` is shared.

use serde::{Deserialize, Serialize};
use std::f64::consts::{LN_2, PI};

use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::model::FitModel;

/// Peak profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeakShape {
    /// Area form, `w = 2σ`: `sqrt(2/π)·A/w·exp(−2(x−xc)²/w²)`
    Gaussian,
    /// Area form, `w = FWHM`: `2A/π · w/(4(x−xc)² + w²)`
    Lorentzian,
    /// Height form: `A·exp(−(x−xc)²/(2w²))`
    GaussianAmplitude,
}

impl PeakShape {
    fn name(self) -> &'static str {
        match self {
            PeakShape::Gaussian => "Gaussian",
            PeakShape::Lorentzian => "Lorentzian",
            PeakShape::GaussianAmplitude => "Gaussian (amplitude)",
        }
    }

    fn formula(self) -> &'static str {
        match self {
            PeakShape::Gaussian => "sqrt(2/pi)*A/w*exp(-2*((x-xc)/w)^2)",
            PeakShape::Lorentzian => "2*A/pi*w/(4*(x-xc)^2 + w^2)",
            PeakShape::GaussianAmplitude => "A*exp(-(x-xc)^2/(2*w^2))",
        }
    }

    /// Peak value without offset.
    pub fn value(self, x: f64, a: f64, xc: f64, w: f64) -> f64 {
        let d = x - xc;
        match self {
            PeakShape::Gaussian => (2.0 / PI).sqrt() * a / w * (-2.0 * d * d / (w * w)).exp(),
            PeakShape::Lorentzian => 2.0 * a / PI * w / (4.0 * d * d + w * w),
            PeakShape::GaussianAmplitude => a * (-d * d / (2.0 * w * w)).exp(),
        }
    }

    /// `(∂/∂A, ∂/∂xc, ∂/∂w)` of [`PeakShape::value`].
    fn gradient(self, x: f64, a: f64, xc: f64, w: f64) -> [f64; 3] {
        let d = x - xc;
        match self {
            PeakShape::Gaussian => {
                let f = self.value(x, a, xc, w);
                let e = (2.0 / PI).sqrt() / w * (-2.0 * d * d / (w * w)).exp();
                [e, f * 4.0 * d / (w * w), f * (4.0 * d * d / (w * w * w) - 1.0 / w)]
            }
            PeakShape::Lorentzian => {
                let den = 4.0 * d * d + w * w;
                let c = 2.0 / PI;
                [
                    c * w / den,
                    c * a * w * 8.0 * d / (den * den),
                    c * a * (4.0 * d * d - w * w) / (den * den),
                ]
            }
            PeakShape::GaussianAmplitude => {
                let e = (-d * d / (2.0 * w * w)).exp();
                let f = a * e;
                [e, f * d / (w * w), f * d * d / (w * w * w)]
            }
        }
    }

    /// Integrated area of one peak.
    pub fn area(self, a: f64, w: f64) -> f64 {
        match self {
            PeakShape::Gaussian | PeakShape::Lorentzian => a,
            PeakShape::GaussianAmplitude => a * w.abs() * (2.0 * PI).sqrt(),
        }
    }

    /// `(A, w)` for a peak of the given height and full width at half maximum.
    fn from_height(self, height: f64, fwhm: f64) -> (f64, f64) {
        match self {
            PeakShape::Gaussian => {
                let w = fwhm / (2.0 * LN_2).sqrt();
                (height * w * (PI / 2.0).sqrt(), w)
            }
            PeakShape::Lorentzian => (height * PI * fwhm / 2.0, fwhm),
            PeakShape::GaussianAmplitude => (height, fwhm / (8.0 * LN_2).sqrt()),
        }
    }
}

/// N peaks of one shape plus a shared offset `y0`.
///
/// The initial centers are sorted ascending, so the fit does not depend on
/// the order in which peaks were picked.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPeakModel {
    shape: PeakShape,
    centers: Vec<f64>,
}

impl MultiPeakModel {
    /// # Errors
    ///
    /// * `FitError::InvalidInput` if `centers` is empty or holds non-finite values
    pub fn new(shape: PeakShape, centers: &[f64]) -> Result<Self> {
        if centers.is_empty() {
            return Err(FitError::invalid_input("at least one peak center is required"));
        }
        if centers.iter().any(|c| !c.is_finite()) {
            return Err(FitError::invalid_input("peak centers must be finite"));
        }
        let mut centers = centers.to_vec();
        centers.sort_by(f64::total_cmp);
        Ok(Self { shape, centers })
    }

    pub fn shape(&self) -> PeakShape {
        self.shape
    }

    pub fn peak_count(&self) -> usize {
        self.centers.len()
    }

    /// Initial centers, ascending.
    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    fn offset(&self, params: &[f64]) -> f64 {
        params[3 * self.centers.len()]
    }
}

impl FitModel for MultiPeakModel {
    fn name(&self) -> String {
        match self.centers.len() {
            1 => self.shape.name().to_string(),
            n => format!("{} ({} peaks)", self.shape.name(), n),
        }
    }

    fn parameter_names(&self) -> Vec<String> {
        let n = self.centers.len();
        let mut names = Vec::with_capacity(3 * n + 1);
        if n == 1 {
            names.extend(["A", "xc", "w"].iter().map(|s| s.to_string()));
        } else {
            for i in 1..=n {
                names.push(format!("A{}", i));
                names.push(format!("xc{}", i));
                names.push(format!("w{}", i));
            }
        }
        names.push("y0".to_string());
        names
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        let peaks: f64 = params[..3 * self.centers.len()]
            .chunks_exact(3)
            .map(|p| self.shape.value(x, p[0], p[1], p[2]))
            .sum();
        peaks + self.offset(params)
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }

    fn jacobian(&self, x: f64, params: &[f64], row: &mut [f64]) -> Result<()> {
        let n = self.centers.len();
        for i in 0..n {
            let p = &params[3 * i..3 * i + 3];
            row[3 * i..3 * i + 3].copy_from_slice(&self.shape.gradient(x, p[0], p[1], p[2]));
        }
        row[3 * n] = 1.0;
        Ok(())
    }

    fn min_points(&self) -> usize {
        3 * self.centers.len() + 1
    }

    fn formula(&self) -> String {
        let peak = self.shape.formula();
        if self.centers.len() == 1 {
            format!("y = y0 + {}", peak)
        } else {
            format!("y = y0 + sum_i {}", peak.replace("xc", "xc_i").replace("A", "A_i").replace("w", "w_i"))
        }
    }

    /// Heights at the given centers above the data minimum, widths from the
    /// half-maximum crossings on either side.
    fn guess_parameters(&self, data: &Dataset) -> Result<Vec<f64>> {
        data.require_points(2)?;
        let x = data.x();
        let y = data.y();
        let n = x.len();
        let (y_min, y_max) = data.y_range().unwrap_or((0.0, 1.0));
        let (x_min, x_max) = data.x_range().unwrap_or((0.0, 1.0));
        let fallback_width = (x_max - x_min) / (5.0 * self.centers.len() as f64);
        let fallback_height = ((y_max - y_min) / self.centers.len() as f64).max(f64::MIN_POSITIVE);

        let mut guess = Vec::with_capacity(3 * self.centers.len() + 1);
        for (k, &center) in self.centers.iter().enumerate() {
            // Crossing searches stop halfway to the neighbouring centers.
            let left_limit = if k > 0 {
                0.5 * (self.centers[k - 1] + center)
            } else {
                f64::NEG_INFINITY
            };
            let right_limit = self
                .centers
                .get(k + 1)
                .map_or(f64::INFINITY, |next| 0.5 * (center + next));

            let idx = x
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| (*a - center).abs().total_cmp(&(*b - center).abs()))
                .map_or(0, |(i, _)| i);
            let height = y[idx] - y_min;
            let height = if height > 0.0 { height } else { fallback_height };
            let half = y_min + 0.5 * height;

            let mut left = idx;
            while left > 0 && y[left] > half && x[left - 1] >= left_limit {
                left -= 1;
            }
            let mut right = idx;
            while right + 1 < n && y[right] > half && x[right + 1] <= right_limit {
                right += 1;
            }
            let fwhm = x[right] - x[left];
            let fwhm = if fwhm > 0.0 { fwhm } else { fallback_width };

            let (a, w) = self.shape.from_height(height, fwhm);
            guess.extend([a, center, w]);
        }
        guess.push(y_min);
        Ok(guess)
    }

    fn component_count(&self) -> usize {
        self.centers.len()
    }

    fn evaluate_component(&self, index: usize, x: f64, params: &[f64]) -> Option<f64> {
        if index >= self.centers.len() {
            return None;
        }
        let p = &params[3 * index..3 * index + 3];
        Some(self.shape.value(x, p[0], p[1], p[2]) + self.offset(params))
    }

    fn component_area(&self, index: usize, params: &[f64]) -> Option<f64> {
        if index >= self.centers.len() {
            return None;
        }
        Some(self.shape.area(params[3 * index], params[3 * index + 2]))
    }
}
