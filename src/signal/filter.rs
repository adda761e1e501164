//! FFT band filters.
//!
//! The signal is transformed, each bin is multiplied by a real gain that
//! depends on its folded frequency index `m = min(k, n − k)`, and the
//! result is transformed back.

use log::debug;
use serde::{Deserialize, Serialize};

use super::fft::{forward_real, inverse_real};
use super::mean_spacing;
use crate::data::{Dataset, GeneratedCurve};
use crate::error::{FitError, Result};

/// Highest supported Butterworth order.
pub const MAX_BUTTERWORTH_ORDER: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    LowPass,
    HighPass,
    BandPass,
    BandBlock,
}

impl FilterKind {
    fn is_band(self) -> bool {
        matches!(self, FilterKind::BandPass | FilterKind::BandBlock)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterForm {
    /// Gain 1 in the pass band and 0 elsewhere
    #[default]
    Ideal,
    /// `1/√(1 + (m/c)^{2N})` roll-off of the given order
    Butterworth(u8),
}

/// How cutoff values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CutoffUnit {
    /// In units of `1/x`
    #[default]
    Frequency,
    /// `0..=1`, where 1 is the Nyquist frequency
    NyquistFraction,
    /// Bin index
    Index,
}

/// Filter description. `low` is the cutoff of single-edge filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub kind: FilterKind,
    pub form: FilterForm,
    pub unit: CutoffUnit,
    pub low: f64,
    pub high: f64,
}

impl FilterOptions {
    pub fn low_pass(cutoff: f64) -> Self {
        Self::new(FilterKind::LowPass, cutoff, cutoff)
    }

    pub fn high_pass(cutoff: f64) -> Self {
        Self::new(FilterKind::HighPass, cutoff, cutoff)
    }

    pub fn band_pass(low: f64, high: f64) -> Self {
        Self::new(FilterKind::BandPass, low, high)
    }

    pub fn band_block(low: f64, high: f64) -> Self {
        Self::new(FilterKind::BandBlock, low, high)
    }

    fn new(kind: FilterKind, low: f64, high: f64) -> Self {
        Self {
            kind,
            form: FilterForm::Ideal,
            unit: CutoffUnit::Frequency,
            low,
            high,
        }
    }

    pub fn with_form(mut self, form: FilterForm) -> Self {
        self.form = form;
        self
    }

    pub fn with_unit(mut self, unit: CutoffUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Cutoffs are bin indices.
    pub fn by_index(self) -> Self {
        self.with_unit(CutoffUnit::Index)
    }

    /// Cutoffs are fractions of the Nyquist frequency.
    pub fn by_nyquist_fraction(self) -> Self {
        self.with_unit(CutoffUnit::NyquistFraction)
    }

    fn validate(&self) -> Result<()> {
        for cutoff in [self.low, self.high] {
            if !(cutoff.is_finite() && cutoff >= 0.0) {
                return Err(FitError::invalid_input(format!(
                    "filter cutoff must be a non-negative number, got {}",
                    cutoff
                )));
            }
        }
        if self.kind.is_band() && self.low >= self.high {
            return Err(FitError::InvalidBandLimits {
                low: self.low,
                high: self.high,
            });
        }
        if let FilterForm::Butterworth(order) = self.form {
            if order == 0 || order > MAX_BUTTERWORTH_ORDER {
                return Err(FitError::invalid_input(format!(
                    "Butterworth order must be between 1 and {}, got {}",
                    MAX_BUTTERWORTH_ORDER, order
                )));
            }
        }
        Ok(())
    }

    fn to_bins(&self, cutoff: f64, n: usize, dx: f64) -> f64 {
        match self.unit {
            CutoffUnit::Frequency => cutoff * n as f64 * dx,
            CutoffUnit::NyquistFraction => cutoff * n as f64 / 2.0,
            CutoffUnit::Index => cutoff,
        }
    }
}

fn ideal_low(m: f64, c: f64) -> f64 {
    if m < c {
        1.0
    } else {
        0.0
    }
}

fn butterworth_low(m: f64, c: f64, order: u8) -> f64 {
    if c <= 0.0 {
        return 0.0;
    }
    1.0 / (1.0 + (m / c).powi(2 * order as i32)).sqrt()
}

fn butterworth_high(m: f64, c: f64, order: u8) -> f64 {
    if m == 0.0 {
        return if c <= 0.0 { 1.0 } else { 0.0 };
    }
    1.0 / (1.0 + (c / m).powi(2 * order as i32)).sqrt()
}

fn gain(kind: FilterKind, form: FilterForm, m: f64, low: f64, high: f64) -> f64 {
    match form {
        FilterForm::Ideal => match kind {
            FilterKind::LowPass => ideal_low(m, low),
            FilterKind::HighPass => 1.0 - ideal_low(m, low),
            FilterKind::BandPass => (1.0 - ideal_low(m, low)) * ideal_low(m, high),
            FilterKind::BandBlock => 1.0 - (1.0 - ideal_low(m, low)) * ideal_low(m, high),
        },
        FilterForm::Butterworth(order) => match kind {
            FilterKind::LowPass => butterworth_low(m, low, order),
            FilterKind::HighPass => butterworth_high(m, low, order),
            FilterKind::BandPass => butterworth_high(m, low, order) * butterworth_low(m, high, order),
            FilterKind::BandBlock => {
                1.0 - butterworth_high(m, low, order) * butterworth_low(m, high, order)
            }
        },
    }
}

/// Filter `y`, sampled every `dx`.
///
/// # Errors
///
/// * `FitError::InvalidBandLimits` for a band filter with `low >= high`
/// * `FitError::InsufficientPoints` for fewer than 2 values
/// * `FitError::InvalidInput` for a negative cutoff or an unsupported Butterworth order
pub fn fft_filter(y: &[f64], dx: f64, options: &FilterOptions) -> Result<Vec<f64>> {
    options.validate()?;
    let n = y.len();
    let mut bins = forward_real(y)?;
    let low = options.to_bins(options.low, n, dx);
    let high = options.to_bins(options.high, n, dx);
    debug!(
        "fft filter {:?} ({:?}) over {} points, cutoff bins {} / {}",
        options.kind, options.form, n, low, high
    );
    for (k, bin) in bins.iter_mut().enumerate() {
        let m = k.min(n - k) as f64;
        *bin *= gain(options.kind, options.form, m, low, high);
    }
    inverse_real(&bins)
}

/// Filter a dataset, using its mean x spacing for frequency cutoffs.
pub fn fft_filter_dataset(data: &Dataset, options: &FilterOptions) -> Result<GeneratedCurve> {
    let dx = mean_spacing(data.x())?;
    let y = fft_filter(data.y(), dx, options)?;
    GeneratedCurve::new(format!("{} filtered", data.name()), data.x().to_vec(), y)
}
