//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! This module provides functionality for computing the Levenberg-Marquardt step,
//! which blends the Gauss-Newton and gradient descent steps.

use ndarray::{Array1, Array2};

use super::config::Damping;
use crate::error::Result;
use crate::utils::linalg;

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The calculated step vector
    pub step: Array1<f64>,

    /// The reduction of `‖r‖²` predicted by the linearised model, `‖r‖² − ‖r + Jδ‖²`
    pub predicted_reduction: f64,

    /// The damping parameter used to calculate the step
    pub lambda: f64,
}

/// Handles step calculation for the Levenberg-Marquardt algorithm.
pub struct LmStep;

impl LmStep {
    /// Update the damping diagonal `D` from the current normal matrix.
    ///
    /// Scaled damping keeps the running maximum of `diag(JᵀJ)` over the
    /// iterations, so `D` never shrinks. A parameter that has had no influence
    /// so far gets 1.
    pub fn update_scale(scale: &mut Array1<f64>, j_t_j: &Array2<f64>, damping: Damping) {
        for (i, d) in scale.iter_mut().enumerate() {
            *d = match damping {
                Damping::Scaled => {
                    let diag = j_t_j[[i, i]];
                    if *d == 0.0 && diag == 0.0 {
                        1.0
                    } else {
                        d.max(diag)
                    }
                }
                Damping::Unscaled => 1.0,
            };
        }
    }

    /// Solve `(JᵀJ + λD) δ = −Jᵀr`.
    ///
    /// # Arguments
    ///
    /// * `j_t_j` - The normal matrix `JᵀJ`
    /// * `gradient` - The vector `Jᵀr`
    /// * `lambda` - The damping parameter
    /// * `scale` - Diagonal of `D`, see [`update_scale`](Self::update_scale)
    ///
    /// # Errors
    ///
    /// * `FitError::SingularMatrix` if the damped system cannot be solved at this `lambda`
    pub fn calculate_step(
        j_t_j: &Array2<f64>,
        gradient: &Array1<f64>,
        lambda: f64,
        scale: &Array1<f64>,
    ) -> Result<StepResult> {
        let mut augmented = j_t_j.clone();
        for (i, d) in scale.iter().enumerate() {
            augmented[[i, i]] += lambda * d;
        }

        let step = linalg::solve(&augmented, &-gradient)?;
        let predicted_reduction = Self::predicted_reduction(j_t_j, gradient, &step);

        Ok(StepResult {
            step,
            predicted_reduction,
            lambda,
        })
    }

    /// `‖r‖² − ‖r + Jδ‖² = −(2δᵀJᵀr + δᵀJᵀJδ)`.
    fn predicted_reduction(j_t_j: &Array2<f64>, gradient: &Array1<f64>, step: &Array1<f64>) -> f64 {
        -(2.0 * step.dot(gradient) + step.dot(&j_t_j.dot(step)))
    }
}
