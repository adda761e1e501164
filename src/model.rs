//! Model trait and the residual adapter used by the fit engine.
//!
//! A [`FitModel`] describes `y = f(x; p)` for one independent variable. The
//! [`FitProblem`] adapter turns a model, a [`Dataset`] and a [`ParameterSet`]
//! into a [`Problem`] over the varying parameters in their internal
//! (unbounded) coordinates, with residuals `rᵢ = √wᵢ (f(xᵢ; p) − yᵢ)`.

use ndarray::{Array1, Array2};

use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::parameters::ParameterSet;
use crate::problem::Problem;
use crate::utils::finite_difference::step_size;

/// Parameters and covariance of a model solved without iteration.
#[derive(Debug, Clone)]
pub struct ClosedFormSolution {
    /// Values in `parameter_names()` order
    pub params: Vec<f64>,

    /// Unscaled covariance `(XᵀWX)⁻¹`
    pub covariance: Array2<f64>,
}

/// A trait representing a model that can be fit to a dataset.
///
/// Implementations must be cheap to evaluate repeatedly and free of side
/// effects: the engine calls [`FitModel::evaluate`] once per point per
/// residual evaluation, possibly from a Rayon worker.
pub trait FitModel: Send + Sync {
    /// Display name, e.g. `Polynomial (order 2)`.
    fn name(&self) -> String;

    /// Ordered parameter names.
    fn parameter_names(&self) -> Vec<String>;

    /// Evaluate the model at `x`. `params` follows `parameter_names()`.
    fn evaluate(&self, x: f64, params: &[f64]) -> f64;

    /// Check if this model provides an analytic Jacobian.
    fn has_custom_jacobian(&self) -> bool {
        false
    }

    /// Write `∂f/∂pⱼ` at `x` into `row`, one entry per parameter.
    fn jacobian(&self, _x: f64, _params: &[f64], _row: &mut [f64]) -> Result<()> {
        Err(FitError::InvalidModel(format!(
            "{} does not provide an analytic Jacobian",
            self.name()
        )))
    }

    /// Smallest dataset the model can be fit to.
    fn min_points(&self) -> usize {
        self.parameter_names().len()
    }

    /// Human-readable formula for reports.
    fn formula(&self) -> String;

    /// Initial parameter values estimated from the data.
    fn guess_parameters(&self, data: &Dataset) -> Result<Vec<f64>>;

    /// Direct solution for models linear in their parameters.
    fn closed_form(&self, _data: &Dataset) -> Option<Result<ClosedFormSolution>> {
        None
    }

    /// Number of auxiliary component curves (peaks).
    fn component_count(&self) -> usize {
        0
    }

    /// Value of component `index` at `x`, including any shared offset.
    fn evaluate_component(&self, _index: usize, _x: f64, _params: &[f64]) -> Option<f64> {
        None
    }

    /// Integrated area of component `index` above the offset.
    fn component_area(&self, _index: usize, _params: &[f64]) -> Option<f64> {
        None
    }
}

impl<M: FitModel + ?Sized> FitModel for Box<M> {
    fn name(&self) -> String {
        (**self).name()
    }
    fn parameter_names(&self) -> Vec<String> {
        (**self).parameter_names()
    }
    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        (**self).evaluate(x, params)
    }
    fn has_custom_jacobian(&self) -> bool {
        (**self).has_custom_jacobian()
    }
    fn jacobian(&self, x: f64, params: &[f64], row: &mut [f64]) -> Result<()> {
        (**self).jacobian(x, params, row)
    }
    fn min_points(&self) -> usize {
        (**self).min_points()
    }
    fn formula(&self) -> String {
        (**self).formula()
    }
    fn guess_parameters(&self, data: &Dataset) -> Result<Vec<f64>> {
        (**self).guess_parameters(data)
    }
    fn closed_form(&self, data: &Dataset) -> Option<Result<ClosedFormSolution>> {
        (**self).closed_form(data)
    }
    fn component_count(&self) -> usize {
        (**self).component_count()
    }
    fn evaluate_component(&self, index: usize, x: f64, params: &[f64]) -> Option<f64> {
        (**self).evaluate_component(index, x, params)
    }
    fn component_area(&self, index: usize, params: &[f64]) -> Option<f64> {
        (**self).component_area(index, params)
    }
}

/// An adapter that implements [`Problem`] for a model fitted to a dataset.
///
/// Problem parameters are the internal coordinates of the varying members
/// of `params`; fixed members keep their values.
pub struct FitProblem<'a, M: FitModel + ?Sized> {
    model: &'a M,
    data: &'a Dataset,
    params: &'a ParameterSet,
    sqrt_weights: Vec<f64>,
    varying: Vec<usize>,
}

impl<'a, M: FitModel + ?Sized> FitProblem<'a, M> {
    pub fn new(model: &'a M, data: &'a Dataset, params: &'a ParameterSet) -> Result<Self> {
        let names = model.parameter_names();
        if names != params.names() {
            return Err(FitError::ConfigurationError(format!(
                "parameters {:?} do not match the model's parameters {:?}",
                params.names(),
                names
            )));
        }
        Ok(Self {
            model,
            data,
            params,
            sqrt_weights: data.weights().iter().map(|w| w.sqrt()).collect(),
            varying: params.varying_indices(),
        })
    }

    pub fn model(&self) -> &M {
        self.model
    }

    pub fn dataset(&self) -> &Dataset {
        self.data
    }

    /// Internal starting point for the optimizer.
    pub fn initial_internal(&self) -> Result<Array1<f64>> {
        Ok(Array1::from(self.params.varying_internal_values()?))
    }

    /// Full external parameter vector for an internal point.
    pub fn external(&self, internal: &Array1<f64>) -> Vec<f64> {
        self.params.external_from_internal(&internal.to_vec())
    }

    /// Weighted residuals for a full external parameter vector.
    pub fn residuals_external(&self, external: &[f64]) -> Array1<f64> {
        self.data
            .x()
            .iter()
            .zip(self.data.y())
            .zip(&self.sqrt_weights)
            .map(|((&x, &y), &sw)| sw * (self.model.evaluate(x, external) - y))
            .collect()
    }

    /// `∂rᵢ/∂pⱼ` over the varying parameters in external coordinates.
    pub fn external_jacobian(&self, external: &[f64]) -> Result<Array2<f64>> {
        let n = self.data.len();
        let mut jac = Array2::zeros((n, self.varying.len()));
        if self.model.has_custom_jacobian() {
            let mut row = vec![0.0; external.len()];
            for (i, (&x, &sw)) in self.data.x().iter().zip(&self.sqrt_weights).enumerate() {
                self.model.jacobian(x, external, &mut row)?;
                for (k, &j) in self.varying.iter().enumerate() {
                    jac[[i, k]] = sw * row[j];
                }
            }
        } else {
            let base = self.residuals_external(external);
            let mut shifted = external.to_vec();
            for (k, &j) in self.varying.iter().enumerate() {
                let h = step_size(external[j], crate::utils::finite_difference::DEFAULT_EPSILON);
                shifted[j] = external[j] + h;
                let perturbed = self.residuals_external(&shifted);
                shifted[j] = external[j];
                for i in 0..n {
                    jac[[i, k]] = (perturbed[i] - base[i]) / h;
                }
            }
        }
        Ok(jac)
    }
}

impl<'a, M: FitModel + ?Sized> Problem for FitProblem<'a, M> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.residuals_external(&self.external(params)))
    }

    fn parameter_count(&self) -> usize {
        self.varying.len()
    }

    fn residual_count(&self) -> usize {
        self.data.len()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        if !self.model.has_custom_jacobian() {
            return crate::utils::finite_difference::jacobian(self, params, None);
        }
        let internal = params.to_vec();
        let external = self.params.external_from_internal(&internal);
        let chain = self.params.internal_derivatives(&internal);
        let mut jac = self.external_jacobian(&external)?;
        for (k, d) in chain.iter().enumerate() {
            jac.column_mut(k).mapv_inplace(|v| v * d);
        }
        Ok(jac)
    }

    fn has_custom_jacobian(&self) -> bool {
        self.model.has_custom_jacobian()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// y = a·x + b
    struct Line;

    impl FitModel for Line {
        fn name(&self) -> String {
            "Line".to_string()
        }

        fn parameter_names(&self) -> Vec<String> {
            vec!["a".to_string(), "b".to_string()]
        }

        fn evaluate(&self, x: f64, p: &[f64]) -> f64 {
            p[0] * x + p[1]
        }

        fn has_custom_jacobian(&self) -> bool {
            true
        }

        fn jacobian(&self, x: f64, _p: &[f64], row: &mut [f64]) -> Result<()> {
            row[0] = x;
            row[1] = 1.0;
            Ok(())
        }

        fn formula(&self) -> String {
            "a*x + b".to_string()
        }

        fn guess_parameters(&self, _data: &Dataset) -> Result<Vec<f64>> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_xyw("d", &[0.0, 1.0, 2.0], &[1.0, 3.0, 5.0], &[1.0, 4.0, 1.0]).unwrap()
    }

    #[test]
    fn test_weighted_residuals() {
        let data = dataset();
        let params = ParameterSet::from_values(&["a", "b"], &[2.0, 0.0]).unwrap();
        let problem = FitProblem::new(&Line, &data, &params).unwrap();
        let r = problem.eval(&problem.initial_internal().unwrap()).unwrap();
        // f - y = -1 everywhere, scaled by sqrt(w)
        assert_relative_eq!(r[0], -1.0);
        assert_relative_eq!(r[1], -2.0);
        assert_relative_eq!(r[2], -1.0);
    }

    #[test]
    fn test_fixed_parameter_is_not_optimised() {
        let data = dataset();
        let mut params = ParameterSet::from_values(&["a", "b"], &[2.0, 1.0]).unwrap();
        params.fix("b").unwrap();
        let problem = FitProblem::new(&Line, &data, &params).unwrap();
        assert_eq!(problem.parameter_count(), 1);
        let jac = problem.jacobian(&Array1::from(vec![2.0])).unwrap();
        assert_eq!(jac.dim(), (3, 1));
        assert_relative_eq!(jac[[1, 0]], 2.0);
    }

    #[test]
    fn test_bounded_jacobian_matches_finite_difference() {
        let data = dataset();
        let mut params = ParameterSet::new();
        params.add_param_with_bounds("a", 1.5, 0.0, 4.0).unwrap();
        params.add_param("b", 0.5).unwrap();
        let problem = FitProblem::new(&Line, &data, &params).unwrap();
        let p = problem.initial_internal().unwrap();
        let analytic = problem.jacobian(&p).unwrap();
        let numeric = crate::utils::finite_difference::jacobian_central(&problem, &p, None).unwrap();
        for (a, n) in analytic.iter().zip(numeric.iter()) {
            assert_relative_eq!(*a, *n, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_mismatched_parameters() {
        let data = dataset();
        let params = ParameterSet::from_values(&["b", "a"], &[0.0, 1.0]).unwrap();
        assert!(matches!(
            FitProblem::new(&Line, &data, &params),
            Err(FitError::ConfigurationError(_))
        ));
    }
}
