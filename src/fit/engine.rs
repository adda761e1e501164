//! Fit orchestration.
//!
//! One invocation moves through `Configured → Extracting → Optimizing` and
//! ends in `Converged` (a [`FitResult`] is returned, whatever the optimizer
//! status) or `Aborted` (an error is returned).

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, info, warn};
use ndarray::{Array1, Array2};

use super::config::{Algorithm, CurveSampling, FitConfig};
use super::result::{FitResult, FitStatus, PeakComponent};
use super::statistics::{self, FitStatistics};
use crate::control::CancellationToken;
use crate::data::{extract, linspace, ColumnSource, CurveRef, Dataset, GeneratedCurve};
use crate::error::{try_buffer, FitError, Result};
use crate::lm::{ConvergenceStatus, Damping, LevenbergMarquardt, LmConfig};
use crate::model::{FitModel, FitProblem};
use crate::parameters::ParameterSet;
use crate::problem::Problem;
use crate::simplex::{NelderMead, SimplexConfig};
use crate::utils::finite_difference::step_size;
use crate::utils::linalg;

/// Lifecycle of one fit invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    Configured,
    Extracting,
    Optimizing,
    Converged,
    Aborted,
}

impl fmt::Display for FitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct Transitions {
    state: FitState,
}

impl Transitions {
    fn start() -> Self {
        debug!("fit: {}", FitState::Configured);
        Self {
            state: FitState::Configured,
        }
    }

    fn advance(&mut self, next: FitState) {
        debug!("fit: {} -> {}", self.state, next);
        self.state = next;
    }

    fn finish(mut self, outcome: Result<FitResult>) -> Result<FitResult> {
        match &outcome {
            Ok(_) => self.advance(FitState::Converged),
            Err(err) => {
                self.advance(FitState::Aborted);
                debug!("fit aborted: {}", err);
            }
        }
        outcome
    }
}

/// Where an iterative optimizer stopped.
struct Minimum {
    params: Array1<f64>,
    iterations: usize,
    func_evals: usize,
    status: ConvergenceStatus,
}

/// Everything measured at the final parameters.
struct Solution {
    values: Vec<f64>,
    residuals: Array1<f64>,
    covariance: Array2<f64>,
    varying: Vec<usize>,
    algorithm: Algorithm,
    iterations: usize,
    func_evals: usize,
    status: FitStatus,
}

/// Runs fits with one [`FitConfig`].
#[derive(Debug, Clone, Default)]
pub struct FitEngine {
    config: FitConfig,
    cancel: Option<CancellationToken>,
}

impl FitEngine {
    pub fn new(config: FitConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Observe `token` between optimizer iterations.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Extract `curve` from `source` with the configured options and fit `model` to it.
    ///
    /// # Arguments
    ///
    /// * `initial` - Starting values; the model's guess when `None`
    ///
    /// # Errors
    ///
    /// Extraction errors verbatim, then everything [`fit`](Self::fit) reports.
    pub fn fit_source<S, M>(
        &self,
        source: &S,
        curve: &CurveRef,
        model: &M,
        initial: Option<&ParameterSet>,
    ) -> Result<FitResult>
    where
        S: ColumnSource + ?Sized,
        M: FitModel + ?Sized,
    {
        let mut states = Transitions::start();
        let outcome = guarded(|| self.configure(model, initial)).and_then(|names| {
            states.advance(FitState::Extracting);
            let data = extract(source, curve, &self.config.extract)?;
            states.advance(FitState::Optimizing);
            guarded(|| self.optimize(&data, model, &names, initial))
        });
        states.finish(outcome)
    }

    /// Fit `model` to an already extracted dataset.
    ///
    /// # Errors
    ///
    /// * `FitError::NoParametersDefined` if the model has no parameters
    /// * `FitError::ConfigurationError` if `initial` does not match the model
    /// * `FitError::InsufficientPoints` if the dataset is too small for the model
    /// * `FitError::NumericalError` for non-finite starting residuals or a panicking model
    /// * `FitError::SingularJacobian` if the covariance cannot be formed at the solution
    /// * `FitError::Cancelled` if the cancellation token fires
    pub fn fit<M: FitModel + ?Sized>(
        &self,
        data: &Dataset,
        model: &M,
        initial: Option<&ParameterSet>,
    ) -> Result<FitResult> {
        let mut states = Transitions::start();
        let outcome = guarded(|| self.configure(model, initial)).and_then(|names| {
            states.advance(FitState::Extracting);
            states.advance(FitState::Optimizing);
            guarded(|| self.optimize(data, model, &names, initial))
        });
        states.finish(outcome)
    }

    fn configure<M: FitModel + ?Sized>(
        &self,
        model: &M,
        initial: Option<&ParameterSet>,
    ) -> Result<Vec<String>> {
        let names = model.parameter_names();
        if names.is_empty() {
            return Err(FitError::NoParametersDefined);
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(FitError::InvalidModel(format!(
                    "{} defines parameter '{}' twice",
                    model.name(),
                    name
                )));
            }
        }
        if let Some(params) = initial {
            if params.names() != names {
                return Err(FitError::ConfigurationError(format!(
                    "initial parameters {:?} do not match the parameters of {}: {:?}",
                    params.names(),
                    model.name(),
                    names
                )));
            }
            if params.varying_count() == 0 {
                return Err(FitError::ConfigurationError(
                    "every parameter is fixed".to_string(),
                ));
            }
        }
        let config = &self.config;
        if !(config.tolerance > 0.0 && config.tolerance.is_finite()) {
            return Err(FitError::ConfigurationError(format!(
                "tolerance must be positive, got {}",
                config.tolerance
            )));
        }
        if !(config.confidence_level > 0.0 && config.confidence_level < 100.0) {
            return Err(FitError::ConfigurationError(format!(
                "confidence level must lie strictly between 0 and 100 percent, got {}",
                config.confidence_level
            )));
        }
        if config.max_iterations == 0 {
            return Err(FitError::ConfigurationError(
                "the iteration limit must be at least 1".to_string(),
            ));
        }
        if let CurveSampling::Uniform(points) = config.sampling {
            if points < 2 {
                return Err(FitError::ConfigurationError(format!(
                    "a generated curve needs at least 2 points, got {}",
                    points
                )));
            }
        }
        debug!(
            "configured {} fit of {} with {} parameters",
            config.algorithm,
            model.name(),
            names.len()
        );
        Ok(names)
    }

    fn optimize<M: FitModel + ?Sized>(
        &self,
        data: &Dataset,
        model: &M,
        names: &[String],
        initial: Option<&ParameterSet>,
    ) -> Result<FitResult> {
        data.require_points(model.min_points().max(1))?;

        let constrained = initial.is_some_and(ParameterSet::is_constrained);
        let linear = self.config.algorithm == Algorithm::LinearLeastSquares;
        if linear && constrained {
            return Err(FitError::ConfigurationError(
                "linear least squares cannot hold parameters fixed or bounded".to_string(),
            ));
        }
        if linear || (self.config.prefer_closed_form && !constrained) {
            match model.closed_form(data) {
                Some(solution) => {
                    let solution = solution?;
                    debug!("{}: solved in closed form", model.name());
                    let params = ParameterSet::from_values(names, &solution.params)?;
                    let problem = FitProblem::new(model, data, &params)?;
                    let residuals = problem.residuals_external(&solution.params);
                    let solved = Solution {
                        values: solution.params,
                        residuals,
                        covariance: solution.covariance,
                        varying: (0..names.len()).collect(),
                        algorithm: Algorithm::LinearLeastSquares,
                        iterations: 1,
                        func_evals: 1,
                        status: FitStatus::Converged,
                    };
                    return self.finish(data, model, params, solved);
                }
                None if linear => {
                    return Err(FitError::InvalidModel(format!(
                        "{} has no closed-form solution",
                        model.name()
                    )));
                }
                None => {}
            }
        }

        let mut params = match initial {
            Some(params) => params.clone(),
            None => ParameterSet::from_values(names, &model.guess_parameters(data)?)?,
        };
        data.require_points(params.varying_count() + 1)?;

        let solved = {
            let problem = FitProblem::new(model, data, &params)?;
            let start = problem.initial_internal()?;
            let residuals = problem.eval(&start)?;
            if let Some(i) = residuals.iter().position(|r| !r.is_finite()) {
                return Err(FitError::NumericalError(format!(
                    "the model is not finite at x = {} for the starting parameters",
                    data.x()[i]
                )));
            }

            let minimum = self.minimize(&problem, start)?;

            let values = problem.external(&minimum.params);
            let residuals = problem.residuals_external(&values);
            let jacobian = problem.external_jacobian(&values)?;
            Solution {
                covariance: linalg::covariance(&jacobian)?,
                values,
                residuals,
                varying: params.varying_indices(),
                algorithm: self.config.algorithm,
                iterations: minimum.iterations,
                func_evals: minimum.func_evals,
                status: FitStatus::from(&minimum.status),
            }
        };
        params.set_values(&solved.values)?;
        self.finish(data, model, params, solved)
    }

    fn minimize<P: Problem + Sync + ?Sized>(&self, problem: &P, start: Array1<f64>) -> Result<Minimum> {
        let config = &self.config;
        match config.algorithm {
            Algorithm::Simplex => {
                let mut simplex = SimplexConfig::default()
                    .with_tolerance(config.tolerance)
                    .with_max_iterations(config.max_iterations);
                simplex.time_limit = config.time_limit;
                simplex.cancel = self.cancel.clone();
                let result = NelderMead::with_config(simplex).minimize(problem, start)?;
                Ok(Minimum {
                    params: result.params,
                    iterations: result.iterations,
                    func_evals: result.func_evals,
                    status: result.status,
                })
            }
            algorithm => {
                let damping = match algorithm {
                    Algorithm::LevenbergMarquardt => Damping::Unscaled,
                    _ => Damping::Scaled,
                };
                let mut lm = LmConfig::default()
                    .with_max_iterations(config.max_iterations)
                    .with_xtol(config.tolerance)
                    .with_ftol(config.tolerance * config.tolerance)
                    .with_gtol(1e-10)
                    .with_damping(damping)
                    .with_calc_covariance(false);
                lm.time_limit = config.time_limit;
                lm.cancel = self.cancel.clone();
                let result = LevenbergMarquardt::with_config(lm).minimize(problem, start)?;
                Ok(Minimum {
                    params: result.params,
                    iterations: result.iterations,
                    func_evals: result.func_evals,
                    status: result.status,
                })
            }
        }
    }

    fn finish<M: FitModel + ?Sized>(
        &self,
        data: &Dataset,
        model: &M,
        mut params: ParameterSet,
        solved: Solution,
    ) -> Result<FitResult> {
        let residuals = solved.residuals.to_vec();
        let fit_stats =
            FitStatistics::compute(&residuals, data.y(), data.weights(), solved.varying.len());
        let scale = if self.config.scale_errors {
            fit_stats.reduced_chi_square.sqrt()
        } else {
            1.0
        };

        let total = params.len();
        let mut errors = vec![0.0; total];
        for (&j, se) in solved
            .varying
            .iter()
            .zip(statistics::standard_errors(&solved.covariance))
        {
            errors[j] = se * scale;
        }
        params.set_stderrs(&errors);
        let parameter_tests = statistics::parameter_tests(
            &solved.values,
            &errors,
            fit_stats.dof,
            self.config.confidence_level,
        );
        let covariance = statistics::embed_covariance(&solved.covariance, &solved.varying, total);

        let x_range = data.x_range().unwrap_or((0.0, 0.0));
        let grid = match self.config.sampling {
            CurveSampling::None => None,
            CurveSampling::DataPoints => Some(data.x().to_vec()),
            CurveSampling::Uniform(points) => Some(linspace(x_range.0, x_range.1, points)?),
        };
        let values = &solved.values;
        let curve = grid
            .as_deref()
            .map(|x| {
                sample_curve(format!("{} fit of {}", model.name(), data.name()), x, |xi| {
                    model.evaluate(xi, values)
                })
            })
            .transpose()?;

        let mut components = Vec::with_capacity(model.component_count());
        for index in 0..model.component_count() {
            let component_curve = match grid.as_deref() {
                Some(x) => Some(sample_curve(
                    format!("{} peak {}", data.name(), index + 1),
                    x,
                    |xi| model.evaluate_component(index, xi, values).unwrap_or(f64::NAN),
                )?),
                None => None,
            };
            let area = model.component_area(index, values).unwrap_or(f64::NAN);
            let area_error =
                propagate_area_error(model, index, values, &solved.varying, &solved.covariance)
                    * scale;
            components.push(PeakComponent {
                index,
                curve: component_curve,
                area,
                area_error,
            });
        }

        let result = FitResult {
            model_name: model.name(),
            dataset_name: data.name().to_string(),
            formula: model.formula(),
            algorithm: solved.algorithm,
            tolerance: self.config.tolerance,
            weighting: self.config.extract.weighting.clone(),
            x_range,
            points: data.len(),
            iterations: solved.iterations,
            func_evals: solved.func_evals,
            status: solved.status,
            parameters: params,
            errors,
            parameter_tests,
            confidence_level: self.config.confidence_level,
            covariance,
            statistics: fit_stats,
            curve,
            components,
        };

        if result.status.is_converged() {
            info!(
                "{} fit of {}: converged after {} iterations, reduced chi^2 = {:.6e}",
                result.model_name,
                result.dataset_name,
                result.iterations,
                result.statistics.reduced_chi_square
            );
        } else {
            warn!(
                "{} fit of {} did not converge: {}",
                result.model_name, result.dataset_name, result.status
            );
        }
        Ok(result)
    }
}

fn sample_curve<F>(name: String, x: &[f64], f: F) -> Result<GeneratedCurve>
where
    F: Fn(f64) -> f64,
{
    let mut y = try_buffer(x.len())?;
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = f(xi);
    }
    GeneratedCurve::new(name, x.to_vec(), y)
}

/// `σ_area = √(gᵀ C g)` with `g` the central-difference gradient of the area
/// over the varying parameters.
fn propagate_area_error<M: FitModel + ?Sized>(
    model: &M,
    index: usize,
    values: &[f64],
    varying: &[usize],
    covariance: &Array2<f64>,
) -> f64 {
    let mut shifted = values.to_vec();
    let mut gradient = Vec::with_capacity(varying.len());
    for &j in varying {
        let h = step_size(values[j], 1e-6);
        shifted[j] = values[j] + h;
        let up = model.component_area(index, &shifted);
        shifted[j] = values[j] - h;
        let down = model.component_area(index, &shifted);
        shifted[j] = values[j];
        match (up, down) {
            (Some(up), Some(down)) => gradient.push((up - down) / (2.0 * h)),
            _ => return f64::NAN,
        }
    }
    let g = Array1::from(gradient);
    g.dot(&covariance.dot(&g)).max(0.0).sqrt()
}

/// Run `f`, reporting a panic in model code as `FitError::NumericalError`.
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(FitError::NumericalError(format!(
            "model evaluation panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PolynomialModel, PluginModel, PluginUnit, SYMBOL_NAME, SYMBOL_PARAMETERS};
    use approx::assert_relative_eq;

    fn line_data() -> Dataset {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|x| 1.5 + 2.0 * x).collect();
        Dataset::from_xy("line", &x, &y).unwrap()
    }

    #[test]
    fn test_closed_form_linear() {
        let engine = FitEngine::default();
        let result = engine.fit(&line_data(), &PolynomialModel::linear(), None).unwrap();
        assert_eq!(result.algorithm, Algorithm::LinearLeastSquares);
        assert_eq!(result.iterations, 1);
        assert_relative_eq!(result.value("a0").unwrap(), 1.5, epsilon = 1e-10);
        assert_relative_eq!(result.value("a1").unwrap(), 2.0, epsilon = 1e-10);
        assert_relative_eq!(result.r_squared(), 1.0, epsilon = 1e-12);
        assert_eq!(result.curve.as_ref().unwrap().len(), 100);
    }

    #[test]
    fn test_iterative_linear_matches_closed_form() {
        let engine = FitEngine::new(FitConfig::new().with_prefer_closed_form(false));
        let result = engine.fit(&line_data(), &PolynomialModel::linear(), None).unwrap();
        assert_eq!(result.algorithm, Algorithm::ScaledLevenbergMarquardt);
        assert!(result.status.is_converged());
        assert_relative_eq!(result.value("a1").unwrap(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fixed_parameter_has_zero_error() {
        let mut params = ParameterSet::from_values(&["a0", "a1"], &[1.5, 1.0]).unwrap();
        params.fix("a0").unwrap();
        let engine = FitEngine::new(FitConfig::new().with_sampling(CurveSampling::DataPoints));
        let result = engine
            .fit(&line_data(), &PolynomialModel::linear(), Some(&params))
            .unwrap();
        assert_eq!(result.value("a0"), Some(1.5));
        assert_eq!(result.error("a0"), Some(0.0));
        assert_relative_eq!(result.value("a1").unwrap(), 2.0, epsilon = 1e-6);
        assert_eq!(result.curve.unwrap().x, line_data().x().to_vec());
    }

    #[test]
    fn test_insufficient_points() {
        let data = Dataset::from_xy("one", &[1.0], &[2.0]).unwrap();
        let err = FitEngine::default()
            .fit(&data, &PolynomialModel::linear(), None)
            .unwrap_err();
        assert!(matches!(err, FitError::InsufficientPoints { required: 2, got: 1 }));
    }

    #[test]
    fn test_mismatched_initial_parameters() {
        let params = ParameterSet::from_values(&["b", "m"], &[0.0, 1.0]).unwrap();
        let err = FitEngine::default()
            .fit(&line_data(), &PolynomialModel::linear(), Some(&params))
            .unwrap_err();
        assert!(matches!(err, FitError::ConfigurationError(_)));
    }

    #[test]
    fn test_panicking_model_is_a_numerical_error() {
        let unit = PluginUnit::new()
            .with_text(SYMBOL_NAME, "Fragile")
            .with_text(SYMBOL_PARAMETERS, "a")
            .with_eval(|x, p| {
                if p[0] != 1.0 {
                    panic!("parameter moved");
                }
                x
            });
        let model = PluginModel::from_unit(&unit).unwrap();
        let err = FitEngine::default().fit(&line_data(), &model, None).unwrap_err();
        match err {
            FitError::NumericalError(message) => assert!(message.contains("parameter moved")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_model_panicking_on_every_call() {
        let unit = PluginUnit::new()
            .with_text(SYMBOL_NAME, "Boom")
            .with_text(SYMBOL_PARAMETERS, "a")
            .with_eval(|_, _| panic!("plugin crashed"));
        let model = PluginModel::from_unit(&unit).unwrap();
        for algorithm in [Algorithm::ScaledLevenbergMarquardt, Algorithm::Simplex] {
            let engine = FitEngine::new(FitConfig::new().with_algorithm(algorithm));
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                engine.fit(&line_data(), &model, None)
            }));
            match outcome {
                Ok(Err(FitError::NumericalError(message))) => {
                    assert!(message.contains("plugin crashed"))
                }
                Ok(other) => panic!("unexpected {:?}", other),
                Err(_) => panic!("the panic reached the caller"),
            }
        }
    }

    #[test]
    fn test_non_finite_start() {
        let unit = PluginUnit::new()
            .with_text(SYMBOL_NAME, "Pole")
            .with_text(SYMBOL_PARAMETERS, "a")
            .with_eval(|x, p| p[0] / x);
        let model = PluginModel::from_unit(&unit).unwrap();
        let data = Dataset::from_xy("d", &[0.0, 1.0, 2.0], &[1.0, 1.0, 1.0]).unwrap();
        let err = FitEngine::default().fit(&data, &model, None).unwrap_err();
        assert!(matches!(err, FitError::NumericalError(_)));
    }
}
