//! Nelder-Mead downhill simplex.
//!
//! A derivative-free minimiser of [`Problem::eval_cost`]. It needs only cost
//! values, so it tolerates models whose Jacobian is badly conditioned, at the
//! price of many more evaluations than Levenberg-Marquardt.

use std::time::Duration;

use log::{debug, trace};
use ndarray::Array1;

use crate::control::{CancellationToken, Deadline};
use crate::error::{FitError, Result};
use crate::lm::ConvergenceStatus;
use crate::problem::Problem;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Keeps the relative spread test meaningful when the minimum cost is zero.
const TINY: f64 = 1e-20;

/// Configuration of the simplex search.
#[derive(Debug, Clone)]
pub struct SimplexConfig {
    /// Relative tolerance for the cost spread and simplex size. Default: 1e-8
    pub tolerance: f64,

    /// Maximum number of iterations. Default: 1000
    pub max_iterations: usize,

    /// Relative perturbation of each parameter for the initial simplex. Default: 0.05
    pub initial_step: f64,

    /// Perturbation used for parameters that start at (or near) zero. Default: 0.00025
    pub zero_step: f64,

    /// Wall-clock budget. Default: none
    pub time_limit: Option<Duration>,

    /// Checked between iterations. Default: none
    pub cancel: Option<CancellationToken>,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 1000,
            initial_step: 0.05,
            zero_step: 0.00025,
            time_limit: None,
            cancel: None,
        }
    }
}

impl SimplexConfig {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Result of a simplex minimisation.
#[derive(Debug, Clone)]
pub struct SimplexResult {
    /// Best vertex found
    pub params: Array1<f64>,

    /// Cost at `params`
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of cost evaluations
    pub func_evals: usize,

    /// How the run terminated
    pub status: ConvergenceStatus,
}

/// The Nelder-Mead optimizer.
#[derive(Debug, Clone, Default)]
pub struct NelderMead {
    config: SimplexConfig,
}

struct Simplex<'a, P: ?Sized> {
    problem: &'a P,
    vertices: Vec<Array1<f64>>,
    costs: Vec<f64>,
    func_evals: usize,
}

impl<'a, P: Problem + ?Sized> Simplex<'a, P> {
    fn cost(&mut self, params: &Array1<f64>) -> Result<f64> {
        self.func_evals += 1;
        let cost = self.problem.eval_cost(params)?;
        Ok(if cost.is_finite() { cost } else { f64::INFINITY })
    }

    /// Order vertices from best to worst.
    fn sort(&mut self) {
        let mut order: Vec<usize> = (0..self.costs.len()).collect();
        order.sort_by(|&a, &b| self.costs[a].total_cmp(&self.costs[b]));
        self.vertices = order.iter().map(|&i| self.vertices[i].clone()).collect();
        self.costs = order.iter().map(|&i| self.costs[i]).collect();
    }

    /// Largest coordinate distance of any vertex from the best one.
    fn size(&self) -> f64 {
        let best = &self.vertices[0];
        self.vertices[1..]
            .iter()
            .flat_map(|v| v.iter().zip(best.iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max)
    }

    fn centroid(&self) -> Array1<f64> {
        let n = self.vertices.len() - 1;
        let mut c = Array1::zeros(self.vertices[0].len());
        for v in &self.vertices[..n] {
            c += v;
        }
        c / n as f64
    }

    fn replace_worst(&mut self, vertex: Array1<f64>, cost: f64) {
        let last = self.vertices.len() - 1;
        self.vertices[last] = vertex;
        self.costs[last] = cost;
    }

    fn shrink(&mut self) -> Result<()> {
        let best = self.vertices[0].clone();
        for i in 1..self.vertices.len() {
            let v = &best + &((&self.vertices[i] - &best) * SHRINK);
            self.costs[i] = self.cost(&v)?;
            self.vertices[i] = v;
        }
        Ok(())
    }

    /// One reflect/expand/contract/shrink step on a sorted simplex.
    fn step(&mut self) -> Result<()> {
        let n = self.vertices.len() - 1;
        let centroid = self.centroid();
        let worst = self.vertices[n].clone();
        let f_best = self.costs[0];
        let f_second = self.costs[n - 1];
        let f_worst = self.costs[n];

        let reflected = &centroid + &((&centroid - &worst) * REFLECTION);
        let f_reflected = self.cost(&reflected)?;

        if f_reflected < f_best {
            let expanded = &centroid + &((&reflected - &centroid) * EXPANSION);
            let f_expanded = self.cost(&expanded)?;
            if f_expanded < f_reflected {
                self.replace_worst(expanded, f_expanded);
            } else {
                self.replace_worst(reflected, f_reflected);
            }
        } else if f_reflected < f_second {
            self.replace_worst(reflected, f_reflected);
        } else if f_reflected < f_worst {
            let outside = &centroid + &((&reflected - &centroid) * CONTRACTION);
            let f_outside = self.cost(&outside)?;
            if f_outside <= f_reflected {
                self.replace_worst(outside, f_outside);
            } else {
                self.shrink()?;
            }
        } else {
            let inside = &centroid + &((&worst - &centroid) * CONTRACTION);
            let f_inside = self.cost(&inside)?;
            if f_inside < f_worst {
                self.replace_worst(inside, f_inside);
            } else {
                self.shrink()?;
            }
        }
        Ok(())
    }
}

impl NelderMead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SimplexConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimplexConfig {
        &self.config
    }

    fn initial_simplex(&self, start: &Array1<f64>) -> Vec<Array1<f64>> {
        let mut vertices = vec![start.clone()];
        for j in 0..start.len() {
            let mut v = start.clone();
            v[j] = if start[j].abs() > self.config.zero_step {
                start[j] * (1.0 + self.config.initial_step)
            } else {
                self.config.zero_step
            };
            vertices.push(v);
        }
        vertices
    }

    fn converged<P: Problem + ?Sized>(&self, simplex: &Simplex<'_, P>) -> bool {
        let tol = self.config.tolerance;
        let f_lo = simplex.costs[0];
        let f_hi = simplex.costs[simplex.costs.len() - 1];
        let flat = 2.0 * (f_hi - f_lo).abs() <= tol * (f_hi.abs() + f_lo.abs()) + TINY;
        let scale = simplex.vertices[0]
            .iter()
            .fold(1.0_f64, |m, v| m.max(v.abs()));
        flat && simplex.size() <= tol * scale
    }

    /// Minimise the sum of squared residuals of `problem` starting from `initial_params`.
    ///
    /// # Errors
    ///
    /// * `FitError::NumericalError` if the cost at the starting point is not finite
    /// * `FitError::Cancelled` if the configured token fires between iterations
    pub fn minimize<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<SimplexResult> {
        let n = problem.parameter_count();
        if initial_params.len() != n {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n,
                initial_params.len()
            )));
        }
        if n == 0 {
            return Err(FitError::NoParametersDefined);
        }

        let deadline = Deadline::from_budget(self.config.time_limit);
        let mut simplex = Simplex {
            problem,
            vertices: self.initial_simplex(&initial_params),
            costs: Vec::with_capacity(n + 1),
            func_evals: 0,
        };
        for i in 0..=n {
            let v = simplex.vertices[i].clone();
            let cost = simplex.cost(&v)?;
            if i == 0 && !cost.is_finite() {
                return Err(FitError::NumericalError(
                    "cost is not finite at the initial parameters".to_string(),
                ));
            }
            simplex.costs.push(cost);
        }
        debug!("Simplex: start with {} parameters, cost {:.6e}", n, simplex.costs[0]);

        let mut iterations = 0;
        let status = loop {
            simplex.sort();
            if self.converged(&simplex) {
                break ConvergenceStatus::FunctionValueConvergence;
            }
            if let Some(token) = &self.config.cancel {
                token.check()?;
            }
            if iterations >= self.config.max_iterations {
                break ConvergenceStatus::MaxIterationsReached;
            }
            if deadline.expired() {
                break ConvergenceStatus::TimeLimitReached;
            }
            simplex.step()?;
            iterations += 1;
            trace!("Simplex: iteration {} best cost {:.6e}", iterations, simplex.costs[0]);
        };

        debug!(
            "Simplex: {} after {} iterations, cost {:.6e}",
            status.description(),
            iterations,
            simplex.costs[0]
        );

        Ok(SimplexResult {
            params: simplex.vertices[0].clone(),
            cost: simplex.costs[0],
            iterations,
            func_evals: simplex.func_evals,
            status,
        })
    }
}
