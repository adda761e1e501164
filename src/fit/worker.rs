//! Background fits.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::debug;

use super::engine::FitEngine;
use super::result::FitResult;
use crate::control::CancellationToken;
use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::model::FitModel;
use crate::parameters::ParameterSet;

/// Starts fits on their own thread.
pub struct FitWorker;

impl FitWorker {
    /// Fit `model` to `dataset` on a new thread, starting from the model's guess.
    pub fn spawn<M>(engine: FitEngine, dataset: Arc<Dataset>, model: M) -> Result<FitHandle>
    where
        M: FitModel + 'static,
    {
        Self::spawn_with_parameters(engine, dataset, model, None)
    }

    /// Like [`spawn`](Self::spawn) with explicit starting values.
    pub fn spawn_with_parameters<M>(
        engine: FitEngine,
        dataset: Arc<Dataset>,
        model: M,
        initial: Option<ParameterSet>,
    ) -> Result<FitHandle>
    where
        M: FitModel + 'static,
    {
        let token = CancellationToken::new();
        let engine = engine.with_cancellation(token.clone());
        let thread = thread::Builder::new()
            .name(format!("fit-{}", dataset.name()))
            .spawn(move || {
                debug!("worker: fitting {} to {}", model.name(), dataset.name());
                engine.fit(&dataset, &model, initial.as_ref())
            })
            .map_err(|err| {
                FitError::ConfigurationError(format!("could not start the fit thread: {}", err))
            })?;
        Ok(FitHandle { token, thread })
    }
}

/// A running background fit.
pub struct FitHandle {
    token: CancellationToken,
    thread: JoinHandle<Result<FitResult>>,
}

impl FitHandle {
    /// Ask the fit to stop; it returns `FitError::Cancelled` at the next iteration boundary.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait for the fit to end.
    pub fn join(self) -> Result<FitResult> {
        self.thread
            .join()
            .map_err(|_| FitError::NumericalError("the fit thread panicked".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::config::FitConfig;
    use crate::models::ExponentialModel;

    fn decay() -> Arc<Dataset> {
        let x: Vec<f64> = (0..50).map(|i| i as f64 * 0.2).collect();
        let y: Vec<f64> = x.iter().map(|x| 4.0 * (-x / 1.5).exp() + 0.5).collect();
        Arc::new(Dataset::from_xy("decay", &x, &y).unwrap())
    }

    #[test]
    fn test_background_fit() {
        let handle = FitWorker::spawn(
            FitEngine::default(),
            decay(),
            ExponentialModel::decay(1).unwrap(),
        )
        .unwrap();
        let result = handle.join().unwrap();
        assert!(result.status.is_converged());
        assert!((result.value("t").unwrap() - 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_cancel_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let engine = FitEngine::new(FitConfig::default()).with_cancellation(token);
        let err = engine
            .fit(&decay(), &ExponentialModel::decay(1).unwrap(), None)
            .unwrap_err();
        assert!(matches!(err, FitError::Cancelled));
    }
}
