//! Model factory for the dimension sweep.
//!
//! The linear-Gaussian state-space models, their simulator, and the exact
//! Kalman filtering recursion live in an external modeling library; this
//! module only drives them through the narrow [`ModelEngine`] interface. The
//! one rule the factory enforces is matched data: each dimension gets exactly
//! one model instance and one simulated observation sequence, shared read-only
//! by every algorithm variant evaluated at that dimension, so that all
//! comparisons at a given dimension are on the same data.

use crate::config::{ConfigError, SweepConfig};
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// Narrow interface to the external modeling library.
///
/// Model construction, data simulation, and the exact filtering solution are
/// correct, tested black boxes behind this trait; the harness never inspects
/// how they work.
pub trait ModelEngine {
    /// Opaque handle to one constructed model instance.
    type Model;

    /// Builds the model of dimension `dim` with transition coefficient `alpha`.
    fn build(&self, dim: usize, alpha: f64) -> Self::Model;

    /// Simulates one observation sequence of length `horizon`.
    /// Shape: `[horizon, dim]`. Simulation is random; determinism is not required.
    fn simulate(&self, model: &Self::Model, horizon: usize) -> Array2<f64>;

    /// Runs the exact (Kalman) filter on `observations` and returns the
    /// ground-truth solution.
    fn exact_filter(&self, model: &Self::Model, observations: &Array2<f64>) -> ReferenceSolution;
}

/// Exact filtering output for one model/data pair.
///
/// Not consumed by the efficiency metric itself (which uses the empirical
/// baseline variance); retained as the ground-truth channel for validation
/// and debugging of the external engines.
#[derive(Debug, Clone)]
pub struct ReferenceSolution {
    /// Exact filtering means, shape `[horizon, dim]`; row `t` is E[X_t | Y_{0:t}].
    pub filt_means: Array2<f64>,
    /// Cumulative true log-marginal likelihood, length `horizon`.
    pub cum_loglik: Array1<f64>,
}

impl ReferenceSolution {
    /// The exact counterpart of the benchmarked estimator: the first
    /// coordinate of the filtering mean at each time step.
    pub fn first_mean_trajectory(&self) -> Array1<f64> {
        self.filt_means.column(0).to_owned()
    }
}

/// One dimension's model instance together with its simulated data and exact
/// solution. Shared via `Arc` by both algorithm variants at that dimension.
#[derive(Debug)]
pub struct ModelSetup<M> {
    pub dim: usize,
    pub model: M,
    /// Simulated observations, shape `[horizon, dim]`.
    pub observations: Array2<f64>,
    pub reference: ReferenceSolution,
}

/// Builds one [`ModelSetup`] per swept dimension.
///
/// Validates the configuration first so that an invalid sweep fails before any
/// model is constructed or any data simulated.
pub fn build_setups<E: ModelEngine>(
    engine: &E,
    config: &SweepConfig,
) -> Result<Vec<Arc<ModelSetup<E::Model>>>, ConfigError> {
    config.validate()?;
    let mut setups = Vec::with_capacity(config.dims.len());
    for &dim in &config.dims {
        log::debug!(
            "Building linear-Gaussian model: dim={dim}, alpha={}, T={}",
            config.alpha,
            config.horizon
        );
        let model = engine.build(dim, config.alpha);
        let observations = engine.simulate(&model, config.horizon);
        let reference = engine.exact_filter(&model, &observations);
        setups.push(Arc::new(ModelSetup {
            dim,
            model,
            observations,
            reference,
        }));
    }
    log::info!("Model factory produced {} setups", setups.len());
    Ok(setups)
}
