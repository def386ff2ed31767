//! Sweep configuration and fail-fast validation.
//!
//! The driving program supplies these values as plain configuration; there is
//! no CLI or environment surface. Every count is checked up front so that an
//! invalid sweep fails before any simulation or batch run starts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Full configuration of one dimension sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Swept state dimensions, in the order results are reported.
    pub dims: Vec<usize>,
    /// Scalar coefficient of the linear-Gaussian transition matrix.
    pub alpha: f64,
    /// Time horizon `T`; trajectories are indexed `0..T`.
    pub horizon: usize,
    /// Particle / point-set size `N` handed to the batch runner.
    pub n_particles: usize,
    /// Independent replications `M` per (problem, driving-mode) pair.
    pub n_runs: usize,
    /// Worker-pool size for the batch runner; 0 runs replications sequentially.
    pub workers: usize,
}

impl Default for SweepConfig {
    /// The setup of the original dimension study: dims {5,10,15,20}, alpha 0.4,
    /// T = 50, N = 10^4, 100 replications, sequential execution.
    fn default() -> Self {
        Self {
            dims: vec![5, 10, 15, 20],
            alpha: 0.4,
            horizon: 50,
            n_particles: 10_000,
            n_runs: 100,
            workers: 0,
        }
    }
}

/// All the ways a sweep configuration can be rejected before any work starts.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The dimension sweep is empty; at least one state dimension is required.")]
    EmptyDims,
    #[error("State dimension must be positive, but the sweep contains {0}.")]
    InvalidDimension(usize),
    #[error("The dimension sweep contains duplicate entry {0}; each dimension must appear once.")]
    DuplicateDimension(usize),
    #[error("The time horizon must be positive, got {0}.")]
    NonPositiveHorizon(usize),
    #[error("The particle count N must be positive, got {0}.")]
    NonPositiveParticles(usize),
    #[error("The replication count M must be positive, got {0}.")]
    NonPositiveRuns(usize),
    #[error("The transition coefficient alpha must be finite.")]
    NonFiniteAlpha,
}

impl SweepConfig {
    /// Validates every field; called by the model factory before any model is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dims.is_empty() {
            return Err(ConfigError::EmptyDims);
        }
        for (i, &d) in self.dims.iter().enumerate() {
            if d == 0 {
                return Err(ConfigError::InvalidDimension(d));
            }
            if self.dims[..i].contains(&d) {
                return Err(ConfigError::DuplicateDimension(d));
            }
        }
        if self.horizon == 0 {
            return Err(ConfigError::NonPositiveHorizon(self.horizon));
        }
        if self.n_particles == 0 {
            return Err(ConfigError::NonPositiveParticles(self.n_particles));
        }
        if self.n_runs == 0 {
            return Err(ConfigError::NonPositiveRuns(self.n_runs));
        }
        if !self.alpha.is_finite() {
            return Err(ConfigError::NonFiniteAlpha);
        }
        Ok(())
    }
}
