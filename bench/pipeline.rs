//! The forward benchmark pipeline.
//!
//! Model factory → experiment registry → batch runner → efficiency aggregator
//! → result table, as one strict sequential pass. The pipeline itself is
//! single-threaded; the only parallel work happens inside the batch runner,
//! treated as an opaque blocking call.

use crate::config::{ConfigError, SweepConfig};
use crate::gain::{GainError, compute_gains};
use crate::model::{ModelEngine, build_setups};
use crate::registry::{DrivingMode, ProblemRegistry, RegistryError};
use crate::runner::{BatchRunner, RunnerError};
use crate::table::{TableError, build_table};
use polars::prelude::DataFrame;
use thiserror::Error;

/// Any failure of a pipeline stage. All variants are unrecoverable for the
/// run; nothing is retried.
#[derive(Error, Debug)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Gain(#[from] GainError),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Runs the full dimension sweep and returns the result table.
pub fn run_sweep<E, R>(
    engine: &E,
    runner: &R,
    config: &SweepConfig,
) -> Result<DataFrame, SweepError>
where
    E: ModelEngine,
    R: BatchRunner<E::Model>,
{
    log::info!(
        "Starting dimension sweep: dims={:?}, T={}, N={}, M={}",
        config.dims,
        config.horizon,
        config.n_particles,
        config.n_runs
    );
    let setups = build_setups(engine, config)?;
    let registry = ProblemRegistry::build(&setups)?;
    let records = runner.run_all(
        &registry,
        &[DrivingMode::PseudoRandom, DrivingMode::QuasiRandom],
        config.n_particles,
        config.n_runs,
        config.workers,
    )?;
    let cells = compute_gains(&registry, &records, config)?;
    let table = build_table(&cells)?;
    Ok(table)
}
