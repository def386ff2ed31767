//! Batch execution of independent filter replications.
//!
//! The particle/quasi-particle filtering engines are external; the harness
//! only needs a collaborator that runs many independent, side-effect-free
//! replication tasks and hands back every result in one blocking call. That
//! capability is the [`BatchRunner`] trait. [`TaskPoolRunner`] is the stock
//! adapter: it enumerates the full (problem × mode × replication) grid and
//! executes a user-supplied task for each point, sequentially or on a bounded
//! rayon pool. No partial results, no streaming: `run_all` returns only when
//! every requested replication has completed.

use crate::registry::{DrivingMode, ProblemInstance, ProblemRegistry};
use itertools::iproduct;
use ndarray::Array1;
use rayon::prelude::*;
use thiserror::Error;

/// One replication's output, tagged with its originating grid point.
#[derive(Debug, Clone)]
pub struct ReplicationRecord {
    /// Name of the problem in the experiment registry.
    pub problem: String,
    pub mode: DrivingMode,
    /// Replication index, `0..M`.
    pub run: usize,
    /// Per-time-step scalar estimator (first coordinate of the filtering
    /// mean), aligned by time index across all replications of one problem.
    pub trajectory: Array1<f64>,
}

/// Everything a replication task needs to run one filter once.
#[derive(Debug)]
pub struct RunRequest<'a, M> {
    pub name: &'a str,
    pub problem: &'a ProblemInstance<M>,
    pub mode: DrivingMode,
    pub run: usize,
    pub n_particles: usize,
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Replication task failed for problem '{problem}' ({mode}, run {run}): {message}")]
    TaskFailed {
        problem: String,
        mode: DrivingMode,
        run: usize,
        message: String,
    },
    #[error("Could not build the replication worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Executes every (problem, mode, replication) triple exactly once and
/// returns the complete collection of records.
pub trait BatchRunner<M> {
    fn run_all(
        &self,
        registry: &ProblemRegistry<M>,
        modes: &[DrivingMode],
        n_particles: usize,
        n_runs: usize,
        workers: usize,
    ) -> Result<Vec<ReplicationRecord>, RunnerError>;
}

/// [`BatchRunner`] adapter around a side-effect-free replication task.
///
/// The task receives one [`RunRequest`] and returns the estimator trajectory
/// for that single filter run, or a message describing why the run failed.
pub struct TaskPoolRunner<F> {
    task: F,
}

impl<F> TaskPoolRunner<F> {
    pub fn new(task: F) -> Self {
        Self { task }
    }
}

impl<M, F> BatchRunner<M> for TaskPoolRunner<F>
where
    M: Send + Sync,
    F: Fn(&RunRequest<'_, M>) -> Result<Array1<f64>, String> + Sync,
{
    fn run_all(
        &self,
        registry: &ProblemRegistry<M>,
        modes: &[DrivingMode],
        n_particles: usize,
        n_runs: usize,
        workers: usize,
    ) -> Result<Vec<ReplicationRecord>, RunnerError> {
        let entries: Vec<(&str, &ProblemInstance<M>)> = registry.iter().collect();
        let requests: Vec<RunRequest<'_, M>> =
            iproduct!(entries.iter(), modes.iter().copied(), 0..n_runs)
                .map(|(&(name, problem), mode, run)| RunRequest {
                    name,
                    problem,
                    mode,
                    run,
                    n_particles,
                })
                .collect();
        log::info!(
            "Running {} replications over {} problems x {} modes (workers={workers})",
            requests.len(),
            entries.len(),
            modes.len()
        );

        let run_one = |request: &RunRequest<'_, M>| -> Result<ReplicationRecord, RunnerError> {
            let trajectory = (self.task)(request).map_err(|message| RunnerError::TaskFailed {
                problem: request.name.to_string(),
                mode: request.mode,
                run: request.run,
                message,
            })?;
            Ok(ReplicationRecord {
                problem: request.name.to_string(),
                mode: request.mode,
                run: request.run,
                trajectory,
            })
        };

        if workers == 0 {
            requests.iter().map(run_one).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
            pool.install(|| requests.par_iter().map(run_one).collect())
        }
    }
}
