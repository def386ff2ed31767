//! Experiment registry: the named collection of filtering problems.
//!
//! One problem per {algorithm kind × dimension} pair, named `boot_5`,
//! `guided_5`, and so on. Insertion order is preserved purely for display and
//! debuggability; correctness never depends on it.

use crate::model::ModelSetup;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The two particle-filter variants under study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmKind {
    /// Proposal is the model's own transition density.
    Bootstrap,
    /// Proposal is informed by the observation.
    Guided,
}

impl AlgorithmKind {
    /// Short label used in problem names and the result table.
    pub fn label(self) -> &'static str {
        match self {
            AlgorithmKind::Bootstrap => "boot",
            AlgorithmKind::Guided => "guided",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which kind of driving sequence feeds a filter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrivingMode {
    PseudoRandom,
    QuasiRandom,
}

impl DrivingMode {
    /// The boolean flag form consumed by the batch-runner interface.
    pub fn is_qmc(self) -> bool {
        matches!(self, DrivingMode::QuasiRandom)
    }

    /// Suffix appended to the algorithm label in the combined category name.
    pub fn suffix(self) -> &'static str {
        match self {
            DrivingMode::PseudoRandom => " SMC",
            DrivingMode::QuasiRandom => " SQMC",
        }
    }
}

impl fmt::Display for DrivingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DrivingMode::PseudoRandom => "pseudo-random",
            DrivingMode::QuasiRandom => "quasi-random",
        })
    }
}

/// The category whose empirical mean and variance anchor the gain metric.
pub const REFERENCE_CATEGORY: (AlgorithmKind, DrivingMode) =
    (AlgorithmKind::Guided, DrivingMode::PseudoRandom);

/// The three benchmarked categories, in the order their cells are emitted.
pub const NON_REFERENCE_CATEGORIES: [(AlgorithmKind, DrivingMode); 3] = [
    (AlgorithmKind::Guided, DrivingMode::QuasiRandom),
    (AlgorithmKind::Bootstrap, DrivingMode::PseudoRandom),
    (AlgorithmKind::Bootstrap, DrivingMode::QuasiRandom),
];

/// One registered filtering problem: an algorithm kind applied to one
/// dimension's shared model/data setup.
#[derive(Debug, Clone)]
pub struct ProblemInstance<M> {
    pub kind: AlgorithmKind,
    pub setup: Arc<ModelSetup<M>>,
}

impl<M> ProblemInstance<M> {
    pub fn dim(&self) -> usize {
        self.setup.dim
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate problem name '{0}' in the experiment registry.")]
    DuplicateName(String),
}

/// Insertion-ordered mapping from problem name to [`ProblemInstance`].
#[derive(Debug)]
pub struct ProblemRegistry<M> {
    entries: Vec<(String, ProblemInstance<M>)>,
    by_name: AHashMap<String, usize>,
}

/// The canonical problem name for an (algorithm kind, dimension) pair.
pub fn problem_name(kind: AlgorithmKind, dim: usize) -> String {
    format!("{}_{dim}", kind.label())
}

impl<M> ProblemRegistry<M> {
    /// Registers both algorithm kinds against every setup, bootstrap first,
    /// in setup order. Yields exactly `2 × |setups|` entries.
    pub fn build(setups: &[Arc<ModelSetup<M>>]) -> Result<Self, RegistryError> {
        let mut registry = Self {
            entries: Vec::with_capacity(2 * setups.len()),
            by_name: AHashMap::with_capacity(2 * setups.len()),
        };
        for setup in setups {
            for kind in [AlgorithmKind::Bootstrap, AlgorithmKind::Guided] {
                registry.insert(
                    problem_name(kind, setup.dim),
                    ProblemInstance {
                        kind,
                        setup: Arc::clone(setup),
                    },
                )?;
            }
        }
        log::info!("Registered {} filtering problems", registry.len());
        Ok(registry)
    }

    fn insert(&mut self, name: String, problem: ProblemInstance<M>) -> Result<(), RegistryError> {
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.by_name.insert(name.clone(), self.entries.len());
        self.entries.push((name, problem));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ProblemInstance<M>> {
        self.by_name.get(name).map(|&i| &self.entries[i].1)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProblemInstance<M>)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
