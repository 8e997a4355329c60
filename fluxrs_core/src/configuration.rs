//! Process wide defaults used when building models and running analyses
use std::sync::{LazyLock, RwLock};

use serde::{Deserialize, Serialize};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Lower bound given to reactions built without an explicit one
    pub lower_bound: f64,
    /// Upper bound given to reactions built without an explicit one
    pub upper_bound: f64,
    /// Absolute tolerance used when comparing fluxes against bounds and zero
    pub tolerance: f64,
    /// Solver backend used by the crate level analysis functions
    pub solver: Solver,
    /// Number of worker threads used for flux variability analysis,
    /// 0 uses one thread per logical CPU
    pub processes: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            lower_bound: -1000.,
            upper_bound: 1000.,
            tolerance: 1e-06,
            solver: Solver::Clarabel,
            processes: 1,
        }
    }
}

impl Configuration {
    /// Take a copy of the current global configuration
    ///
    /// A poisoned lock still holds a valid configuration, so it is read anyway.
    pub fn current() -> Configuration {
        match CONFIGURATION.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the global configuration
    pub fn set_global(configuration: Configuration) {
        match CONFIGURATION.write() {
            Ok(mut config) => *config = configuration,
            Err(poisoned) => *poisoned.into_inner() = configuration,
        }
    }
}

/// Enum used to specify the default solver to use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Solver {
    /// Use the Clarabel interior point solver
    Clarabel,
    /// Use the microlp simplex solver, requires the microlp feature to be enabled
    MicroLp,
    /// Use the HiGHS solver, requires the highs feature to be enabled
    Highs,
}
