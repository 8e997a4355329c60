//! Constraint based analyses of a metabolic model
use indexmap::IndexMap;

pub mod classify;
pub mod fba;
pub mod fva;

pub use classify::{classify, ExchangeRule, FluxClassification};
pub use fba::{fba, FbaSolution, FluxBalanceProblem};
pub use fva::{fva, FluxRange, FvaError, FvaResult};

/// Flux through each reaction, keyed by reaction id in model order
pub type FluxVector = IndexMap<String, f64>;
