//! Core rust implementation of fluxrs, a crate for constraint based analysis of metabolic networks.
//!
//! The functions at the crate root use the global [`configuration::Configuration`] for the
//! solver, tolerance and thread count. The functions in [`flux_analysis`] take these
//! explicitly.
pub mod configuration;
pub mod flux_analysis;
pub mod metabolic_model;
pub mod optimize;

use crate::configuration::Configuration;
use crate::flux_analysis::{ExchangeRule, FbaSolution, FluxClassification, FluxVector, FvaError, FvaResult};
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::model::{Model, ValidationError};
use crate::metabolic_model::reaction::Reaction;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::{default_solver, SolverError};

/// Build and validate a model from its metabolites and reactions
pub fn load_model(
    metabolites: Vec<Metabolite>,
    reactions: Vec<Reaction>,
    sense: ObjectiveSense,
) -> Result<Model, ValidationError> {
    Model::build(metabolites, reactions, sense)
}

/// Run flux balance analysis with the configured solver
pub fn run_fba(model: &Model) -> Result<FbaSolution, SolverError> {
    flux_analysis::fba(model, &default_solver())
}

/// Run flux variability analysis with the configured solver and thread count
pub fn run_fva(
    model: &Model,
    reaction_ids: &[&str],
    objective_fraction: f64,
) -> Result<FvaResult, FvaError> {
    let processes = Configuration::current().processes;
    flux_analysis::fva(model, &default_solver(), reaction_ids, objective_fraction, processes)
}

/// Classify fluxes into uptake, secretion and internal using the configured tolerance
pub fn classify_fluxes(fluxes: &FluxVector, rule: &ExchangeRule) -> FluxClassification {
    flux_analysis::classify(fluxes, rule, Configuration::current().tolerance)
}
