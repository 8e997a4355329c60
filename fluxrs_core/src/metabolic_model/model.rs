//! This module provides the Model struct for representing an entire metabolic model
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use serde::Serialize;
use thiserror::Error;

use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::reaction::Reaction;
use crate::optimize::objective::ObjectiveSense;

/// Represents a Genome Scale Metabolic Model
///
/// A model is validated once when it is built and is read-only afterwards. Changing
/// bounds or the objective produces a new model (see [`Model::with_bounds`] and
/// [`Model::with_objective`]), so a single model can be shared between concurrent
/// analyses.
#[derive(Clone, Debug)]
pub struct Model {
    /// Map of reaction ids to Reactions
    reactions: IndexMap<String, Reaction>,
    /// Map of metabolite ids to Metabolites
    metabolites: IndexMap<String, Metabolite>,
    /// The active objective, derived from the reaction objective coefficients
    objective: ModelObjective,
    /// Stoichiometric matrix, metabolites by reactions, in the same order as
    /// `metabolites` and `reactions`
    stoichiometry: CscMatrix<f64>,
    /// Id associated with the Model
    id: Option<String>,
    /// Compartments in the model
    ///
    /// An IndexMap<String, String> of {short name: long name}
    compartments: Option<IndexMap<String, String>>,
}

/// The linear objective of a model
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelObjective {
    /// Map of reaction ids to objective function coefficients
    pub coefficients: IndexMap<String, f64>,
    /// Whether the objective is maximized or minimized
    pub sense: ObjectiveSense,
}

impl ModelObjective {
    /// Objective as a linear expression, e.g. `1.0*BIOMASS + 0.5*ATPM`
    pub fn expression(&self) -> String {
        if self.coefficients.is_empty() {
            return "0".to_string();
        }
        self.coefficients
            .iter()
            .map(|(id, coef)| format!("{:?}*{}", coef, id))
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl Display for ModelObjective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.sense, self.expression())
    }
}

impl Model {
    // region Construction
    /// Build a model from its metabolites and reactions
    ///
    /// The objective is assembled from the reactions' objective coefficients, and
    /// optimized in the direction given by `sense`.
    ///
    /// # Errors
    /// A [`ValidationError`] if ids collide, a reaction references a metabolite which
    /// is not part of `metabolites`, or a reaction has invalid bounds.
    ///
    /// # Examples
    /// ```rust
    /// use fluxrs_core::metabolic_model::metabolite::Metabolite;
    /// use fluxrs_core::metabolic_model::model::Model;
    /// use fluxrs_core::metabolic_model::reaction::ReactionBuilder;
    /// use fluxrs_core::optimize::objective::ObjectiveSense;
    /// let uptake = ReactionBuilder::default()
    ///     .id("R1")
    ///     .metabolite("A", 1.)
    ///     .bounds(0., 10.)
    ///     .build()
    ///     .unwrap();
    /// let drain = ReactionBuilder::default()
    ///     .id("R2")
    ///     .metabolite("A", -1.)
    ///     .bounds(0., 10.)
    ///     .objective_coefficient(1.)
    ///     .build()
    ///     .unwrap();
    /// let model = Model::build(
    ///     vec![Metabolite::new("A")],
    ///     vec![uptake, drain],
    ///     ObjectiveSense::Maximize,
    /// )
    /// .unwrap();
    /// assert_eq!(model.objective().expression(), "1.0*R2");
    /// ```
    pub fn build(
        metabolites: Vec<Metabolite>,
        reactions: Vec<Reaction>,
        sense: ObjectiveSense,
    ) -> Result<Model, ValidationError> {
        let mut metabolite_map: IndexMap<String, Metabolite> = IndexMap::new();
        for met in metabolites {
            if metabolite_map.contains_key(&met.id) {
                return Err(ValidationError::DuplicateMetabolite(met.id));
            }
            metabolite_map.insert(met.id.clone(), met);
        }
        let mut reaction_map: IndexMap<String, Reaction> = IndexMap::new();
        let mut coefficients: IndexMap<String, f64> = IndexMap::new();
        for rxn in reactions {
            if reaction_map.contains_key(&rxn.id) {
                return Err(ValidationError::DuplicateReaction(rxn.id));
            }
            Self::validate_reaction(&rxn, &metabolite_map)?;
            if rxn.objective_coefficient != 0. {
                coefficients.insert(rxn.id.clone(), rxn.objective_coefficient);
            }
            reaction_map.insert(rxn.id.clone(), rxn);
        }
        let stoichiometry = Self::stoichiometry_from(&metabolite_map, &reaction_map);
        debug!(
            "Built model with {} metabolites, {} reactions and {} stoichiometric entries",
            metabolite_map.len(),
            reaction_map.len(),
            stoichiometry.nnz()
        );
        Ok(Model {
            reactions: reaction_map,
            metabolites: metabolite_map,
            objective: ModelObjective {
                coefficients,
                sense,
            },
            stoichiometry,
            id: None,
            compartments: None,
        })
    }

    /// Attach an id to the model
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a compartment table ({short name: long name}) to the model
    pub fn with_compartments(mut self, compartments: IndexMap<String, String>) -> Self {
        self.compartments = Some(compartments);
        self
    }

    /// Create a new model with some reaction bounds replaced
    ///
    /// # Parameters
    /// - `overrides`: map of reaction id to `(lower_bound, upper_bound)`
    ///
    /// # Errors
    /// [`ValidationError::UnknownReaction`] if an override names a reaction which is not
    /// in the model, or [`ValidationError::InvalidBounds`] for invalid new bounds.
    pub fn with_bounds(&self, overrides: &IndexMap<String, (f64, f64)>) -> Result<Model, ValidationError> {
        let mut reactions: Vec<Reaction> = self.reactions.values().cloned().collect();
        for (id, (lower_bound, upper_bound)) in overrides {
            let index = self
                .reactions
                .get_index_of(id)
                .ok_or_else(|| ValidationError::UnknownReaction(id.clone()))?;
            reactions[index].lower_bound = *lower_bound;
            reactions[index].upper_bound = *upper_bound;
        }
        self.rebuild(reactions, self.objective.sense)
    }

    /// Create a new model with a different objective
    ///
    /// Reactions not present in `coefficients` get an objective coefficient of 0.
    pub fn with_objective(
        &self,
        coefficients: &IndexMap<String, f64>,
        sense: ObjectiveSense,
    ) -> Result<Model, ValidationError> {
        if let Some(id) = coefficients.keys().find(|id| !self.reactions.contains_key(*id)) {
            return Err(ValidationError::UnknownObjectiveReaction(id.clone()));
        }
        let reactions = self
            .reactions
            .values()
            .map(|rxn| {
                let mut rxn = rxn.clone();
                rxn.objective_coefficient = coefficients.get(&rxn.id).copied().unwrap_or(0.);
                rxn
            })
            .collect();
        self.rebuild(reactions, sense)
    }

    fn rebuild(&self, reactions: Vec<Reaction>, sense: ObjectiveSense) -> Result<Model, ValidationError> {
        let mut model = Model::build(self.metabolites.values().cloned().collect(), reactions, sense)?;
        model.id = self.id.clone();
        model.compartments = self.compartments.clone();
        Ok(model)
    }
    // endregion Construction

    // region Validation
    fn validate_reaction(
        reaction: &Reaction,
        metabolites: &IndexMap<String, Metabolite>,
    ) -> Result<(), ValidationError> {
        let (lower_bound, upper_bound) = reaction.bounds();
        if lower_bound.is_nan()
            || upper_bound.is_nan()
            || lower_bound > upper_bound
            || lower_bound == f64::INFINITY
            || upper_bound == f64::NEG_INFINITY
        {
            return Err(ValidationError::InvalidBounds {
                reaction: reaction.id.clone(),
                lower_bound,
                upper_bound,
            });
        }
        if !reaction.objective_coefficient.is_finite() {
            return Err(ValidationError::InvalidObjectiveCoefficient(reaction.id.clone()));
        }
        for (met, coef) in &reaction.metabolites {
            if !metabolites.contains_key(met) {
                return Err(ValidationError::UnknownMetabolite {
                    reaction: reaction.id.clone(),
                    metabolite: met.clone(),
                });
            }
            if !coef.is_finite() {
                return Err(ValidationError::InvalidCoefficient {
                    reaction: reaction.id.clone(),
                    metabolite: met.clone(),
                });
            }
        }
        Ok(())
    }
    // endregion Validation

    // region Accessors
    /// Reactions in the model, keyed by id
    pub fn reactions(&self) -> &IndexMap<String, Reaction> {
        &self.reactions
    }

    /// Metabolites in the model, keyed by id
    pub fn metabolites(&self) -> &IndexMap<String, Metabolite> {
        &self.metabolites
    }

    pub fn reaction(&self, id: &str) -> Option<&Reaction> {
        self.reactions.get(id)
    }

    pub fn metabolite(&self, id: &str) -> Option<&Metabolite> {
        self.metabolites.get(id)
    }

    /// Bounds of a reaction as `(lower_bound, upper_bound)`
    pub fn bounds(&self, reaction_id: &str) -> Option<(f64, f64)> {
        self.reactions.get(reaction_id).map(Reaction::bounds)
    }

    /// Stoichiometric coefficient of a metabolite in a reaction, 0 where the metabolite
    /// doesn't take part in the reaction (or either id is unknown)
    pub fn coefficient(&self, metabolite_id: &str, reaction_id: &str) -> f64 {
        self.reactions
            .get(reaction_id)
            .map(|rxn| rxn.coefficient(metabolite_id))
            .unwrap_or(0.)
    }

    /// The active objective
    pub fn objective(&self) -> &ModelObjective {
        &self.objective
    }

    /// The stoichiometric matrix S, with metabolites as rows and reactions as columns
    pub fn stoichiometric_matrix(&self) -> &CscMatrix<f64> {
        &self.stoichiometry
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn compartments(&self) -> Option<&IndexMap<String, String>> {
        self.compartments.as_ref()
    }

    /// Summary of the model's size and objective
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            id: self.id.clone(),
            reactions: self.reactions.len(),
            metabolites: self.metabolites.len(),
            boundary_reactions: self.reactions.values().filter(|r| r.is_boundary()).count(),
            objective: self.objective.expression(),
            sense: self.objective.sense,
        }
    }
    // endregion Accessors

    // region Flux Checks
    /// Net production of every metabolite (S·v) for a flux vector
    ///
    /// Reactions missing from `fluxes` are taken to carry no flux.
    pub fn mass_balance(&self, fluxes: &IndexMap<String, f64>) -> DVector<f64> {
        let v = DVector::from_iterator(
            self.reactions.len(),
            self.reactions
                .keys()
                .map(|id| fluxes.get(id).copied().unwrap_or(0.)),
        );
        let mut residual = DVector::zeros(self.metabolites.len());
        for (row, col, coef) in self.stoichiometry.triplet_iter() {
            residual[row] += coef * v[col];
        }
        residual
    }

    /// Metabolites which are not at steady state for the given flux vector, paired
    /// with their net production
    pub fn steady_state_violations(
        &self,
        fluxes: &IndexMap<String, f64>,
        tolerance: f64,
    ) -> Vec<(String, f64)> {
        let residual = self.mass_balance(fluxes);
        self.metabolites
            .keys()
            .zip(residual.iter())
            .filter(|(_, net)| net.abs() > tolerance)
            .map(|(id, net)| (id.clone(), *net))
            .collect()
    }

    /// Reactions whose flux lies outside of their bounds, paired with the offending flux
    pub fn bound_violations(
        &self,
        fluxes: &IndexMap<String, f64>,
        tolerance: f64,
    ) -> Vec<(String, f64)> {
        self.reactions
            .values()
            .filter_map(|rxn| {
                let flux = fluxes.get(&rxn.id).copied().unwrap_or(0.);
                if flux < rxn.lower_bound - tolerance || flux > rxn.upper_bound + tolerance {
                    Some((rxn.id.clone(), flux))
                } else {
                    None
                }
            })
            .collect()
    }
    // endregion Flux Checks

    fn stoichiometry_from(
        metabolites: &IndexMap<String, Metabolite>,
        reactions: &IndexMap<String, Reaction>,
    ) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(metabolites.len(), reactions.len());
        for (col, rxn) in reactions.values().enumerate() {
            for (met, coef) in &rxn.metabolites {
                // Membership was checked during validation
                if let Some(row) = metabolites.get_index_of(met) {
                    if *coef != 0. {
                        coo.push(row, col, *coef);
                    }
                }
            }
        }
        CscMatrix::from(&coo)
    }
}

/// Size and objective of a model, as reported before running an analysis
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelSummary {
    pub id: Option<String>,
    pub reactions: usize,
    pub metabolites: usize,
    pub boundary_reactions: usize,
    pub objective: String,
    pub sense: ObjectiveSense,
}

impl Display for ModelSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Model {}: {} reactions ({} boundary), {} metabolites, objective: {} {}",
            self.id.as_deref().unwrap_or("<unnamed>"),
            self.reactions,
            self.boundary_reactions,
            self.metabolites,
            self.sense,
            self.objective
        )
    }
}

/// Errors raised when a model is malformed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Metabolite id {0} is used more than once")]
    DuplicateMetabolite(String),
    #[error("Reaction id {0} is used more than once")]
    DuplicateReaction(String),
    #[error("Reaction {reaction} references metabolite {metabolite} which is not in the model")]
    UnknownMetabolite { reaction: String, metabolite: String },
    #[error("Reaction {reaction} has invalid bounds [{lower_bound}, {upper_bound}]")]
    InvalidBounds {
        reaction: String,
        lower_bound: f64,
        upper_bound: f64,
    },
    #[error("Reaction {reaction} has a non-finite coefficient for metabolite {metabolite}")]
    InvalidCoefficient { reaction: String, metabolite: String },
    #[error("Reaction {0} has a non-finite objective coefficient")]
    InvalidObjectiveCoefficient(String),
    #[error("Objective references reaction {0} which is not in the model")]
    UnknownObjectiveReaction(String),
    #[error("Reaction {0} is not in the model")]
    UnknownReaction(String),
}
