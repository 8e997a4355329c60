//! This module provides a struct for representing reactions
use std::fmt::{Display, Formatter};

use derive_builder::Builder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;

/// Represents a reaction in the metabolic model
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Used to identify the reaction
    #[builder(setter(into))]
    pub id: String,
    /// Metabolite stoichiometry of the reaction, negative coefficients are consumed and
    /// positive coefficients are produced
    #[builder(default = "IndexMap::new()")]
    pub metabolites: IndexMap<String, f64>,
    /// Human-readable reaction name
    #[builder(setter(into, strip_option), default)]
    pub name: Option<String>,
    /// Lower flux bound
    #[builder(default = "Configuration::current().lower_bound")]
    pub lower_bound: f64,
    /// Upper flux bound
    #[builder(default = "Configuration::current().upper_bound")]
    pub upper_bound: f64,
    /// Coefficient of this reaction's flux in the model objective
    #[builder(default = "0.0")]
    pub objective_coefficient: f64,
    /// Reaction subsystem
    #[builder(setter(into, strip_option), default)]
    pub subsystem: Option<String>,
    /// Notes about the reaction
    #[builder(setter(into, strip_option), default)]
    pub notes: Option<String>,
    /// Reaction Annotations
    #[builder(setter(into, strip_option), default)]
    pub annotation: Option<String>,
}

impl ReactionBuilder {
    /// Add a single metabolite with its stoichiometric coefficient
    pub fn metabolite<S: Into<String>>(&mut self, id: S, coefficient: f64) -> &mut Self {
        self.metabolites
            .get_or_insert_with(IndexMap::new)
            .insert(id.into(), coefficient);
        self
    }

    /// Set both flux bounds at once
    pub fn bounds(&mut self, lower_bound: f64, upper_bound: f64) -> &mut Self {
        self.lower_bound = Some(lower_bound);
        self.upper_bound = Some(upper_bound);
        self
    }
}

impl Reaction {
    /// Flux bounds as `(lower_bound, upper_bound)`
    pub fn bounds(&self) -> (f64, f64) {
        (self.lower_bound, self.upper_bound)
    }

    /// A reaction is reversible when it can carry flux in both directions
    pub fn is_reversible(&self) -> bool {
        self.lower_bound < 0. && self.upper_bound > 0.
    }

    /// Stoichiometric coefficient of a metabolite, 0 if the metabolite is not involved
    pub fn coefficient(&self, metabolite_id: &str) -> f64 {
        self.metabolites.get(metabolite_id).copied().unwrap_or(0.)
    }

    /// Whether the reaction crosses the system boundary, i.e. it only touches a
    /// single metabolite (exchange, demand and sink reactions)
    pub fn is_boundary(&self) -> bool {
        self.metabolites.len() == 1
    }

    /// Human readable reaction equation, e.g. `2 a_c + b_c --> c_c`
    pub fn reaction_string(&self) -> String {
        let arrow = if self.is_reversible() {
            "<=>"
        } else if self.upper_bound <= 0. && self.lower_bound < 0. {
            "<--"
        } else {
            "-->"
        };
        let reactants = Self::side_to_string(self.metabolites.iter().filter(|(_, c)| **c < 0.));
        let products = Self::side_to_string(self.metabolites.iter().filter(|(_, c)| **c > 0.));
        format!("{} {} {}", reactants, arrow, products)
            .trim()
            .to_string()
    }

    fn side_to_string<'a, I: Iterator<Item = (&'a String, &'a f64)>>(terms: I) -> String {
        terms
            .map(|(id, coef)| {
                let coef = coef.abs();
                if (coef - 1.).abs() < f64::EPSILON {
                    id.to_string()
                } else {
                    format!("{} {}", coef, id)
                }
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl Display for Reaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.id, self.reaction_string())
    }
}
