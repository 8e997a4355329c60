//! Provides struct for representing an optimization problem's objective
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Represents the linear Objective of an optimization problem
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Terms included in the objective (See [`ObjectiveTerm`])
    terms: Vec<ObjectiveTerm>,
    /// Sense of the objective (maximize, or minimize), see [`ObjectiveSense`]
    sense: ObjectiveSense,
}

impl Objective {
    /// Create a new empty objective, with a given sense
    pub fn new(sense: ObjectiveSense) -> Self {
        Self {
            terms: Vec::new(),
            sense,
        }
    }

    /// Create a new empty maximization objective
    pub fn new_maximize() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    /// Create a new empty minimization objective
    pub fn new_minimize() -> Self {
        Self::new(ObjectiveSense::Minimize)
    }

    /// Objective optimizing a single variable with coefficient 1
    pub fn single(variable: usize, sense: ObjectiveSense) -> Self {
        Self {
            terms: vec![ObjectiveTerm::new(variable, 1.)],
            sense,
        }
    }

    pub fn sense(&self) -> ObjectiveSense {
        self.sense
    }

    pub fn terms(&self) -> &[ObjectiveTerm] {
        &self.terms
    }

    /// Change the sense of the objective
    pub fn set_sense(&mut self, sense: ObjectiveSense) {
        self.sense = sense;
    }

    /// Add a new term to the objective
    pub fn add_term(&mut self, term: ObjectiveTerm) {
        self.terms.push(term);
    }

    /// Add a new Linear term to the objective
    pub fn add_linear_term(&mut self, variable: usize, coefficient: f64) {
        self.terms.push(ObjectiveTerm::new(variable, coefficient));
    }

    /// Remove every term, leaving a constant zero objective
    pub fn remove_all_terms(&mut self) {
        self.terms.clear();
    }

    /// Dense coefficient vector of length `num_variables`, summing repeated terms
    pub fn coefficients(&self, num_variables: usize) -> Vec<f64> {
        let mut coefficients = vec![0.; num_variables];
        for term in &self.terms {
            if let Some(c) = coefficients.get_mut(term.variable) {
                *c += term.coefficient;
            }
        }
        coefficients
    }

    /// Value of the objective for `values` (indexed by variable)
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coefficient * values.get(t.variable).copied().unwrap_or(0.))
            .sum()
    }
}

/// Represents the sense of the objective, whether it should be maximized or minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveSense {
    /// The objective should be minimized
    Minimize,
    /// The objective should be maximized
    Maximize,
}

impl Display for ObjectiveSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveSense::Minimize => write!(f, "minimize"),
            ObjectiveSense::Maximize => write!(f, "maximize"),
        }
    }
}

/// A linear term in the objective
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveTerm {
    /// Index of the variable in the problem
    pub variable: usize,
    /// Coefficient for linear term
    pub coefficient: f64,
}

impl ObjectiveTerm {
    /// Create a new linear objective term
    pub fn new(variable: usize, coefficient: f64) -> Self {
        ObjectiveTerm {
            variable,
            coefficient,
        }
    }
}
