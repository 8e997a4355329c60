//! Provides struct representing an optimization problem
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use thiserror::Error;

use crate::optimize::constraint::{Constraint, ConstraintTerm};
use crate::optimize::objective::{Objective, ObjectiveSense};
use crate::optimize::variable::{Variable, VariableBuilder};

/// A linear optimization problem
///
/// Variables and constraints are plain owned data, so a problem can be cloned
/// and modified freely without affecting any other copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Objective to optimize
    objective: Objective,
    /// Variables of the optimization problem, their position is their index
    variables: IndexMap<String, Variable>,
    /// Constraints of the optimization problem
    constraints: IndexMap<String, Constraint>,
}

impl Problem {
    // region Creation Functions
    /// Create a new optimization problem
    pub fn new(objective_sense: ObjectiveSense) -> Self {
        Self {
            objective: Objective::new(objective_sense),
            variables: IndexMap::new(),
            constraints: IndexMap::new(),
        }
    }

    /// Create a new maximization problem
    pub fn new_maximization() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    /// Create a new minimization problem
    pub fn new_minimization() -> Self {
        Self::new(ObjectiveSense::Minimize)
    }
    // endregion Creation Functions

    // region Accessors
    pub fn variables(&self) -> &IndexMap<String, Variable> {
        &self.variables
    }

    pub fn constraints(&self) -> &IndexMap<String, Constraint> {
        &self.constraints
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Index of a variable, which is the position of its value in a solution
    pub fn variable_index(&self, id: &str) -> Option<usize> {
        self.variables.get_index_of(id)
    }
    // endregion Accessors

    // region Update Objective
    /// Update the objective sense of the problem
    pub fn update_objective_sense(&mut self, sense: ObjectiveSense) {
        self.objective.set_sense(sense);
    }

    /// Replace the objective entirely
    pub fn set_objective(&mut self, objective: Objective) -> Result<(), ProblemError> {
        if let Some(term) = objective
            .terms()
            .iter()
            .find(|t| t.variable >= self.variables.len())
        {
            return Err(ProblemError::NonExistentVariable(format!("index {}", term.variable)));
        }
        self.objective = objective;
        Ok(())
    }

    /// Add a new linear term to the objective using the variable id
    pub fn add_new_linear_objective_term_by_id(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), ProblemError> {
        let index = self.index_of(variable_id)?;
        self.objective.add_linear_term(index, coefficient);
        Ok(())
    }

    /// Remove all terms from the objective
    pub fn remove_all_objective_terms(&mut self) {
        self.objective.remove_all_terms();
    }
    // endregion Update Objective

    // region Adding Variables
    /// Add a variable to the optimization problem, returning its index
    pub fn add_variable(&mut self, variable: Variable) -> Result<usize, ProblemError> {
        self.validate_variable(&variable)?;
        let (index, _) = self.variables.insert_full(variable.id.clone(), variable);
        Ok(index)
    }

    /// Create a new variable and add it to the optimization problem
    pub fn add_new_variable(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<usize, ProblemError> {
        let new_var = VariableBuilder::default()
            .id(id)
            .lower_bound(lower_bound)
            .upper_bound(upper_bound)
            .build()
            .map_err(|err| ProblemError::InvalidVariable(err.to_string()))?;
        self.add_variable(new_var)
    }
    // endregion Adding Variables

    // region Adding Constraints
    /// Add a constraint to the problem
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), ProblemError> {
        self.validate_constraint(&constraint)?;
        self.constraints
            .insert(constraint.id().to_string(), constraint);
        Ok(())
    }

    /// Create a new equality constraint and add it to the model
    pub fn add_new_equality_constraint(
        &mut self,
        id: &str,
        terms: Vec<ConstraintTerm>,
        equals: f64,
    ) -> Result<(), ProblemError> {
        self.add_constraint(Constraint::new_equality(id, terms, equals))
    }

    /// Create a new equality constraint using variable ids rather than variable indices, and add it to the model
    pub fn add_new_equality_constraint_by_id(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), ProblemError> {
        let terms = self.zip_into_terms(variables, coefficients)?;
        self.add_new_equality_constraint(id, terms, equals)
    }

    /// Create a new inequality constraint and add it to the model
    pub fn add_new_inequality_constraint(
        &mut self,
        id: &str,
        terms: Vec<ConstraintTerm>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        self.add_constraint(Constraint::new_inequality(id, terms, lower_bound, upper_bound))
    }

    /// Create a new inequality constraint using variable ids rather than variable indices, and add it to the model
    pub fn add_new_inequality_constraint_by_id(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        let terms = self.zip_into_terms(variables, coefficients)?;
        self.add_new_inequality_constraint(id, terms, lower_bound, upper_bound)
    }

    /// Remove a constraint (by id) from the problem
    pub fn remove_constraint(&mut self, constraint_id: &str) -> Option<Constraint> {
        self.constraints.shift_remove(constraint_id)
    }
    // endregion Adding Constraints

    // region update variable bounds
    /// Update the bounds of a variable
    pub fn update_variable_bounds(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        if !valid_range(lower_bound, upper_bound) {
            return Err(ProblemError::InvalidVariableBounds(id.to_string()));
        }
        match self.variables.get_mut(id) {
            Some(var) => {
                var.lower_bound = lower_bound;
                var.upper_bound = upper_bound;
            }
            None => return Err(ProblemError::NonExistentVariable(id.to_string())),
        };
        Ok(())
    }
    // endregion update variable bounds

    // region Check Problem
    /// Check that `values` (indexed by variable) satisfy every bound and constraint
    /// to within `tolerance`
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let bounds_ok = self
            .variables
            .values()
            .zip(values)
            .all(|(var, v)| *v >= var.lower_bound - tolerance && *v <= var.upper_bound + tolerance);
        bounds_ok
            && self.constraints.values().all(|cons| {
                let (lower, upper) = cons.range();
                let lhs = cons.evaluate(values);
                lhs >= lower - tolerance && lhs <= upper + tolerance
            })
    }
    // endregion Check Problem

    // region Validation Functions
    /// Check that a variable to be added is valid to add to this problem
    fn validate_variable(&self, variable: &Variable) -> Result<(), ProblemError> {
        // Check if there is already a variable with this id
        if self.variables.contains_key(&variable.id) {
            return Err(ProblemError::VariableIdAlreadyExists(variable.id.clone()));
        };
        // Check if the variable bounds are valid
        let lb = variable.lower_bound;
        let ub = variable.upper_bound;
        if !valid_range(lb, ub) {
            return Err(ProblemError::InvalidVariableBounds(variable.id.clone()));
        }
        Ok(())
    }

    /// Check that a constraint to be added is valid to add to this Problem
    fn validate_constraint(&self, constraint: &Constraint) -> Result<(), ProblemError> {
        // Check that a constraint with the same id doesn't already exist
        if self.constraints.contains_key(constraint.id()) {
            return Err(ProblemError::ConstraintAlreadyExists(constraint.id().to_string()));
        }
        // Check that for inequality constraints the bounds make sense
        let (lower_bound, upper_bound) = constraint.range();
        if !valid_range(lower_bound, upper_bound) {
            return Err(ProblemError::InvalidConstraintBounds(constraint.id().to_string()));
        }
        // Check that the variables in this constraint are in the problem
        if constraint
            .terms()
            .iter()
            .any(|t| t.variable >= self.variables.len())
        {
            return Err(ProblemError::NonExistentVariablesInConstraint(
                constraint.id().to_string(),
            ));
        }
        Ok(())
    }
    // endregion Validation Functions

    fn index_of(&self, variable_id: &str) -> Result<usize, ProblemError> {
        self.variable_index(variable_id)
            .ok_or_else(|| ProblemError::NonExistentVariable(variable_id.to_string()))
    }

    /// Take a slice of variable ids, and a slice of coefficients and zip
    /// them together into a vec of ConstraintTerms
    fn zip_into_terms(
        &self,
        variables: &[&str],
        coefficients: &[f64],
    ) -> Result<Vec<ConstraintTerm>, ProblemError> {
        if variables.len() != coefficients.len() {
            return Err(ProblemError::MismatchedTerms);
        }
        variables
            .iter()
            .zip(coefficients)
            .map(|(id, coef)| Ok(ConstraintTerm::new(self.index_of(id)?, *coef)))
            .collect()
    }

    /// Convert a slice of terms into a String representation
    fn terms_to_string<I: Iterator<Item = (usize, f64)>>(&self, terms: I) -> String {
        let rendered = terms
            .map(|(index, coef)| match self.variables.get_index(index) {
                Some((id, _)) => format!("{}*{}", coef, id),
                None => format!("{}*<{}>", coef, index),
            })
            .collect::<Vec<_>>();
        if rendered.is_empty() {
            "0".to_string()
        } else {
            rendered.join(" + ")
        }
    }
}

/// Whether `lower <= x <= upper` is satisfiable by some finite x
fn valid_range(lower: f64, upper: f64) -> bool {
    !lower.is_nan()
        && !upper.is_nan()
        && lower <= upper
        && lower != f64::INFINITY
        && upper != f64::NEG_INFINITY
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let objective_terms = self
            .objective
            .terms()
            .iter()
            .map(|t| (t.variable, t.coefficient));
        writeln!(f, "{} {}", self.objective.sense(), self.terms_to_string(objective_terms))?;
        writeln!(f, "subject to")?;
        for cons in self.constraints.values() {
            let lhs = self.terms_to_string(cons.terms().iter().map(|t| (t.variable, t.coefficient)));
            match cons {
                Constraint::Equality { id, equals, .. } => {
                    writeln!(f, "  {}: {} = {}", id, lhs, equals)?
                }
                Constraint::Inequality {
                    id,
                    lower_bound,
                    upper_bound,
                    ..
                } => writeln!(f, "  {}: {} <= {} <= {}", id, lower_bound, lhs, upper_bound)?,
            }
        }
        writeln!(f, "bounds")?;
        for var in self.variables.values() {
            writeln!(f, "  {}", var)?;
        }
        Ok(())
    }
}

/// Errors associated with the Problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when trying to add a variable with the same id as an existing variable
    #[error("Tried to add variable {0} but a variable with the same id already exists")]
    VariableIdAlreadyExists(String),
    /// Error when trying to add variable with invalid bounds
    #[error("Tried to give variable {0} bounds with lower_bound>upper_bound")]
    InvalidVariableBounds(String),
    /// Error when a variable couldn't be built
    #[error("Unable to build variable: {0}")]
    InvalidVariable(String),
    /// Error when trying to add a constraint with the same id as an existing constraint
    #[error("Tried to add constraint {0} but a constraint with the same id already exists")]
    ConstraintAlreadyExists(String),
    /// Error when trying to add a constraint with invalid bounds
    #[error("Tried to add inequality constraint {0} with lower_bound > upper_bound")]
    InvalidConstraintBounds(String),
    /// Error when trying to add a constraint that contains variables not in the problem
    #[error("Tried to add constraint {0} with variables not in the problem")]
    NonExistentVariablesInConstraint(String),
    /// Error when a different number of variables and coefficients is given
    #[error("Number of variables and coefficients differ")]
    MismatchedTerms,
    /// Error when trying to perform an update or lookup on a variable that doesn't exist
    #[error("Tried to access variable {0} which doesn't exist")]
    NonExistentVariable(String),
}
