//! Provides struct for representing a constraint in an optimization problem

/// Represents a linear constraint in an optimization problem
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Represents an equality constraint, where `terms` = `equals`
    Equality {
        /// Used to identify the constraint, unique within a problem
        id: String,
        /// Linear terms which are added together, see [`ConstraintTerm`] for more
        terms: Vec<ConstraintTerm>,
        /// The right hand side of the equality constraint
        equals: f64,
    },
    /// Represents an inequality constraint, where `lower_bound` <= `terms` <= `upper_bound`
    ///
    /// Either bound may be infinite.
    Inequality {
        /// Used to identify the constraint, unique within a problem
        id: String,
        /// Linear terms which are added together, see [`ConstraintTerm`] for more
        terms: Vec<ConstraintTerm>,
        /// The lowest value the sum of the terms can take
        lower_bound: f64,
        /// The highest value the sum of the terms can take
        upper_bound: f64,
    },
}

impl Constraint {
    /// Create a new equality constraint
    ///
    /// # Parameters
    /// - `id`: Identifier of the constraint
    /// - `terms`: The terms of the constraint's left hand side
    /// - `equals`: The right hand side of the equality
    ///
    /// # Examples
    /// ```rust
    /// use fluxrs_core::optimize::constraint::{Constraint, ConstraintTerm};
    /// // Create a constraint representing 3*x0 + 2*x1 = 6
    /// let new_constraint = Constraint::new_equality(
    ///     "c",
    ///     vec![ConstraintTerm::new(0, 3.), ConstraintTerm::new(1, 2.)],
    ///     6.,
    /// );
    /// ```
    pub fn new_equality<S: Into<String>>(id: S, terms: Vec<ConstraintTerm>, equals: f64) -> Self {
        Constraint::Equality {
            id: id.into(),
            terms,
            equals,
        }
    }

    /// Create a new inequality constraint
    ///
    /// # Parameters
    /// - `id`: Identifier of the constraint
    /// - `terms`: The terms of the constraint's left hand side
    /// - `lower_bound`: The lowest value the constraint can take
    /// - `upper_bound`: The highest value the constraint can take
    pub fn new_inequality<S: Into<String>>(
        id: S,
        terms: Vec<ConstraintTerm>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Self {
        Constraint::Inequality {
            id: id.into(),
            terms,
            lower_bound,
            upper_bound,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Constraint::Equality { id, .. } | Constraint::Inequality { id, .. } => id,
        }
    }

    pub fn terms(&self) -> &[ConstraintTerm] {
        match self {
            Constraint::Equality { terms, .. } | Constraint::Inequality { terms, .. } => terms,
        }
    }

    /// Range `(lower, upper)` the sum of the terms is allowed to take
    pub fn range(&self) -> (f64, f64) {
        match self {
            Constraint::Equality { equals, .. } => (*equals, *equals),
            Constraint::Inequality {
                lower_bound,
                upper_bound,
                ..
            } => (*lower_bound, *upper_bound),
        }
    }

    /// Value of the constraint's left hand side for `values` (indexed by variable)
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms()
            .iter()
            .map(|t| t.coefficient * values.get(t.variable).copied().unwrap_or(0.))
            .sum()
    }
}

/// Represents a single term in a constraint, specifically
/// represents the multiplication of the variable at index `variable` by the `coefficient`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintTerm {
    /// Index of the variable in the problem
    pub variable: usize,
    /// The coefficient for the variable
    pub coefficient: f64,
}

impl ConstraintTerm {
    pub fn new(variable: usize, coefficient: f64) -> Self {
        ConstraintTerm {
            variable,
            coefficient,
        }
    }
}
