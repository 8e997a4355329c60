//! Module providing representation of optimization problem variables
use std::fmt::{Display, Formatter};

use derive_builder::Builder;

/// A continuous variable of an optimization problem
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct Variable {
    /// Used to identify the variable, unique within a problem
    #[builder(setter(into))]
    pub id: String,
    /// Lowest value the variable can take, may be `f64::NEG_INFINITY`
    #[builder(default = "f64::NEG_INFINITY")]
    pub lower_bound: f64,
    /// Highest value the variable can take, may be `f64::INFINITY`
    #[builder(default = "f64::INFINITY")]
    pub upper_bound: f64,
}

impl Variable {
    /// Create a new variable
    pub fn new<S: Into<String>>(id: S, lower_bound: f64, upper_bound: f64) -> Variable {
        Variable {
            id: id.into(),
            lower_bound,
            upper_bound,
        }
    }

    /// Whether the bounds pin the variable to a single value
    pub fn is_fixed(&self) -> bool {
        self.lower_bound == self.upper_bound
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <= {} <= {}", self.lower_bound, self.id, self.upper_bound)
    }
}
