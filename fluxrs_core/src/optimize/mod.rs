//! Module for constructing and solving optimization problems

pub mod constraint;
pub mod objective;
pub mod problem;
pub mod solvers;
pub mod variable;

use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::Serialize;

use crate::optimize::problem::Problem;

/// Struct representing the solution to an optimization problem
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemSolution {
    /// The status of the optimization problem, representing if the optimization was
    /// completed successfully
    pub status: OptimizationStatus,
    /// Optimized value of the objective
    ///
    /// Some(f64) if the optimization was completed successfully, None otherwise
    pub objective_value: Option<f64>,
    /// Values of the variables at the optimum,
    ///
    /// Some(IndexMap), keyed by variable id, with values corresponding to variable
    /// values at optimum if the problem could be solved, None otherwise
    pub variable_values: Option<IndexMap<String, f64>>,
}

impl ProblemSolution {
    /// Solution for a problem which was solved, with `values` in variable order
    ///
    /// The objective value is evaluated from `values` rather than taken from the
    /// solver, so it is reported in the problem's own sense.
    pub fn solved(problem: &Problem, status: OptimizationStatus, values: Vec<f64>) -> Self {
        let objective_value = problem.objective().evaluate(&values);
        let variable_values = problem
            .variables()
            .keys()
            .cloned()
            .zip(values)
            .collect::<IndexMap<String, f64>>();
        ProblemSolution {
            status,
            objective_value: Some(objective_value),
            variable_values: Some(variable_values),
        }
    }

    /// Solution for a problem that could not be solved
    pub fn unsolved(status: OptimizationStatus) -> Self {
        ProblemSolution {
            status,
            objective_value: None,
            variable_values: None,
        }
    }
}

/// Status of an optimization problem
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    /// Problem has been optimized
    Optimal,
    /// An approximate solution has been found
    AlmostOptimal,
    /// Problem can't be optimized because objective value is not bounded
    Unbounded,
    /// Problem can't be solved because it is infeasible (conflicting constraints)
    Infeasible,
    /// A numerical error occurred during solving
    NumericalError,
    /// The solver hit the maximum allowed iterations, or max time, or made insufficient progress
    SolverHalted,
}

impl OptimizationStatus {
    /// Whether the problem was solved to optimality
    pub fn is_optimal(&self) -> bool {
        matches!(self, OptimizationStatus::Optimal)
    }

    /// Whether the solver produced variable values that can be used, i.e. it
    /// reached optimality or got within its own tolerances of it
    pub fn has_solution(&self) -> bool {
        matches!(
            self,
            OptimizationStatus::Optimal | OptimizationStatus::AlmostOptimal
        )
    }
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OptimizationStatus::Optimal => "optimal",
            OptimizationStatus::AlmostOptimal => "almost_optimal",
            OptimizationStatus::Unbounded => "unbounded",
            OptimizationStatus::Infeasible => "infeasible",
            OptimizationStatus::NumericalError => "numerical_error",
            OptimizationStatus::SolverHalted => "solver_halted",
        };
        write!(f, "{}", name)
    }
}
