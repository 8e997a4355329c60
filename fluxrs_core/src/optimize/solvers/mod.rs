//! Interfaces to the linear programming backends
use cfg_if::cfg_if;
use indexmap::IndexMap;
use log::warn;
use thiserror::Error;

use crate::configuration::{Configuration, Solver as ConfiguredSolver};
use crate::optimize::constraint::ConstraintTerm;
use crate::optimize::problem::{Problem, ProblemError};
use crate::optimize::ProblemSolution;

pub mod clarabel_solver;
#[cfg(feature = "highs")]
pub mod highs_solver;
#[cfg(feature = "microlp")]
pub mod microlp_solver;

pub use clarabel_solver::ClarabelSolver;
#[cfg(feature = "highs")]
pub use highs_solver::HighsSolver;
#[cfg(feature = "microlp")]
pub use microlp_solver::MicroLpSolver;

/// Common interface for linear programming backends
///
/// A solver takes a complete [`Problem`] and reports how solving it went. Statuses
/// such as infeasible or unbounded are part of the returned [`ProblemSolution`],
/// an `Err` is reserved for problems the backend could not even attempt.
///
/// Implementations must not keep state between calls, so one solver can be
/// shared by several threads solving different problems.
pub trait Solver: Send + Sync {
    /// Solve the problem
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError>;

    /// Get the solver name for logging
    fn name(&self) -> &str;
}

impl<S: Solver + ?Sized> Solver for &S {
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        (**self).solve(problem)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<S: Solver + ?Sized> Solver for Box<S> {
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        (**self).solve(problem)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Create the solver selected in the global [`Configuration`]
///
/// Falls back to Clarabel when the configured backend was not compiled in.
pub fn default_solver() -> Box<dyn Solver> {
    match Configuration::current().solver {
        ConfiguredSolver::Clarabel => Box::new(ClarabelSolver::new()),
        ConfiguredSolver::MicroLp => microlp_or_fallback(),
        ConfiguredSolver::Highs => highs_or_fallback(),
    }
}

cfg_if! {
    if #[cfg(feature = "microlp")] {
        fn microlp_or_fallback() -> Box<dyn Solver> {
            Box::new(MicroLpSolver::new())
        }
    } else {
        fn microlp_or_fallback() -> Box<dyn Solver> {
            warn!("microlp solver requested but the microlp feature is disabled, using Clarabel");
            Box::new(ClarabelSolver::new())
        }
    }
}

cfg_if! {
    if #[cfg(feature = "highs")] {
        fn highs_or_fallback() -> Box<dyn Solver> {
            Box::new(HighsSolver::new())
        }
    } else {
        fn highs_or_fallback() -> Box<dyn Solver> {
            warn!("HiGHS solver requested but the highs feature is disabled, using Clarabel");
            Box::new(ClarabelSolver::new())
        }
    }
}

/// Sum the coefficients of terms which refer to the same variable, keeping
/// first appearance order
pub(crate) fn merged_terms(terms: &[ConstraintTerm]) -> Vec<(usize, f64)> {
    let mut merged: IndexMap<usize, f64> = IndexMap::new();
    for term in terms {
        *merged.entry(term.variable).or_insert(0.) += term.coefficient;
    }
    merged.into_iter().collect()
}

/// Errors raised by a solver backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The problem handed to the solver is malformed
    #[error("Invalid problem: {0}")]
    InvalidProblem(#[from] ProblemError),
    /// The backend failed in a way that can't be expressed as a status
    #[error("Solver backend failure: {0}")]
    Backend(String),
}
