//! Solver interface for the pure Rust microlp simplex solver
use log::debug;
use microlp::{ComparisonOp, Error as MicroLpError, LinearExpr, OptimizationDirection};

use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{merged_terms, Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Dense simplex solver, exact on small models and free of native dependencies
#[derive(Clone, Debug, Default)]
pub struct MicroLpSolver;

impl MicroLpSolver {
    pub fn new() -> Self {
        MicroLpSolver
    }
}

impl Solver for MicroLpSolver {
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let direction = match problem.objective().sense() {
            ObjectiveSense::Maximize => OptimizationDirection::Maximize,
            ObjectiveSense::Minimize => OptimizationDirection::Minimize,
        };
        let mut lp = microlp::Problem::new(direction);
        let coefficients = problem.objective().coefficients(problem.num_variables());
        let columns = problem
            .variables()
            .values()
            .zip(coefficients)
            .map(|(var, coef)| lp.add_var(coef, (var.lower_bound, var.upper_bound)))
            .collect::<Vec<_>>();

        for cons in problem.constraints().values() {
            let mut expr = LinearExpr::empty();
            for (index, coef) in merged_terms(cons.terms()) {
                let column = columns.get(index).ok_or_else(|| {
                    SolverError::Backend(format!(
                        "constraint {} refers to missing variable {}",
                        cons.id(),
                        index
                    ))
                })?;
                expr.add(*column, coef);
            }
            let (lower, upper) = cons.range();
            if lower == upper {
                lp.add_constraint(expr, ComparisonOp::Eq, upper);
                continue;
            }
            if lower.is_finite() {
                lp.add_constraint(expr.clone(), ComparisonOp::Ge, lower);
            }
            if upper.is_finite() {
                lp.add_constraint(expr, ComparisonOp::Le, upper);
            }
        }

        debug!(
            "Solving problem with {} variables and {} constraints using microlp",
            problem.num_variables(),
            problem.num_constraints()
        );
        match lp.solve() {
            Ok(solution) => {
                let values = columns.iter().map(|c| solution[*c]).collect();
                Ok(ProblemSolution::solved(
                    problem,
                    OptimizationStatus::Optimal,
                    values,
                ))
            }
            Err(MicroLpError::Infeasible) => {
                Ok(ProblemSolution::unsolved(OptimizationStatus::Infeasible))
            }
            Err(MicroLpError::Unbounded) => {
                Ok(ProblemSolution::unsolved(OptimizationStatus::Unbounded))
            }
            Err(err) => {
                debug!("microlp failed: {}", err);
                Ok(ProblemSolution::unsolved(OptimizationStatus::NumericalError))
            }
        }
    }

    fn name(&self) -> &str {
        "microlp"
    }
}
