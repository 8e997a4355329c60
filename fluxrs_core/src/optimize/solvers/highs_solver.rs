//! Solver interface for the HiGHS solver
use highs::{HighsModelStatus, RowProblem, Sense};
use log::debug;

use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{merged_terms, Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// HiGHS solver, best suited to large genome scale models
#[derive(Clone, Debug, Default)]
pub struct HighsSolver {
    /// Time limit in seconds, unlimited when None
    time_limit: Option<f64>,
}

impl HighsSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the wall clock time per solve, in seconds
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    /// Convert HiGHS status to our status
    fn convert_status(model_status: HighsModelStatus) -> OptimizationStatus {
        match model_status {
            HighsModelStatus::Optimal => OptimizationStatus::Optimal,
            HighsModelStatus::Infeasible => OptimizationStatus::Infeasible,
            HighsModelStatus::Unbounded => OptimizationStatus::Unbounded,
            // HiGHS couldn't tell which, so neither is reported
            HighsModelStatus::UnboundedOrInfeasible => OptimizationStatus::NumericalError,
            HighsModelStatus::ReachedTimeLimit | HighsModelStatus::ReachedIterationLimit => {
                OptimizationStatus::SolverHalted
            }
            _ => OptimizationStatus::NumericalError,
        }
    }
}

impl Solver for HighsSolver {
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let mut lp = RowProblem::default();
        let coefficients = problem.objective().coefficients(problem.num_variables());
        let columns = problem
            .variables()
            .values()
            .zip(coefficients)
            .map(|(var, coef)| lp.add_column(coef, var.lower_bound..=var.upper_bound))
            .collect::<Vec<_>>();

        for cons in problem.constraints().values() {
            let factors = merged_terms(cons.terms())
                .into_iter()
                .map(|(index, coef)| {
                    columns.get(index).map(|col| (*col, coef)).ok_or_else(|| {
                        SolverError::Backend(format!(
                            "constraint {} refers to missing variable {}",
                            cons.id(),
                            index
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let (lower, upper) = cons.range();
            lp.add_row(lower..=upper, &factors);
        }

        let sense = match problem.objective().sense() {
            ObjectiveSense::Maximize => Sense::Maximise,
            ObjectiveSense::Minimize => Sense::Minimise,
        };
        let mut model = lp.optimise(sense);
        model.set_option("output_flag", false);
        if let Some(time_limit) = self.time_limit {
            model.set_option("time_limit", time_limit);
        }

        debug!(
            "Solving problem with {} variables and {} constraints using HiGHS",
            problem.num_variables(),
            problem.num_constraints()
        );
        let solved = model.solve();
        let status = Self::convert_status(solved.status());
        Ok(if status.has_solution() {
            let values = solved.get_solution().columns().to_vec();
            ProblemSolution::solved(problem, status, values)
        } else {
            ProblemSolution::unsolved(status)
        })
    }

    fn name(&self) -> &str {
        "HiGHS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_small_lp() {
        let mut problem = Problem::new_maximization();
        problem.add_new_variable("x", 0., 3.).unwrap();
        problem.add_new_variable("y", 0., 3.).unwrap();
        problem
            .add_new_inequality_constraint_by_id("sum", &["x", "y"], &[1., 1.], f64::NEG_INFINITY, 4.)
            .unwrap();
        problem
            .add_new_equality_constraint_by_id("difference", &["x", "y"], &[1., -1.], 1.)
            .unwrap();
        problem.add_new_linear_objective_term_by_id("x", 1.).unwrap();
        problem.add_new_linear_objective_term_by_id("y", 2.).unwrap();
        let solution = HighsSolver::new().solve(&problem).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 5.5).abs() < 1e-7);
    }

    #[test]
    fn status_conversion() {
        assert_eq!(
            HighsSolver::convert_status(HighsModelStatus::UnboundedOrInfeasible),
            OptimizationStatus::NumericalError
        );
        assert_eq!(
            HighsSolver::convert_status(HighsModelStatus::Unbounded),
            OptimizationStatus::Unbounded
        );
        assert_eq!(
            HighsSolver::convert_status(HighsModelStatus::ReachedTimeLimit),
            OptimizationStatus::SolverHalted
        );
    }

    #[test]
    fn infeasible_problem() {
        let mut problem = Problem::new_maximization();
        problem.add_new_variable("x", 0., 1.).unwrap();
        problem
            .add_new_inequality_constraint_by_id("too_large", &["x"], &[1.], 2., f64::INFINITY)
            .unwrap();
        let solution = HighsSolver::new().solve(&problem).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Infeasible);
    }
}
