//! Flux balance analysis
use log::{debug, info, warn};
use serde::Serialize;

use crate::flux_analysis::FluxVector;
use crate::metabolic_model::model::Model;
use crate::optimize::constraint::ConstraintTerm;
use crate::optimize::problem::{Problem, ProblemError};
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// The linear program behind flux balance analysis
///
/// One variable per reaction (named after the reaction and bounded by its flux
/// bounds), one steady state constraint `S[i, :] . v = 0` per metabolite (named
/// `mass_balance_{metabolite}`), and the model objective.
#[derive(Clone, Debug, PartialEq)]
pub struct FluxBalanceProblem {
    problem: Problem,
}

impl FluxBalanceProblem {
    pub fn new(model: &Model) -> Result<Self, ProblemError> {
        let mut problem = Problem::new(model.objective().sense);
        for rxn in model.reactions().values() {
            problem.add_new_variable(&rxn.id, rxn.lower_bound, rxn.upper_bound)?;
        }

        // Walk the columns of S once, collecting each metabolite's row
        let stoichiometry = model.stoichiometric_matrix();
        let mut rows: Vec<Vec<ConstraintTerm>> = vec![Vec::new(); stoichiometry.nrows()];
        for (column, rxn_column) in stoichiometry.col_iter().enumerate() {
            for (row, coef) in rxn_column.row_indices().iter().zip(rxn_column.values()) {
                rows[*row].push(ConstraintTerm::new(column, *coef));
            }
        }
        for (met_id, terms) in model.metabolites().keys().zip(rows) {
            problem.add_new_equality_constraint(&format!("mass_balance_{}", met_id), terms, 0.)?;
        }

        for (rxn_id, coef) in &model.objective().coefficients {
            problem.add_new_linear_objective_term_by_id(rxn_id, *coef)?;
        }
        Ok(FluxBalanceProblem { problem })
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn into_problem(self) -> Problem {
        self.problem
    }
}

/// Result of flux balance analysis
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FbaSolution {
    /// How solving went
    pub status: OptimizationStatus,
    /// Optimal objective value, None unless a solution was found
    pub objective_value: Option<f64>,
    /// Optimal fluxes in model reaction order, None unless a solution was found
    pub fluxes: Option<FluxVector>,
}

impl FbaSolution {
    /// Whether a flux distribution was found
    pub fn has_solution(&self) -> bool {
        self.status.has_solution() && self.fluxes.is_some()
    }

    /// Flux of a single reaction
    pub fn flux(&self, reaction_id: &str) -> Option<f64> {
        self.fluxes.as_ref()?.get(reaction_id).copied()
    }

    /// The `n` reactions carrying the most flux, largest absolute flux first
    ///
    /// Ties keep model order. Empty when there is no solution.
    pub fn top_fluxes(&self, n: usize) -> Vec<(&str, f64)> {
        let Some(fluxes) = self.fluxes.as_ref() else {
            return Vec::new();
        };
        let mut ranked = fluxes
            .iter()
            .map(|(id, flux)| (id.as_str(), *flux))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        ranked.truncate(n);
        ranked
    }
}

impl From<ProblemSolution> for FbaSolution {
    fn from(solution: ProblemSolution) -> Self {
        if solution.status.has_solution() {
            FbaSolution {
                status: solution.status,
                objective_value: solution.objective_value,
                fluxes: solution.variable_values,
            }
        } else {
            FbaSolution {
                status: solution.status,
                objective_value: None,
                fluxes: None,
            }
        }
    }
}

/// Run flux balance analysis, optimizing the model objective subject to steady
/// state and flux bounds
///
/// A model that can't be optimized is not an error, the returned solution carries
/// the solver status and no fluxes.
///
/// # Examples
/// ```rust
/// use fluxrs_core::flux_analysis::fba;
/// use fluxrs_core::metabolic_model::metabolite::Metabolite;
/// use fluxrs_core::metabolic_model::model::Model;
/// use fluxrs_core::metabolic_model::reaction::ReactionBuilder;
/// use fluxrs_core::optimize::objective::ObjectiveSense;
/// use fluxrs_core::optimize::solvers::ClarabelSolver;
/// let model = Model::build(
///     vec![Metabolite::new("A")],
///     vec![
///         ReactionBuilder::default().id("in").metabolite("A", 1.).bounds(0., 5.).build().unwrap(),
///         ReactionBuilder::default()
///             .id("out")
///             .metabolite("A", -1.)
///             .bounds(0., 100.)
///             .objective_coefficient(1.)
///             .build()
///             .unwrap(),
///     ],
///     ObjectiveSense::Maximize,
/// )
/// .unwrap();
/// let solution = fba(&model, &ClarabelSolver::new()).unwrap();
/// assert!((solution.objective_value.unwrap() - 5.).abs() < 1e-6);
/// ```
pub fn fba<S: Solver + ?Sized>(model: &Model, solver: &S) -> Result<FbaSolution, SolverError> {
    let flux_balance = FluxBalanceProblem::new(model)?;
    debug!(
        "Running FBA on {} reactions and {} metabolites with {}, objective: {}",
        model.reactions().len(),
        model.metabolites().len(),
        solver.name(),
        model.objective()
    );
    let solution = FbaSolution::from(solver.solve(flux_balance.problem())?);
    match solution.objective_value {
        Some(value) if solution.has_solution() => {
            info!("FBA finished with status {}, objective value {}", solution.status, value)
        }
        _ => warn!("FBA found no optimal flux distribution, status {}", solution.status),
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metabolic_model::metabolite::Metabolite;
    use crate::metabolic_model::reaction::ReactionBuilder;
    use crate::optimize::constraint::Constraint;
    use crate::optimize::objective::ObjectiveSense;
    use crate::optimize::solvers::ClarabelSolver;

    /// in: -> A, split: A -> 2 B, out: B ->
    fn split_model() -> Model {
        Model::build(
            vec![Metabolite::new("A"), Metabolite::new("B")],
            vec![
                ReactionBuilder::default()
                    .id("in")
                    .metabolite("A", 1.)
                    .bounds(0., 3.)
                    .build()
                    .unwrap(),
                ReactionBuilder::default()
                    .id("split")
                    .metabolite("A", -1.)
                    .metabolite("B", 2.)
                    .bounds(0., 1000.)
                    .build()
                    .unwrap(),
                ReactionBuilder::default()
                    .id("out")
                    .metabolite("B", -1.)
                    .bounds(0., 1000.)
                    .objective_coefficient(1.)
                    .build()
                    .unwrap(),
            ],
            ObjectiveSense::Maximize,
        )
        .unwrap()
    }

    #[test]
    fn problem_construction() {
        let model = split_model();
        let flux_balance = FluxBalanceProblem::new(&model).unwrap();
        let problem = flux_balance.problem();
        assert_eq!(
            problem.variables().keys().collect::<Vec<_>>(),
            vec!["in", "split", "out"]
        );
        assert_eq!(problem.variables()["in"].upper_bound, 3.);
        assert_eq!(problem.num_constraints(), 2);
        match &problem.constraints()["mass_balance_B"] {
            Constraint::Equality { terms, equals, .. } => {
                assert_eq!(*equals, 0.);
                assert_eq!(
                    terms,
                    &vec![ConstraintTerm::new(1, 2.), ConstraintTerm::new(2, -1.)]
                );
            }
            Constraint::Inequality { .. } => panic!("Mass balance should be an equality"),
        }
        assert_eq!(problem.objective().sense(), ObjectiveSense::Maximize);
        assert_eq!(problem.objective().coefficients(3), vec![0., 0., 1.]);
    }

    #[test]
    fn optimize_split() {
        let model = split_model();
        let solution = fba(&model, &ClarabelSolver::new()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 6.).abs() < 1e-6);
        assert!((solution.flux("split").unwrap() - 3.).abs() < 1e-6);
        assert!(solution.flux("missing").is_none());

        let top = solution.top_fluxes(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, "out");
        assert!(solution.top_fluxes(10).len() == 3);
    }

    #[test]
    fn unsolved_has_no_fluxes() {
        let solution = FbaSolution::from(ProblemSolution::unsolved(OptimizationStatus::Infeasible));
        assert!(!solution.has_solution());
        assert!(solution.fluxes.is_none());
        assert!(solution.top_fluxes(5).is_empty());
    }
}
