use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_abs_diff_eq;
use indexmap::IndexMap;

use fluxrs_core::flux_analysis::fva::OBJECTIVE_BOUND_ID;
use fluxrs_core::flux_analysis::{fba, fva, ExchangeRule, FluxRange, FvaError};
use fluxrs_core::metabolic_model::metabolite::Metabolite;
use fluxrs_core::metabolic_model::model::Model;
use fluxrs_core::metabolic_model::reaction::{Reaction, ReactionBuilder};
use fluxrs_core::optimize::objective::ObjectiveSense;
use fluxrs_core::optimize::problem::Problem;
use fluxrs_core::optimize::solvers::{ClarabelSolver, Solver, SolverError};
use fluxrs_core::optimize::{OptimizationStatus, ProblemSolution};
use fluxrs_core::{classify_fluxes, load_model, run_fba, run_fva};

const EPS: f64 = 1e-6;

/// Clarabel wrapper counting calls, optionally reporting the maximization of one
/// variable under the objective bound as unbounded
struct ScriptedSolver {
    inner: ClarabelSolver,
    calls: AtomicUsize,
    unbounded_variable: Option<usize>,
}

impl ScriptedSolver {
    fn new() -> Self {
        ScriptedSolver {
            inner: ClarabelSolver::new(),
            calls: AtomicUsize::new(0),
            unbounded_variable: None,
        }
    }

    fn unbounded_at(index: usize) -> Self {
        ScriptedSolver {
            unbounded_variable: Some(index),
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Solver for ScriptedSolver {
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(index) = self.unbounded_variable {
            let terms = problem.objective().terms();
            if problem.constraints().contains_key(OBJECTIVE_BOUND_ID)
                && problem.objective().sense() == ObjectiveSense::Maximize
                && terms.len() == 1
                && terms[0].variable == index
            {
                return Ok(ProblemSolution::unsolved(OptimizationStatus::Unbounded));
            }
        }
        self.inner.solve(problem)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn reaction(id: &str, stoichiometry: &[(&str, f64)], lower_bound: f64, upper_bound: f64) -> Reaction {
    let mut builder = ReactionBuilder::default();
    builder.id(id).bounds(lower_bound, upper_bound);
    for (met, coef) in stoichiometry {
        builder.metabolite(*met, *coef);
    }
    builder.build().unwrap()
}

fn objective(mut rxn: Reaction) -> Reaction {
    rxn.objective_coefficient = 1.;
    rxn
}

/// R1: -> A, R2: A -> B, R3: B -> C, R4: C ->, maximize R3
fn chain_model() -> Model {
    load_model(
        vec![Metabolite::new("A"), Metabolite::new("B"), Metabolite::new("C")],
        vec![
            reaction("R1", &[("A", 1.)], 0., 10.),
            reaction("R2", &[("A", -1.), ("B", 1.)], 0., 10.),
            objective(reaction("R3", &[("B", -1.), ("C", 1.)], 0., 10.)),
            reaction("R4", &[("C", -1.)], 0., f64::INFINITY),
        ],
        ObjectiveSense::Maximize,
    )
    .unwrap()
}

/// Glucose is taken up into a, which reaches b by two parallel routes. b is either
/// turned into biomass (through c) or secreted (as d).
fn branched_model() -> Model {
    load_model(
        ["a", "b", "c", "d"]
            .into_iter()
            .map(|id| Metabolite::in_compartment(id, "c"))
            .collect(),
        vec![
            reaction("EX_glc", &[("a", 1.)], 0., 10.),
            reaction("R_ab1", &[("a", -1.), ("b", 1.)], 0., 1000.),
            reaction("R_ab2", &[("a", -1.), ("b", 1.)], 0., 1000.),
            reaction("R_bc", &[("b", -1.), ("c", 1.)], 0., 1000.),
            objective(reaction("BIOMASS", &[("c", -1.)], 0., 1000.)),
            reaction("R_bd", &[("b", -1.), ("d", 1.)], 0., 1000.),
            reaction("EX_d", &[("d", 1.)], -1000., 0.),
        ],
        ObjectiveSense::Maximize,
    )
    .unwrap()
}

fn bounded(range: &FluxRange) -> (f64, f64) {
    match range {
        FluxRange::Bounded { minimum, maximum } => (*minimum, *maximum),
        other => panic!("Expected a bounded range, got {:?}", other),
    }
}

#[test]
fn chain_fba() {
    let model = chain_model();
    let solution = fba(&model, &ClarabelSolver::new()).unwrap();
    assert_eq!(solution.status, OptimizationStatus::Optimal);
    assert_abs_diff_eq!(solution.objective_value.unwrap(), 10., epsilon = EPS);
    for id in ["R1", "R2", "R3", "R4"] {
        assert_abs_diff_eq!(solution.flux(id).unwrap(), 10., epsilon = EPS);
    }
}

#[test]
fn chain_fva_at_optimum() {
    let model = chain_model();
    let result = fva(&model, &ClarabelSolver::new(), &["R1", "R2", "R3"], 1.0, 1).unwrap();
    assert_eq!(result.entries.keys().collect::<Vec<_>>(), vec!["R1", "R2", "R3"]);
    assert_abs_diff_eq!(result.objective_value.unwrap(), 10., epsilon = EPS);
    for (_, range) in result.iter() {
        let (minimum, maximum) = bounded(range);
        assert_abs_diff_eq!(minimum, 10., epsilon = EPS);
        assert_abs_diff_eq!(maximum, 10., epsilon = EPS);
    }
}

/// R1: -> A, R2: A -> B, R3: B -> (objective), all in [0, 10]
#[test]
fn three_reaction_chain() {
    let model = load_model(
        vec![Metabolite::new("A"), Metabolite::new("B")],
        vec![
            reaction("R1", &[("A", 1.)], 0., 10.),
            reaction("R2", &[("A", -1.), ("B", 1.)], 0., 10.),
            objective(reaction("R3", &[("B", -1.)], 0., 10.)),
        ],
        ObjectiveSense::Maximize,
    )
    .unwrap();
    let solver = ClarabelSolver::new();

    let solution = fba(&model, &solver).unwrap();
    assert_abs_diff_eq!(solution.objective_value.unwrap(), 10., epsilon = EPS);
    for id in ["R1", "R2", "R3"] {
        assert_abs_diff_eq!(solution.flux(id).unwrap(), 10., epsilon = EPS);
    }

    let result = fva(&model, &solver, &["R1", "R2", "R3"], 1.0, 1).unwrap();
    for id in ["R1", "R2", "R3"] {
        let (minimum, maximum) = bounded(&result.entries[id]);
        assert_abs_diff_eq!(minimum, 10., epsilon = EPS);
        assert_abs_diff_eq!(maximum, 10., epsilon = EPS);
    }
}

#[test]
fn infinite_upper_bound_keeps_optimum() {
    let overrides: IndexMap<String, (f64, f64)> =
        [("R2".to_string(), (0., f64::INFINITY))].into_iter().collect();
    let model = chain_model().with_bounds(&overrides).unwrap();
    let solution = fba(&model, &ClarabelSolver::new()).unwrap();
    assert_abs_diff_eq!(solution.objective_value.unwrap(), 10., epsilon = EPS);
    assert_abs_diff_eq!(solution.flux("R2").unwrap(), 10., epsilon = EPS);
}

#[test]
fn fba_fluxes_satisfy_constraints() {
    let model = branched_model();
    let solution = fba(&model, &ClarabelSolver::new()).unwrap();
    let fluxes = solution.fluxes.as_ref().unwrap();
    assert_eq!(fluxes.len(), model.reactions().len());
    assert!(model.steady_state_violations(fluxes, EPS).is_empty());
    assert!(model.bound_violations(fluxes, EPS).is_empty());
    assert_abs_diff_eq!(solution.objective_value.unwrap(), 10., epsilon = EPS);
    assert_abs_diff_eq!(
        solution.flux("R_ab1").unwrap() + solution.flux("R_ab2").unwrap(),
        10.,
        epsilon = EPS
    );
}

#[test]
fn fba_is_repeatable() {
    let model = branched_model();
    let solver = ClarabelSolver::new();
    let first = fba(&model, &solver).unwrap();
    let second = fba(&model, &solver).unwrap();
    assert_abs_diff_eq!(
        first.objective_value.unwrap(),
        second.objective_value.unwrap(),
        epsilon = 1e-9
    );
}

#[test]
fn branched_fva() {
    let model = branched_model();
    let ids = model.reactions().keys().map(String::as_str).collect::<Vec<_>>();
    let solver = ClarabelSolver::new();
    let full = fva(&model, &solver, &ids, 1.0, 1).unwrap();

    let (minimum, maximum) = bounded(full.get("R_ab1").unwrap());
    assert_abs_diff_eq!(minimum, 0., epsilon = EPS);
    assert_abs_diff_eq!(maximum, 10., epsilon = EPS);
    let (minimum, maximum) = bounded(full.get("EX_d").unwrap());
    assert_abs_diff_eq!(minimum, 0., epsilon = EPS);
    assert_abs_diff_eq!(maximum, 0., epsilon = EPS);
    assert!(full.blocked_reactions(EPS).contains(&"R_bd"));

    // Bounded ranges stay within the reaction bounds
    for (id, range) in full.iter() {
        let (minimum, maximum) = bounded(range);
        let (lower_bound, upper_bound) = model.bounds(id).unwrap();
        assert!(minimum <= maximum);
        assert!(minimum >= lower_bound && maximum <= upper_bound);
    }

    // The optimal flux lies within every range
    let optimum = fba(&model, &solver).unwrap();
    for (id, range) in full.iter() {
        assert!(range.contains(optimum.flux(id).unwrap(), EPS));
    }

    // Relaxing the objective only widens ranges
    let half = fva(&model, &solver, &ids, 0.5, 1).unwrap();
    for (id, range) in half.iter() {
        let (minimum, maximum) = bounded(range);
        let (full_minimum, full_maximum) = bounded(full.get(id).unwrap());
        assert!(minimum <= full_minimum + EPS);
        assert!(maximum >= full_maximum - EPS);
    }
    let (minimum, maximum) = bounded(half.get("BIOMASS").unwrap());
    assert_abs_diff_eq!(minimum, 5., epsilon = EPS);
    assert_abs_diff_eq!(maximum, 10., epsilon = EPS);
    let (minimum, _) = bounded(half.get("EX_d").unwrap());
    assert_abs_diff_eq!(minimum, -5., epsilon = EPS);
}

#[test]
fn parallel_fva_matches_serial() {
    let model = branched_model();
    let ids = model.reactions().keys().map(String::as_str).collect::<Vec<_>>();
    let solver = ClarabelSolver::new();
    let serial = fva(&model, &solver, &ids, 0.8, 1).unwrap();
    let parallel = fva(&model, &solver, &ids, 0.8, 4).unwrap();
    assert_eq!(
        serial.entries.keys().collect::<Vec<_>>(),
        parallel.entries.keys().collect::<Vec<_>>()
    );
    for (id, range) in serial.iter() {
        let (minimum, maximum) = bounded(range);
        let (parallel_minimum, parallel_maximum) = bounded(parallel.get(id).unwrap());
        assert_abs_diff_eq!(minimum, parallel_minimum, epsilon = 1e-8);
        assert_abs_diff_eq!(maximum, parallel_maximum, epsilon = 1e-8);
    }
}

#[test]
fn unknown_reaction_is_rejected_before_solving() {
    let model = chain_model();
    let solver = ScriptedSolver::new();
    let result = fva(&model, &solver, &["R1", "missing"], 1.0, 1);
    assert_eq!(result, Err(FvaError::UnknownReaction("missing".to_string())));
    assert_eq!(solver.calls(), 0);
}

#[test]
fn invalid_fraction_is_rejected() {
    let model = chain_model();
    let solver = ScriptedSolver::new();
    for fraction in [-0.1, 1.5, f64::NAN] {
        assert!(matches!(
            fva(&model, &solver, &["R1"], fraction, 1),
            Err(FvaError::InvalidObjectiveFraction(_))
        ));
    }
    assert_eq!(solver.calls(), 0);
}

#[test]
fn empty_subset_does_not_solve() {
    let model = chain_model();
    let solver = ScriptedSolver::new();
    let result = fva(&model, &solver, &[], 1.0, 1).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.objective_value, None);
    assert_eq!(solver.calls(), 0);
}

#[test]
fn infeasible_model() {
    let overrides: IndexMap<String, (f64, f64)> = [
        ("R1".to_string(), (5., 10.)),
        ("R3".to_string(), (0., 2.)),
    ]
    .into_iter()
    .collect();
    let model = chain_model().with_bounds(&overrides).unwrap();
    let solution = fba(&model, &ClarabelSolver::new()).unwrap();
    assert_eq!(solution.status, OptimizationStatus::Infeasible);
    assert!(solution.fluxes.is_none());

    let solver = ScriptedSolver::new();
    assert_eq!(
        fva(&model, &solver, &["R1", "R2"], 1.0, 2),
        Err(FvaError::PrerequisiteInfeasible(OptimizationStatus::Infeasible))
    );
    // Only the prerequisite optimization ran
    assert_eq!(solver.calls(), 1);
}

#[test]
fn unbounded_model() {
    let overrides: IndexMap<String, (f64, f64)> = ["R1", "R2", "R3"]
        .into_iter()
        .map(|id| (id.to_string(), (0., f64::INFINITY)))
        .collect();
    let model = chain_model().with_bounds(&overrides).unwrap();
    let solution = fba(&model, &ClarabelSolver::new()).unwrap();
    assert_eq!(solution.status, OptimizationStatus::Unbounded);
    assert!(solution.objective_value.is_none());
}

#[test]
fn unbounded_entry_is_recorded() {
    let model = chain_model();
    // R2 is the second variable
    let solver = ScriptedSolver::unbounded_at(1);
    let result = fva(&model, &solver, &["R1", "R2", "R3"], 1.0, 2).unwrap();
    assert_eq!(solver.calls(), 7);
    match result.get("R2").unwrap() {
        FluxRange::Unbounded { minimum, maximum } => {
            assert_abs_diff_eq!(minimum.unwrap(), 10., epsilon = EPS);
            assert!(maximum.is_none());
        }
        other => panic!("Expected an unbounded range, got {:?}", other),
    }
    assert!(result.get("R1").unwrap().is_bounded());
    assert!(result.get("R3").unwrap().is_bounded());
}

#[test]
fn crate_level_api() {
    let model = branched_model();
    let solution = run_fba(&model).unwrap();
    assert_abs_diff_eq!(solution.objective_value.unwrap(), 10., epsilon = EPS);

    let result = run_fva(&model, &["BIOMASS"], 1.0).unwrap();
    let (minimum, maximum) = bounded(result.get("BIOMASS").unwrap());
    assert_abs_diff_eq!(minimum, 10., epsilon = EPS);
    assert_abs_diff_eq!(maximum, 10., epsilon = EPS);

    let classification = classify_fluxes(solution.fluxes.as_ref().unwrap(), &ExchangeRule::default());
    assert_eq!(classification.uptake.keys().collect::<Vec<_>>(), vec!["EX_glc"]);
    assert!(classification.secretion.is_empty());
    assert!(classification.internal.contains_key("BIOMASS"));
    assert!(!classification.internal.contains_key("EX_d"));
}

#[test]
fn secretion_is_classified() {
    // Push everything out through EX_d by minimizing it
    let coefficients: IndexMap<String, f64> = [("EX_d".to_string(), 1.)].into_iter().collect();
    let model = branched_model()
        .with_objective(&coefficients, ObjectiveSense::Minimize)
        .unwrap();
    let solution = run_fba(&model).unwrap();
    assert_abs_diff_eq!(solution.objective_value.unwrap(), -10., epsilon = EPS);

    let classification = classify_fluxes(solution.fluxes.as_ref().unwrap(), &ExchangeRule::prefix("EX_"));
    assert_eq!(classification.secretion.keys().collect::<Vec<_>>(), vec!["EX_d"]);
    assert_abs_diff_eq!(classification.uptake["EX_glc"], 10., epsilon = EPS);

    let result = run_fva(&model, &["BIOMASS", "EX_glc"], 1.0).unwrap();
    let (minimum, maximum) = bounded(result.get("BIOMASS").unwrap());
    assert_abs_diff_eq!(minimum, 0., epsilon = EPS);
    assert_abs_diff_eq!(maximum, 0., epsilon = EPS);
}

#[test]
fn summary_and_serialization() {
    let model = branched_model().with_id("branched");
    assert_eq!(
        model.summary().to_string(),
        "Model branched: 7 reactions (3 boundary), 4 metabolites, objective: maximize 1.0*BIOMASS"
    );
    let result = fva(&model, &ClarabelSolver::new(), &["R_bc"], 1.0, 1).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["entries"]["R_bc"]["kind"], "bounded");
    assert_eq!(json["objective_fraction"], 1.0);
}
