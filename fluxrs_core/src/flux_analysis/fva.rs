//! Flux variability analysis
//!
//! For each requested reaction find the lowest and highest flux it can carry while
//! the model objective stays within a fraction of its optimum.
use indexmap::IndexMap;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::configuration::Configuration;
use crate::flux_analysis::fba::FluxBalanceProblem;
use crate::metabolic_model::model::Model;
use crate::optimize::constraint::ConstraintTerm;
use crate::optimize::objective::{Objective, ObjectiveSense};
use crate::optimize::problem::{Problem, ProblemError};
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Id of the constraint holding the objective near its optimum
pub const OBJECTIVE_BOUND_ID: &str = "objective_bound";

/// Feasible flux range of a single reaction
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FluxRange {
    /// Both extremes were found, `minimum <= maximum` and both lie within the
    /// reaction bounds
    Bounded { minimum: f64, maximum: f64 },
    /// At least one direction is unbounded, the side that could be solved is kept
    Unbounded {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    /// The constrained problem has no feasible point
    Infeasible,
    /// The solver stopped without an answer
    Failed { status: OptimizationStatus },
}

impl FluxRange {
    pub fn is_bounded(&self) -> bool {
        matches!(self, FluxRange::Bounded { .. })
    }

    pub fn minimum(&self) -> Option<f64> {
        match self {
            FluxRange::Bounded { minimum, .. } => Some(*minimum),
            FluxRange::Unbounded { minimum, .. } => *minimum,
            _ => None,
        }
    }

    pub fn maximum(&self) -> Option<f64> {
        match self {
            FluxRange::Bounded { maximum, .. } => Some(*maximum),
            FluxRange::Unbounded { maximum, .. } => *maximum,
            _ => None,
        }
    }

    /// Width of a bounded range
    pub fn span(&self) -> Option<f64> {
        match self {
            FluxRange::Bounded { minimum, maximum } => Some(maximum - minimum),
            _ => None,
        }
    }

    /// Centre of a bounded range
    pub fn midpoint(&self) -> Option<f64> {
        match self {
            FluxRange::Bounded { minimum, maximum } => Some((minimum + maximum) / 2.),
            _ => None,
        }
    }

    /// Whether `value` lies in a bounded range, widened by `tolerance` on both sides
    pub fn contains(&self, value: f64, tolerance: f64) -> bool {
        match self {
            FluxRange::Bounded { minimum, maximum } => {
                value >= minimum - tolerance && value <= maximum + tolerance
            }
            _ => false,
        }
    }

    /// Combine the results of minimizing and maximizing a reaction with bounds
    /// `(lower_bound, upper_bound)`
    fn from_extremes(
        minimized: &ProblemSolution,
        maximized: &ProblemSolution,
        (lower_bound, upper_bound): (f64, f64),
    ) -> FluxRange {
        let sides = [Extreme::from(minimized), Extreme::from(maximized)];
        if sides.iter().any(|s| matches!(s, Extreme::Infeasible)) {
            return FluxRange::Infeasible;
        }
        if let Some(status) = sides.iter().find_map(|s| match s {
            Extreme::Failed(status) => Some(*status),
            _ => None,
        }) {
            return FluxRange::Failed { status };
        }
        let clamp = |v: f64| v.max(lower_bound).min(upper_bound);
        match sides {
            [Extreme::Value(minimum), Extreme::Value(maximum)] => {
                let (minimum, maximum) = (clamp(minimum), clamp(maximum));
                if minimum > maximum {
                    // Solver noise around a fixed flux
                    let mid = (minimum + maximum) / 2.;
                    FluxRange::Bounded {
                        minimum: mid,
                        maximum: mid,
                    }
                } else {
                    FluxRange::Bounded { minimum, maximum }
                }
            }
            [minimum, maximum] => FluxRange::Unbounded {
                minimum: minimum.value().map(clamp),
                maximum: maximum.value().map(clamp),
            },
        }
    }
}

/// Outcome of optimizing a reaction in one direction
enum Extreme {
    Value(f64),
    Unbounded,
    Infeasible,
    Failed(OptimizationStatus),
}

impl Extreme {
    fn value(&self) -> Option<f64> {
        match self {
            Extreme::Value(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&ProblemSolution> for Extreme {
    fn from(solution: &ProblemSolution) -> Self {
        match (solution.status, solution.objective_value) {
            (status, Some(value)) if status.has_solution() => Extreme::Value(value),
            (OptimizationStatus::Unbounded, _) => Extreme::Unbounded,
            (OptimizationStatus::Infeasible, _) => Extreme::Infeasible,
            (status, _) => Extreme::Failed(status),
        }
    }
}

/// Result of flux variability analysis
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FvaResult {
    /// Flux range of each requested reaction, in request order
    pub entries: IndexMap<String, FluxRange>,
    /// Optimal objective value the ranges were computed against, None when no
    /// reaction was requested
    pub objective_value: Option<f64>,
    /// Fraction of the optimum the objective was held at
    pub objective_fraction: f64,
}

impl FvaResult {
    pub fn get(&self, reaction_id: &str) -> Option<&FluxRange> {
        self.entries.get(reaction_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FluxRange)> {
        self.entries.iter().map(|(id, range)| (id.as_str(), range))
    }

    /// Reactions which can't carry flux, i.e. whose range is within `tolerance` of zero
    pub fn blocked_reactions(&self, tolerance: f64) -> Vec<&str> {
        self.iter()
            .filter(|(_, range)| match range {
                FluxRange::Bounded { minimum, maximum } => {
                    minimum.abs() <= tolerance && maximum.abs() <= tolerance
                }
                _ => false,
            })
            .map(|(id, _)| id)
            .collect()
    }
}

/// Errors which stop flux variability analysis as a whole
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FvaError {
    #[error("Reaction {0} is not in the model")]
    UnknownReaction(String),
    #[error("Objective fraction must be between 0 and 1, got {0}")]
    InvalidObjectiveFraction(f64),
    #[error("Model objective could not be optimized, status {0}")]
    PrerequisiteInfeasible(OptimizationStatus),
    #[error("Unable to build thread pool: {0}")]
    ThreadPool(String),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Run flux variability analysis on `reaction_ids`
///
/// The model is first optimized to find the objective optimum Z*. Every reaction is
/// then minimized and maximized subject to steady state, its bounds, and the
/// objective staying within `objective_fraction` of Z*. The `2 * reaction_ids.len()`
/// sub-problems are solved on a pool of `processes` threads (0 for one per CPU).
///
/// # Errors
/// - [`FvaError::InvalidObjectiveFraction`] unless `0 <= objective_fraction <= 1`
/// - [`FvaError::UnknownReaction`] for an id not in the model, checked before any
///   solving
/// - [`FvaError::PrerequisiteInfeasible`] when the objective can't be optimized
///
/// A sub-problem which can't be solved is recorded in its [`FluxRange`] instead.
pub fn fva<S: Solver + ?Sized>(
    model: &Model,
    solver: &S,
    reaction_ids: &[&str],
    objective_fraction: f64,
    processes: usize,
) -> Result<FvaResult, FvaError> {
    if !(0.0..=1.0).contains(&objective_fraction) {
        return Err(FvaError::InvalidObjectiveFraction(objective_fraction));
    }
    let indices = reaction_ids
        .iter()
        .map(|id| {
            model
                .reactions()
                .get_index_of(*id)
                .ok_or_else(|| FvaError::UnknownReaction(id.to_string()))
        })
        .collect::<Result<Vec<usize>, FvaError>>()?;
    if indices.is_empty() {
        return Ok(FvaResult {
            entries: IndexMap::new(),
            objective_value: None,
            objective_fraction,
        });
    }

    let flux_balance = FluxBalanceProblem::new(model).map_err(SolverError::from)?;
    let optimum = solver.solve(flux_balance.problem())?;
    let objective_value = match optimum.objective_value {
        Some(value) if optimum.status.has_solution() => value,
        _ => {
            warn!("FVA aborted, objective could not be optimized: {}", optimum.status);
            return Err(FvaError::PrerequisiteInfeasible(optimum.status));
        }
    };
    let tolerance = Configuration::current().tolerance;
    let shared = constrain_objective(
        flux_balance.into_problem(),
        objective_value,
        objective_fraction,
        tolerance,
    )
    .map_err(SolverError::from)?;

    debug!(
        "Running FVA on {} reactions with {} using {} threads, objective held at {} of {}",
        indices.len(),
        solver.name(),
        processes,
        objective_fraction,
        objective_value
    );
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(processes)
        .build()
        .map_err(|err| FvaError::ThreadPool(err.to_string()))?;
    let ranges = pool.install(|| {
        indices
            .par_iter()
            .map(|index| variability(&shared, solver, *index))
            .collect::<Result<Vec<(ProblemSolution, ProblemSolution)>, SolverError>>()
    })?;

    let mut entries = IndexMap::with_capacity(indices.len());
    for ((id, index), (minimized, maximized)) in reaction_ids.iter().zip(&indices).zip(&ranges) {
        let bounds = model
            .reactions()
            .get_index(*index)
            .map(|(_, rxn)| rxn.bounds())
            .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
        let range = FluxRange::from_extremes(minimized, maximized, bounds);
        if !range.is_bounded() {
            warn!("FVA range of {} is not bounded: {:?}", id, range);
        }
        entries.insert(id.to_string(), range);
    }
    info!(
        "FVA finished for {} reactions, {} bounded",
        entries.len(),
        entries.values().filter(|r| r.is_bounded()).count()
    );
    Ok(FvaResult {
        entries,
        objective_value: Some(objective_value),
        objective_fraction,
    })
}

/// Add the constraint keeping the objective within `fraction` of `optimum`
///
/// When maximizing the objective must reach `optimum - (1 - fraction) * |optimum|`,
/// which is `fraction * optimum` for a non-negative optimum; when minimizing it must
/// stay under `optimum + (1 - fraction) * |optimum|`. The bound is relaxed by a small
/// multiple of `tolerance` so that `fraction = 1` stays feasible despite round off.
fn constrain_objective(
    mut problem: Problem,
    optimum: f64,
    fraction: f64,
    tolerance: f64,
) -> Result<Problem, ProblemError> {
    let terms = problem
        .objective()
        .terms()
        .iter()
        .map(|t| ConstraintTerm::new(t.variable, t.coefficient))
        .collect::<Vec<_>>();
    let slack = tolerance * 0.01 * optimum.abs().max(1.);
    let allowance = (1. - fraction) * optimum.abs();
    let (lower, upper) = match problem.objective().sense() {
        ObjectiveSense::Maximize => (optimum - allowance - slack, f64::INFINITY),
        ObjectiveSense::Minimize => (f64::NEG_INFINITY, optimum + allowance + slack),
    };
    problem.add_new_inequality_constraint(OBJECTIVE_BOUND_ID, terms, lower, upper)?;
    Ok(problem)
}

/// Minimize then maximize a single reaction, each on a fresh copy of `shared`
fn variability<S: Solver + ?Sized>(
    shared: &Problem,
    solver: &S,
    index: usize,
) -> Result<(ProblemSolution, ProblemSolution), SolverError> {
    let extreme = |sense: ObjectiveSense| -> Result<ProblemSolution, SolverError> {
        let mut problem = shared.clone();
        problem.set_objective(Objective::single(index, sense))?;
        solver.solve(&problem)
    };
    Ok((extreme(ObjectiveSense::Minimize)?, extreme(ObjectiveSense::Maximize)?))
}
