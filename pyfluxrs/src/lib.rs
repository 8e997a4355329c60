use indexmap::IndexMap;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use fluxrs_core::configuration::{Configuration, Solver as ConfiguredSolver};
use fluxrs_core::flux_analysis::{self, ExchangeRule, FluxRange};
use fluxrs_core::metabolic_model::metabolite::Metabolite;
use fluxrs_core::metabolic_model::model::Model;
use fluxrs_core::metabolic_model::reaction::{Reaction, ReactionBuilder};
use fluxrs_core::optimize::objective::ObjectiveSense;
use fluxrs_core::optimize::solvers::default_solver;

/// Flux range as returned to Python: (kind, minimum, maximum)
type PyFluxRange = (String, Option<f64>, Option<f64>);

fn value_error<E: std::fmt::Display>(err: E) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// A metabolic model assembled from Python
///
/// Metabolites and reactions are collected as they are added; the model is
/// validated each time an analysis runs.
#[pyclass(name = "Model")]
struct PyModel {
    metabolites: Vec<Metabolite>,
    reactions: Vec<Reaction>,
    sense: ObjectiveSense,
}

impl PyModel {
    fn build(&self) -> PyResult<Model> {
        Model::build(self.metabolites.clone(), self.reactions.clone(), self.sense)
            .map_err(value_error)
    }
}

#[pymethods]
impl PyModel {
    #[new]
    #[pyo3(signature = (maximize = true))]
    fn new(maximize: bool) -> Self {
        PyModel {
            metabolites: Vec::new(),
            reactions: Vec::new(),
            sense: if maximize {
                ObjectiveSense::Maximize
            } else {
                ObjectiveSense::Minimize
            },
        }
    }

    #[pyo3(signature = (id, compartment = None))]
    fn add_metabolite(&mut self, id: String, compartment: Option<String>) {
        let metabolite = match compartment {
            Some(compartment) => Metabolite::in_compartment(id, compartment),
            None => Metabolite::new(id),
        };
        self.metabolites.push(metabolite);
    }

    /// Add a reaction, bounds default to the configured ones when not given
    #[pyo3(signature = (id, metabolites, lower_bound = None, upper_bound = None, objective_coefficient = 0.0))]
    fn add_reaction(
        &mut self,
        id: String,
        metabolites: IndexMap<String, f64>,
        lower_bound: Option<f64>,
        upper_bound: Option<f64>,
        objective_coefficient: f64,
    ) -> PyResult<()> {
        let mut builder = ReactionBuilder::default();
        builder
            .id(id)
            .metabolites(metabolites)
            .objective_coefficient(objective_coefficient);
        if let Some(lower_bound) = lower_bound {
            builder.lower_bound(lower_bound);
        }
        if let Some(upper_bound) = upper_bound {
            builder.upper_bound(upper_bound);
        }
        self.reactions.push(builder.build().map_err(value_error)?);
        Ok(())
    }

    fn summary(&self) -> PyResult<String> {
        Ok(self.build()?.summary().to_string())
    }

    /// Run FBA, returning (status, objective value, fluxes)
    fn fba(&self, py: Python<'_>) -> PyResult<(String, Option<f64>, Option<IndexMap<String, f64>>)> {
        let model = self.build()?;
        let solution = py
            .allow_threads(|| flux_analysis::fba(&model, &default_solver()))
            .map_err(value_error)?;
        Ok((
            solution.status.to_string(),
            solution.objective_value,
            solution.fluxes,
        ))
    }

    /// Run FVA on `reaction_ids` (every reaction when None)
    ///
    /// Each range is (kind, minimum, maximum) where kind is "bounded", "unbounded",
    /// "infeasible", or the solver status of a failed solve.
    #[pyo3(signature = (reaction_ids = None, fraction = 1.0))]
    fn fva(
        &self,
        py: Python<'_>,
        reaction_ids: Option<Vec<String>>,
        fraction: f64,
    ) -> PyResult<IndexMap<String, PyFluxRange>> {
        let model = self.build()?;
        let reaction_ids =
            reaction_ids.unwrap_or_else(|| model.reactions().keys().cloned().collect());
        let ids = reaction_ids.iter().map(String::as_str).collect::<Vec<_>>();
        let processes = Configuration::current().processes;
        let result = py
            .allow_threads(|| {
                flux_analysis::fva(&model, &default_solver(), &ids, fraction, processes)
            })
            .map_err(value_error)?;
        Ok(result
            .entries
            .into_iter()
            .map(|(id, range)| {
                let converted = match range {
                    FluxRange::Bounded { minimum, maximum } => {
                        ("bounded".to_string(), Some(minimum), Some(maximum))
                    }
                    FluxRange::Unbounded { minimum, maximum } => {
                        ("unbounded".to_string(), minimum, maximum)
                    }
                    FluxRange::Infeasible => ("infeasible".to_string(), None, None),
                    FluxRange::Failed { status } => (status.to_string(), None, None),
                };
                (id, converted)
            })
            .collect())
    }
}

/// Split fluxes into (uptake, secretion, internal) using an id prefix for exchange reactions
#[pyfunction]
#[pyo3(signature = (fluxes, prefix = "EX_"))]
fn classify_fluxes(
    fluxes: IndexMap<String, f64>,
    prefix: &str,
) -> (
    IndexMap<String, f64>,
    IndexMap<String, f64>,
    IndexMap<String, f64>,
) {
    let classification = fluxrs_core::classify_fluxes(&fluxes, &ExchangeRule::prefix(prefix));
    (
        classification.uptake,
        classification.secretion,
        classification.internal,
    )
}

/// Update the global configuration, leaving options which aren't given unchanged
#[pyfunction]
#[pyo3(signature = (processes = None, tolerance = None, solver = None))]
fn configure(
    processes: Option<usize>,
    tolerance: Option<f64>,
    solver: Option<&str>,
) -> PyResult<()> {
    let mut configuration = Configuration::current();
    if let Some(processes) = processes {
        configuration.processes = processes;
    }
    if let Some(tolerance) = tolerance {
        configuration.tolerance = tolerance;
    }
    if let Some(solver) = solver {
        configuration.solver = match solver.to_lowercase().as_str() {
            "clarabel" => ConfiguredSolver::Clarabel,
            "microlp" => ConfiguredSolver::MicroLp,
            "highs" => ConfiguredSolver::Highs,
            other => return Err(PyValueError::new_err(format!("Unknown solver {}", other))),
        };
    }
    Configuration::set_global(configuration);
    Ok(())
}

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` setting in the `Cargo.toml`, else Python will not be able to
/// import the module.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyModel>()?;
    m.add_function(wrap_pyfunction!(classify_fluxes, m)?)?;
    m.add_function(wrap_pyfunction!(configure, m)?)?;
    Ok(())
}
