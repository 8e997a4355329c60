//! Implements a solver interface for Clarabel
//!
//! Clarabel solves conic problems of the form
//!
//! min 1/2 x'Px + q'x subject to Ax + s = b, s in K
//!
//! A linear problem has an empty P. Equalities (and variables fixed to a single value)
//! become rows of the zero cone, every finite one sided bound becomes a row of the
//! nonnegative cone.
use clarabel::algebra::CscMatrix;
use clarabel::solver::*;
use log::debug;
use nalgebra_sparse::{CooMatrix, CscMatrix as SparseMatrix};

use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{merged_terms, Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Interior point solver backed by Clarabel, the default backend
#[derive(Clone, Debug, Default)]
pub struct ClarabelSolver {
    /// Maximum number of interior point iterations, Clarabel's default when None
    max_iter: Option<u32>,
    /// Time limit in seconds, unlimited when None
    time_limit: Option<f64>,
}

impl ClarabelSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of iterations per solve
    pub fn with_max_iter(mut self, max_iter: u32) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    /// Limit the wall clock time per solve, in seconds
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    fn settings(&self) -> DefaultSettings<f64> {
        let mut settings = DefaultSettings {
            verbose: false,
            ..DefaultSettings::default()
        };
        if let Some(max_iter) = self.max_iter {
            settings.max_iter = max_iter;
        }
        if let Some(time_limit) = self.time_limit {
            settings.time_limit = time_limit;
        }
        settings
    }

    fn convert_status(status: SolverStatus) -> OptimizationStatus {
        match status {
            SolverStatus::Solved => OptimizationStatus::Optimal,
            SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                OptimizationStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                OptimizationStatus::Unbounded
            }
            SolverStatus::MaxIterations
            | SolverStatus::MaxTime
            | SolverStatus::InsufficientProgress => OptimizationStatus::SolverHalted,
            _ => OptimizationStatus::NumericalError,
        }
    }
}

/// Rows of the constraint matrix, split by the cone they belong to
#[derive(Default)]
struct ConicRows {
    equality: Vec<(Vec<(usize, f64)>, f64)>,
    nonnegative: Vec<(Vec<(usize, f64)>, f64)>,
    /// Set when a row without terms excludes zero
    infeasible: bool,
}

impl ConicRows {
    /// Add lower <= terms <= upper, skipping infinite sides
    fn add_range(&mut self, terms: Vec<(usize, f64)>, lower: f64, upper: f64) {
        let terms = terms
            .into_iter()
            .filter(|(_, coef)| *coef != 0.)
            .collect::<Vec<_>>();
        if terms.is_empty() {
            self.infeasible |= lower > 0. || upper < 0.;
            return;
        }
        if lower == upper && upper.is_finite() {
            self.equality.push((terms, upper));
            return;
        }
        if upper.is_finite() {
            self.nonnegative.push((terms.clone(), upper));
        }
        if lower.is_finite() {
            let negated = terms.into_iter().map(|(v, c)| (v, -c)).collect();
            self.nonnegative.push((negated, -lower));
        }
    }

    fn from_problem(problem: &Problem) -> Self {
        let mut rows = ConicRows::default();
        for (index, var) in problem.variables().values().enumerate() {
            rows.add_range(vec![(index, 1.)], var.lower_bound, var.upper_bound);
        }
        for cons in problem.constraints().values() {
            let (lower, upper) = cons.range();
            rows.add_range(merged_terms(cons.terms()), lower, upper);
        }
        rows
    }

    fn num_rows(&self) -> usize {
        self.equality.len() + self.nonnegative.len()
    }

    /// Assemble A, b and the cone specification, equalities first
    fn assemble(self, num_variables: usize) -> (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
        let num_rows = self.num_rows();
        let mut cones = Vec::new();
        if !self.equality.is_empty() {
            cones.push(ZeroConeT(self.equality.len()));
        }
        if !self.nonnegative.is_empty() {
            cones.push(NonnegativeConeT(self.nonnegative.len()));
        }

        let mut coo = CooMatrix::new(num_rows, num_variables);
        let mut b = Vec::with_capacity(num_rows);
        for (row, (terms, rhs)) in self.equality.into_iter().chain(self.nonnegative).enumerate() {
            for (col, coef) in terms {
                coo.push(row, col, coef);
            }
            b.push(rhs);
        }
        let csc = SparseMatrix::from(&coo);
        let (col_offsets, row_indices, values) = csc.disassemble();
        let a = CscMatrix::new(num_rows, num_variables, col_offsets, row_indices, values);
        (a, b, cones)
    }
}

impl Solver for ClarabelSolver {
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let num_variables = problem.num_variables();
        if num_variables == 0 {
            // Nothing to optimize, only constant constraints to check
            return Ok(if problem.is_feasible(&[], 0.) {
                ProblemSolution::solved(problem, OptimizationStatus::Optimal, Vec::new())
            } else {
                ProblemSolution::unsolved(OptimizationStatus::Infeasible)
            });
        }

        let mut q = problem.objective().coefficients(num_variables);
        if problem.objective().sense() == ObjectiveSense::Maximize {
            q.iter_mut().for_each(|c| *c = -*c);
        }

        let rows = ConicRows::from_problem(problem);
        if rows.infeasible {
            return Ok(ProblemSolution::unsolved(OptimizationStatus::Infeasible));
        }
        if rows.num_rows() == 0 {
            // Every variable is free, so any non-zero objective is unbounded
            return Ok(if q.iter().all(|c| *c == 0.) {
                ProblemSolution::solved(problem, OptimizationStatus::Optimal, vec![0.; num_variables])
            } else {
                ProblemSolution::unsolved(OptimizationStatus::Unbounded)
            });
        }
        let (a, b, cones) = rows.assemble(num_variables);
        let p = CscMatrix::new(
            num_variables,
            num_variables,
            vec![0; num_variables + 1],
            Vec::new(),
            Vec::new(),
        );

        debug!(
            "Solving problem with {} variables and {} constraints using Clarabel",
            num_variables,
            problem.num_constraints()
        );
        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, self.settings());
        solver.solve();

        let status = Self::convert_status(solver.solution.status);
        debug!("Clarabel finished with status {}", status);
        Ok(if status.has_solution() {
            ProblemSolution::solved(problem, status, solver.solution.x.clone())
        } else {
            ProblemSolution::unsolved(status)
        })
    }

    fn name(&self) -> &str {
        "Clarabel"
    }
}
