//! The SAT oracle interface consumed by the engine, and its implementation on top of
//! [varisat](https://docs.rs/varisat).
//!
//! The engine never talks to a solver directly: the encoder, the match matrix and the
//! generalizer all go through [`SatOracle`]. Every oracle asserts the reserved constant
//! [`SatLit::TRUE`] when it is created.

use std::time::{Duration, Instant};

use log::{debug, trace};
use rustc_hash::FxHashSet;
use thiserror::Error;
use varisat::ExtendFormula;

use crate::lit::SatLit;

/// Error returned when the underlying solver fails.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The solver reported an internal failure.
    #[error("solver error: {0}")]
    Solver(String),
}

/// Outcome of a solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Sat,
    Unsat,
    /// The wall-clock budget of the oracle is exhausted.
    Timeout,
    /// A bounded call (see [`SatOracle::set_conflict_limit`]) stopped before concluding.
    Unknown,
}

/// An incremental SAT solver.
pub trait SatOracle {
    /// Adds a clause. Literals over variables never seen before extend the variable space.
    fn add_clause(&mut self, lits: &[SatLit]);

    /// Mints a fresh variable and returns its positive literal.
    fn new_var(&mut self) -> SatLit;

    /// Makes sure that variables `1..=count` exist and are never returned by [`new_var`].
    ///
    /// [`new_var`]: SatOracle::new_var
    fn reserve_vars(&mut self, count: u32);

    fn solve(&mut self) -> Result<SolveStatus, OracleError> {
        self.solve_under_assumptions(&[])
    }

    fn solve_under_assumptions(
        &mut self,
        assumptions: &[SatLit],
    ) -> Result<SolveStatus, OracleError>;

    /// Value of the literal in the last model. Only meaningful after [`SolveStatus::Sat`].
    fn is_lit_satisfied(&self, lit: SatLit) -> bool;

    /// Whether the assumption at position `index` of the last assumption list belongs to
    /// the failed-assumption set. Only meaningful right after [`SolveStatus::Unsat`].
    fn is_assumption_required(&self, index: usize) -> bool;

    /// Preferred phase for the variable of `lit`, so that `lit` tends to be satisfied.
    /// Oracles without phase control may ignore it.
    fn fix_polarity(&mut self, _lit: SatLit) {}

    /// Branching score bump for the variable of `lit`. Oracles may ignore it.
    fn boost_score(&mut self, _lit: SatLit, _value: f64) {}

    /// Bound on the conflicts of the next solve call only (0 means unbounded).
    /// Oracles may ignore it, in which case the call runs to completion.
    fn set_conflict_limit(&mut self, _limit: u64) {}
}

/// [`SatOracle`] backed by [`varisat::Solver`].
///
/// The wall-clock deadline is checked before each solve: once it has passed, every solve
/// returns [`SolveStatus::Timeout`]. varisat cannot be interrupted, so a solve started
/// before the deadline runs to completion and may overrun it.
pub struct VarisatOracle<'a> {
    solver: varisat::Solver<'a>,
    max_var: u32,
    deadline: Option<Instant>,
    assumptions: Vec<SatLit>,
    /// Variable values of the last model, indexed by variable.
    model: Vec<bool>,
    failed: FxHashSet<SatLit>,
    num_solves: u64,
}

impl<'a> VarisatOracle<'a> {
    /// Creates an oracle that gives up after `timeout`, if any.
    pub fn new(timeout: Option<Duration>) -> Self {
        let mut oracle = VarisatOracle {
            solver: varisat::Solver::new(),
            max_var: 0,
            deadline: timeout.map(|t| Instant::now() + t),
            assumptions: Vec::new(),
            model: Vec::new(),
            failed: FxHashSet::default(),
            num_solves: 0,
        };
        oracle.add_clause(&[SatLit::TRUE]);
        oracle
    }

    /// Creates an oracle sharing the given deadline with other oracles of the same run.
    pub fn with_deadline(deadline: Option<Instant>) -> Self {
        let mut oracle = VarisatOracle::new(None);
        oracle.deadline = deadline;
        oracle
    }

    pub fn num_vars(&self) -> u32 {
        self.max_var
    }

    pub fn num_solves(&self) -> u64 {
        self.num_solves
    }

    fn to_varisat(lit: SatLit) -> varisat::Lit {
        varisat::Lit::from_dimacs(lit.to_dimacs() as isize)
    }

    fn timed_out(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl SatOracle for VarisatOracle<'_> {
    fn add_clause(&mut self, lits: &[SatLit]) {
        trace!("clause {lits:?}");
        let clause: Vec<varisat::Lit> = lits
            .iter()
            .map(|&lit| {
                self.max_var = self.max_var.max(lit.var());
                VarisatOracle::to_varisat(lit)
            })
            .collect();
        self.solver.add_clause(&clause);
    }

    fn new_var(&mut self) -> SatLit {
        self.max_var += 1;
        SatLit::from_var(self.max_var)
    }

    fn reserve_vars(&mut self, count: u32) {
        self.max_var = self.max_var.max(count);
    }

    fn solve_under_assumptions(
        &mut self,
        assumptions: &[SatLit],
    ) -> Result<SolveStatus, OracleError> {
        self.model.clear();
        self.failed.clear();
        self.assumptions = assumptions.to_vec();

        if self.timed_out() {
            debug!("deadline reached before solve #{}", self.num_solves + 1);
            return Ok(SolveStatus::Timeout);
        }

        let lits: Vec<varisat::Lit> = assumptions
            .iter()
            .map(|&lit| VarisatOracle::to_varisat(lit))
            .collect();
        self.solver.assume(&lits);
        self.num_solves += 1;

        match self.solver.solve() {
            Ok(true) => {
                self.model = vec![false; self.max_var as usize + 1];
                if let Some(model) = self.solver.model() {
                    for lit in model {
                        let var = lit.var().index() + 1;
                        if var < self.model.len() {
                            self.model[var] = lit.is_positive();
                        }
                    }
                }
                Ok(SolveStatus::Sat)
            }
            Ok(false) => {
                if let Some(core) = self.solver.failed_core() {
                    self.failed = core
                        .iter()
                        .map(|lit| SatLit::from(lit.to_dimacs() as i32))
                        .collect();
                }
                Ok(SolveStatus::Unsat)
            }
            Err(e) => Err(OracleError::Solver(format!("{e:?}"))),
        }
    }

    fn is_lit_satisfied(&self, lit: SatLit) -> bool {
        let value = self.model.get(lit.var() as usize).copied().unwrap_or(false);
        if lit.is_positive() { value } else { !value }
    }

    fn is_assumption_required(&self, index: usize) -> bool {
        self.assumptions
            .get(index)
            .is_some_and(|lit| self.failed.contains(lit))
    }
}
