//! The search controller: enumeration of every Boolean match between two circuits.
//!
//! A [`BoolMatcher`] is one of a closed set of strategies, picked from the
//! [`MatchConfig`] at construction:
//! - iterative with Tseitin or dual-rail encoding ([`IterativeMatcher`]): candidates come
//!   from a matrix in its own oracle and are validated one by one on the miter
//! - blocking with Tseitin encoding ([`BlockingMatcher`]): the matrix lives in the miter,
//!   counterexamples are exhausted first, then the surviving matches are enumerated.
//!
//! ```rust
//! use boolmatch::{circuit::CircuitBuilder, config::MatchConfig, search::{BoolMatcher, FoundMatch}};
//!
//! let mut builder = CircuitBuilder::new();
//! let a = builder.add_input();
//! let b = builder.add_input();
//! let z = builder.add_and(a, b);
//! builder.add_output(z);
//! let circuit = builder.build().unwrap();
//!
//! let mut matcher = BoolMatcher::new(&circuit, &circuit, &MatchConfig::default()).unwrap();
//! let mut found = Vec::new();
//! let report = matcher.run(&mut |m: &FoundMatch| found.push(m.clone())).unwrap();
//! assert_eq!(report.valid_matches, 2);
//! assert_eq!(found.len(), 2);
//! ```

mod blocking;
mod iterative;

pub use blocking::BlockingMatcher;
pub use iterative::IterativeMatcher;

use std::{
    fmt::{self, Display},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::{
    circuit::Circuit,
    config::{Algorithm, MatchConfig},
    error::{BoolMatchError, Result},
    lit::{AigLit, IndexedAssignment, InputAssignment, SatLit},
    matrix::{FullMatch, MatchPair, MatrixStats},
    miter::{Encoding, Miter, Side},
    oracle::{SatOracle, SolveStatus, VarisatOracle},
};

/// The oracle every strategy runs on.
pub(crate) type Oracle = VarisatOracle<'static>;

/// A valid match, with the sub-match still forcing equivalence when requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundMatch {
    pub pairs: FullMatch,
    pub core: Option<Vec<MatchPair>>,
}

impl Display for FoundMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_pairs(f, &self.pairs)?;
        if let Some(core) = &self.core {
            write!(f, " | core:")?;
            if core.is_empty() {
                write!(f, " (none)")?;
            } else {
                write!(f, " ")?;
                write_pairs(f, core)?;
            }
        }
        Ok(())
    }
}

fn write_pairs(f: &mut fmt::Formatter<'_>, pairs: &[MatchPair]) -> fmt::Result {
    for (i, pair) in pairs.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{pair}")?;
    }
    Ok(())
}

/// Receives every valid match as soon as it is validated.
pub trait MatchSink {
    fn emit(&mut self, found: &FoundMatch);
}

impl<F: FnMut(&FoundMatch)> MatchSink for F {
    fn emit(&mut self, found: &FoundMatch) {
        self(found)
    }
}

/// Counters of a run. Counts only ever cover fully processed steps, so a report taken
/// after a timeout or an interruption is consistent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchReport {
    pub valid_matches: u64,
    /// Permutations proposed by a matrix.
    pub candidates: u64,
    pub counterexamples: u64,
    /// Solve calls spent dropping literals.
    pub core_rounds: u64,
    pub timed_out: bool,
    pub interrupted: bool,
    pub elapsed: Duration,
    pub generalization_time: Duration,
    pub matrix: MatrixStats,
}

impl SearchReport {
    /// The run stopped before the enumeration was complete.
    pub fn is_partial(&self) -> bool {
        self.timed_out || self.interrupted
    }

    pub fn generalization_fraction(&self) -> f64 {
        if self.elapsed.is_zero() {
            0.0
        } else {
            self.generalization_time.as_secs_f64() / self.elapsed.as_secs_f64()
        }
    }
}

impl Display for SearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "valid matches: {}{}",
            self.valid_matches,
            if self.is_partial() { "+" } else { "" }
        )?;
        writeln!(
            f,
            "candidates: {}, counterexamples: {}, core rounds: {}",
            self.candidates, self.counterexamples, self.core_rounds
        )?;
        writeln!(f, "matrix: {}", self.matrix)?;
        write!(
            f,
            "time: {:.3}s ({:.1}% generalizing)",
            self.elapsed.as_secs_f64(),
            100.0 * self.generalization_fraction()
        )?;
        if self.timed_out {
            write!(f, " [timeout]")?;
        }
        if self.interrupted {
            write!(f, " [interrupted]")?;
        }
        Ok(())
    }
}

/// The closed set of search strategies.
pub enum BoolMatcher {
    IterativeTseitin(IterativeMatcher),
    IterativeDualRail(IterativeMatcher),
    BlockingTseitin(BlockingMatcher),
}

impl BoolMatcher {
    /// Checks the configuration and the circuits, then encodes them.
    pub fn new(src: &Circuit, trg: &Circuit, config: &MatchConfig) -> Result<Self> {
        BoolMatcher::with_initial_match(src, trg, config, &[])
    }

    /// Like [`BoolMatcher::new`], with some pairs of the permutation fixed upfront.
    pub fn with_initial_match(
        src: &Circuit,
        trg: &Circuit,
        config: &MatchConfig,
        initial: &[MatchPair],
    ) -> Result<Self> {
        config.validate()?;
        if src.num_inputs() != trg.num_inputs() {
            return Err(BoolMatchError::InputCountMismatch(
                src.num_inputs(),
                trg.num_inputs(),
            ));
        }
        src.output()?;
        trg.output()?;

        let matcher = match (config.algorithm, config.encoding) {
            (Algorithm::Iterative, Encoding::Tseitin) => BoolMatcher::IterativeTseitin(
                IterativeMatcher::new(src, trg, config, initial)?,
            ),
            (Algorithm::Iterative, Encoding::DualRail) => BoolMatcher::IterativeDualRail(
                IterativeMatcher::new(src, trg, config, initial)?,
            ),
            (Algorithm::Blocking, Encoding::Tseitin) => {
                BoolMatcher::BlockingTseitin(BlockingMatcher::new(src, trg, config, initial)?)
            }
            (Algorithm::Blocking, Encoding::DualRail) => {
                return Err(BoolMatchError::PreconditionViolation(
                    "blocking search requires tseitin encoding".to_string(),
                ));
            }
        };
        info!(
            "{} matcher over {} inputs ({} + {} gates)",
            matcher.name(),
            src.num_inputs(),
            src.ands().len(),
            trg.ands().len()
        );
        Ok(matcher)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BoolMatcher::IterativeTseitin(_) => "iterative-tseitin",
            BoolMatcher::IterativeDualRail(_) => "iterative-dual-rail",
            BoolMatcher::BlockingTseitin(_) => "blocking-tseitin",
        }
    }

    /// The flag checked between oracle calls. Setting it stops the run with a partial
    /// report.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        match self {
            BoolMatcher::IterativeTseitin(m) | BoolMatcher::IterativeDualRail(m) => {
                m.cancel_flag()
            }
            BoolMatcher::BlockingTseitin(m) => m.cancel_flag(),
        }
    }

    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        match self {
            BoolMatcher::IterativeTseitin(m) | BoolMatcher::IterativeDualRail(m) => {
                m.set_cancel_flag(flag)
            }
            BoolMatcher::BlockingTseitin(m) => m.set_cancel_flag(flag),
        }
    }

    /// The counters as of now.
    pub fn report(&self) -> &SearchReport {
        match self {
            BoolMatcher::IterativeTseitin(m) | BoolMatcher::IterativeDualRail(m) => m.report(),
            BoolMatcher::BlockingTseitin(m) => m.report(),
        }
    }

    /// Runs the search, emitting every valid match into `sink`.
    ///
    /// A timeout is not an error: the report comes back with `timed_out` set.
    pub fn run(&mut self, sink: &mut impl MatchSink) -> Result<SearchReport> {
        match self {
            BoolMatcher::IterativeTseitin(m) | BoolMatcher::IterativeDualRail(m) => m.run(sink),
            BoolMatcher::BlockingTseitin(m) => m.run(sink),
        }
    }
}

/// Turns the outcome of a search loop into the final report. Timeout is caught here and
/// only here.
fn finish(report: &mut SearchReport, res: Result<()>) -> Result<SearchReport> {
    match res {
        Ok(()) => {
            info!(
                "search done: {} valid matches in {:.3}s",
                report.valid_matches,
                report.elapsed.as_secs_f64()
            );
            Ok(report.clone())
        }
        Err(BoolMatchError::Timeout) => {
            report.timed_out = true;
            warn!(
                "timeout after {:.3}s, {} valid matches so far",
                report.elapsed.as_secs_f64(),
                report.valid_matches
            );
            Ok(report.clone())
        }
        Err(e) => Err(e),
    }
}

/// Checks the cancellation flag, marking the report when it is set.
fn is_cancelled(cancel: &AtomicBool, report: &mut SearchReport) -> bool {
    if cancel.load(Ordering::Relaxed) {
        if !report.interrupted {
            info!("search interrupted");
        }
        report.interrupted = true;
    }
    report.interrupted
}

/// Sat or Unsat as a Boolean, Timeout as an error. An inconclusive answer is impossible
/// on unbounded calls.
fn is_sat(status: SolveStatus, during: &'static str) -> Result<bool> {
    match status {
        SolveStatus::Sat => Ok(true),
        SolveStatus::Unsat => Ok(false),
        SolveStatus::Timeout => Err(BoolMatchError::Timeout),
        SolveStatus::Unknown => Err(BoolMatchError::SolverContractViolation(status, during)),
    }
}

/// Before asserting anything on the outputs, the encoded circuits must admit a model.
fn check_initial_model<O: SatOracle>(miter: &mut Miter<O>, assumptions: &[SatLit]) -> Result<()> {
    let status = miter.solve_under_assumptions(assumptions)?;
    if is_sat(status, "initial model")? {
        Ok(())
    } else {
        Err(BoolMatchError::InitialModelUnsat)
    }
}

/// The input-equality literals implied by a (possibly partial) match.
fn eq_assumptions<O: SatOracle>(
    miter: &mut Miter<O>,
    pairs: &[MatchPair],
    weak: bool,
) -> Result<Vec<SatLit>> {
    pairs
        .iter()
        .map(|pair| -> Result<SatLit> {
            let src = miter.inputs(Side::Source)[pair.src_index()];
            let trg = miter.inputs(Side::Target)[pair.trg_index()];
            if weak {
                Ok(miter.input_weak_eq_lit(src, trg, pair.is_negated())?)
            } else {
                Ok(miter.input_eq_lit(src, trg, pair.is_negated()))
            }
        })
        .collect()
}

/// Re-keys an assignment by input position. Entries that are not inputs are dropped.
fn indexed_assignment(assignment: &InputAssignment, inputs: &[AigLit]) -> IndexedAssignment {
    let position: FxHashMap<AigLit, usize> =
        inputs.iter().enumerate().map(|(pos, &lit)| (lit, pos)).collect();
    assignment
        .iter()
        .filter_map(|&(lit, val)| position.get(&lit).map(|&pos| (pos, val)))
        .collect()
}

/// The pairs of `candidate` at the positions kept by a core.
fn core_pairs(candidate: &[MatchPair], kept: Vec<usize>) -> Vec<MatchPair> {
    kept.into_iter().map(|k| candidate[k]).collect()
}
