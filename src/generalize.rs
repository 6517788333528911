//! Counterexample generalization.
//!
//! A counterexample is a pair of input assignments (source, target) under which the
//! outputs differ. Generalizing it widens inputs to don't-care while every completion of
//! the widened pair still has differing outputs, so that one blocking step excludes more
//! permutations. Two techniques compose:
//! - ternary simulation, cheap and structural, done on each circuit separately
//! - UNSAT cores on a dual miter asserting output *equality*: the concrete bits are
//!   assumptions, and any subset keeping the dual query UNSAT is still a counterexample.
//!
//! The same core machinery shrinks the equality assumptions of a valid match into a
//! (possibly empty) sub-match that still forces equivalence.

use std::time::{Duration, Instant};

use log::{debug, trace};
use thiserror::Error;

use crate::{
    circuit::{Circuit, CircuitError},
    lit::{InputAssignment, SatLit, TVal, remove_dont_cares},
    miter::{Encoding, Miter, MiterError, Side},
    oracle::{OracleError, SatOracle, SolveStatus},
    sim::{SimOrder, TernarySim},
};

/// Error returned when a generalization query breaks its contract.
#[derive(Debug, Error)]
pub enum GeneralizeError {
    /// The assumptions were expected to be UNSAT (a counterexample on the dual miter, or
    /// the equalities of a validated match).
    #[error("solver answered {0:?} on assumptions expected to be UNSAT")]
    NotUnsat(SolveStatus),

    /// UNSAT-core generalization needs a Tseitin-encoded dual miter.
    #[error("UNSAT-core generalization requires a Tseitin dual miter, got {0}")]
    DualNotTseitin(Encoding),

    #[error("{0}")]
    OracleError(#[from] OracleError),

    #[error("{0}")]
    MiterError(#[from] MiterError),

    #[error("{0}")]
    CircuitError(#[from] CircuitError),
}

/// Result of a core computation over an assumption list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Core {
    /// Positions (into the assumption list) still required, in increasing order.
    pub kept: Vec<usize>,
    /// Solve calls spent after the first one.
    pub rounds: u64,
    /// The deadline was hit; `kept` is the best core found so far.
    pub timed_out: bool,
}

/// Shrinks an UNSAT assumption list: first to the failed-assumption set of the oracle,
/// then, with `use_lit_drop`, by trying to drop each remaining literal from the last one
/// to the first.
///
/// A literal is dropped if the query stays UNSAT without it, and restored otherwise
/// (including when a bounded recheck is inconclusive). Without timeouts or inconclusive
/// rechecks the result is minimal: removing any kept literal makes the query SAT.
pub fn shrink_core(
    oracle: &mut impl SatOracle,
    assumptions: &[SatLit],
    use_lit_drop: bool,
    conflict_limit: u64,
) -> Result<Core, GeneralizeError> {
    let mut core = Core {
        kept: (0..assumptions.len()).collect(),
        rounds: 0,
        timed_out: false,
    };
    match oracle.solve_under_assumptions(assumptions)? {
        SolveStatus::Unsat => (),
        SolveStatus::Timeout => {
            core.timed_out = true;
            return Ok(core);
        }
        status => return Err(GeneralizeError::NotUnsat(status)),
    }
    core.kept.retain(|&i| oracle.is_assumption_required(i));
    trace!(
        "first core pass kept {} of {} assumptions",
        core.kept.len(),
        assumptions.len()
    );

    if !use_lit_drop {
        return Ok(core);
    }

    let mut i = core.kept.len();
    while i > 0 {
        i -= 1;
        let removed = core.kept.swap_remove(i);
        let lits: Vec<SatLit> = core.kept.iter().map(|&k| assumptions[k]).collect();
        oracle.set_conflict_limit(conflict_limit);
        core.rounds += 1;
        match oracle.solve_under_assumptions(&lits)? {
            SolveStatus::Unsat => (),
            status => {
                core.kept.push(removed);
                let last = core.kept.len() - 1;
                core.kept.swap(i, last);
                if status == SolveStatus::Timeout {
                    core.timed_out = true;
                    break;
                }
            }
        }
    }
    core.kept.sort_unstable();
    Ok(core)
}

/// Shrinks a counterexample with UNSAT cores on `dual`, a Tseitin miter asserting output
/// equality.
///
/// Don't-care entries are removed first. If either side has no concrete bit left, the
/// assignments are returned unchanged. Target literals are tried for dropping before
/// source literals. Values are never flipped.
pub fn unsat_core_generalize<O: SatOracle>(
    dual: &mut Miter<O>,
    src: &mut InputAssignment,
    trg: &mut InputAssignment,
    use_lit_drop: bool,
    conflict_limit: u64,
) -> Result<Core, GeneralizeError> {
    if dual.encoding() != Encoding::Tseitin {
        return Err(GeneralizeError::DualNotTseitin(dual.encoding()));
    }
    let mut src_bits = src.clone();
    let mut trg_bits = trg.clone();
    remove_dont_cares(&mut src_bits);
    remove_dont_cares(&mut trg_bits);
    if src_bits.is_empty() || trg_bits.is_empty() {
        return Ok(Core {
            kept: Vec::new(),
            rounds: 0,
            timed_out: false,
        });
    }

    let mut assumptions = Vec::with_capacity(src_bits.len() + trg_bits.len());
    for (bits, side) in [(&src_bits, Side::Source), (&trg_bits, Side::Target)] {
        for &(lit, val) in bits.iter() {
            let sat = dual.sat_lit(lit, side)?;
            assumptions.push(if val == TVal::True { sat } else { !sat });
        }
    }

    let core = shrink_core(dual.oracle_mut(), &assumptions, use_lit_drop, conflict_limit)?;
    if core.timed_out && core.rounds == 0 {
        return Ok(core);
    }
    let split = src_bits.len();
    *src = core
        .kept
        .iter()
        .filter(|&&k| k < split)
        .map(|&k| src_bits[k])
        .collect();
    *trg = core
        .kept
        .iter()
        .filter(|&&k| k >= split)
        .map(|&k| trg_bits[k - split])
        .collect();
    Ok(core)
}

/// What to do with counterexamples before blocking them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralizeOptions {
    pub use_cirsim: bool,
    pub sim_order: SimOrder,
    pub use_ucore: bool,
    pub use_lit_drop: bool,
    pub conflict_limit: u64,
}

/// Generalization state of one search: the simulators, the dual miter and the time
/// spent in there.
pub struct Generalizer<O: SatOracle> {
    sims: Option<(TernarySim, TernarySim)>,
    dual: Option<Miter<O>>,
    options: GeneralizeOptions,
    time: Duration,
    core_rounds: u64,
}

impl<O: SatOracle> Generalizer<O> {
    /// `make_oracle` is only called when UNSAT-core generalization is enabled, to host the
    /// dual miter.
    pub fn new(
        src: &Circuit,
        trg: &Circuit,
        options: GeneralizeOptions,
        make_oracle: impl FnOnce() -> O,
    ) -> Result<Self, GeneralizeError> {
        let sims = if options.use_cirsim {
            Some((
                TernarySim::new(src, options.sim_order)?,
                TernarySim::new(trg, options.sim_order)?,
            ))
        } else {
            None
        };
        let dual = if options.use_ucore {
            let mut dual = Miter::new(make_oracle(), src, trg, Encoding::Tseitin)?;
            dual.assert_output_diff(true);
            Some(dual)
        } else {
            None
        };
        Ok(Generalizer {
            sims,
            dual,
            options,
            time: Duration::ZERO,
            core_rounds: 0,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.sims.is_some() || self.dual.is_some()
    }

    /// Total time spent generalizing.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Solve calls spent dropping literals.
    pub fn core_rounds(&self) -> u64 {
        self.core_rounds
    }

    /// Widens a counterexample in place: simulation first, then UNSAT cores.
    ///
    /// Returns whether the dual oracle hit the deadline.
    pub fn generalize(
        &mut self,
        src: &mut InputAssignment,
        trg: &mut InputAssignment,
    ) -> Result<bool, GeneralizeError> {
        let start = Instant::now();
        let res = self.generalize_inner(src, trg);
        self.time += start.elapsed();
        res
    }

    fn generalize_inner(
        &mut self,
        src: &mut InputAssignment,
        trg: &mut InputAssignment,
    ) -> Result<bool, GeneralizeError> {
        if let Some((src_sim, trg_sim)) = self.sims.as_mut() {
            simulation_generalize(src_sim, src);
            simulation_generalize(trg_sim, trg);
        }
        let Some(dual) = self.dual.as_mut() else {
            return Ok(false);
        };
        let before = (src.len(), trg.len());
        let core = unsat_core_generalize(
            dual,
            src,
            trg,
            self.options.use_lit_drop,
            self.options.conflict_limit,
        )?;
        self.core_rounds += core.rounds;
        debug!(
            "core generalization: {}+{} -> {}+{} bits",
            before.0,
            before.1,
            src.len(),
            trg.len()
        );
        Ok(core.timed_out)
    }

    /// Shrinks the equality assumptions of a validated match on `oracle`, which must
    /// assert output difference. Returns the positions of the pairs still required, or
    /// None if the deadline was hit before anything was learned.
    pub fn minimize_match(
        &mut self,
        oracle: &mut impl SatOracle,
        eq_lits: &[SatLit],
    ) -> Result<Option<Vec<usize>>, GeneralizeError> {
        let start = Instant::now();
        let res = shrink_core(
            oracle,
            eq_lits,
            self.options.use_lit_drop,
            self.options.conflict_limit,
        );
        self.time += start.elapsed();
        let core = res?;
        self.core_rounds += core.rounds;
        if core.timed_out && core.rounds == 0 {
            return Ok(None);
        }
        Ok(Some(core.kept))
    }
}

/// Widens one side of a counterexample with ternary simulation. The assignment lists the
/// inputs of the simulated circuit in input order.
pub fn simulation_generalize(sim: &mut TernarySim, assignment: &mut InputAssignment) {
    let inputs = sim.circuit().inputs();
    let positions: Vec<Option<usize>> = assignment
        .iter()
        .map(|(lit, _)| inputs.iter().position(|input| input == lit))
        .collect();
    let mut values = vec![TVal::DontCare; inputs.len()];
    for (&(_, val), pos) in assignment.iter().zip(&positions) {
        if let Some(pos) = *pos {
            values[pos] = val;
        }
    }
    sim.maximize_dont_care(&mut values);
    for ((_, val), pos) in assignment.iter_mut().zip(positions) {
        if let Some(pos) = pos {
            *val = values[pos];
        }
    }
}
