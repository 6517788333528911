//! Blocking search: exhaust the counterexamples first, then enumerate what survives.

use std::{
    sync::{Arc, atomic::AtomicBool},
    time::Instant,
};

use log::{debug, info, trace};

use crate::{
    circuit::Circuit,
    config::MatchConfig,
    error::{BoolMatchError, Result},
    generalize::Generalizer,
    lit::{SatLit, TVal, assignment_to_string},
    matrix::{BlockType, FullMatch, MatchMatrix, MatchPair},
    miter::{Encoding, Miter, Side},
    search::{
        FoundMatch, MatchSink, Oracle, SearchReport, check_initial_model, core_pairs,
        eq_assumptions, finish, indexed_assignment, is_cancelled, is_sat,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Blocking,
    Enumerating,
    Done,
}

/// The matrix cells are tied to the miter inputs, so one solve under the matrix selector
/// yields a (permutation, counterexample) pair. Every counterexample is blocked on that
/// matrix and replayed on a standalone valid-only matrix. Once the miter is UNSAT under
/// the selector, every permutation left in the valid-only matrix is a valid match.
pub struct BlockingMatcher {
    src: Circuit,
    trg: Circuit,
    miter: Miter<Oracle>,
    matrix: MatchMatrix,
    valid_oracle: Oracle,
    valid: MatchMatrix,
    generalizer: Generalizer<Oracle>,
    config: MatchConfig,
    deadline: Option<Instant>,
    /// Current bias of the max-value approximation.
    max_val: bool,
    phase: Phase,
    report: SearchReport,
    cancel: Arc<AtomicBool>,
}

impl BlockingMatcher {
    pub fn new(
        src: &Circuit,
        trg: &Circuit,
        config: &MatchConfig,
        initial: &[MatchPair],
    ) -> Result<Self> {
        let deadline = config.deadline();
        let mut miter = Miter::new(Oracle::with_deadline(deadline), src, trg, Encoding::Tseitin)?;
        let src_lits = miter.input_sat_lits(Side::Source)?;
        let trg_lits = miter.input_sat_lits(Side::Target)?;
        let matrix = MatchMatrix::with_input_lits(
            miter.oracle_mut(),
            &src_lits,
            &trg_lits,
            config.block_type,
            config.allow_neg_map,
            initial,
            true,
        )?;

        let mut valid_oracle = Oracle::with_deadline(deadline);
        // Only replays plans computed on the primary matrix.
        let valid = MatchMatrix::new(
            &mut valid_oracle,
            src.num_inputs(),
            BlockType::Dynamic,
            config.allow_neg_map,
            initial,
            false,
        )?;
        let generalizer = Generalizer::new(src, trg, config.generalize_options(), || {
            Oracle::with_deadline(deadline)
        })?;

        Ok(BlockingMatcher {
            src: src.clone(),
            trg: trg.clone(),
            miter,
            matrix,
            valid_oracle,
            valid,
            generalizer,
            config: config.clone(),
            deadline,
            max_val: config.max_val_init(),
            phase: Phase::Init,
            report: SearchReport::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = flag;
    }

    pub fn report(&self) -> &SearchReport {
        &self.report
    }

    pub fn run(&mut self, sink: &mut impl MatchSink) -> Result<SearchReport> {
        let start = Instant::now();
        let res = self.search(sink);
        self.report.elapsed += start.elapsed();
        self.report.generalization_time = self.generalizer.time();
        self.report.core_rounds = self.generalizer.core_rounds();
        self.report.matrix = self.matrix.stats();
        finish(&mut self.report, res)
    }

    fn search(&mut self, sink: &mut impl MatchSink) -> Result<()> {
        if self.phase == Phase::Init {
            let selector = self.selector()?;
            check_initial_model(&mut self.miter, &[selector])?;
            self.miter.assert_output_diff(false);
            self.phase = Phase::Blocking;
        }
        if self.phase == Phase::Blocking {
            info!("blocking counterexamples");
            if !self.block_all()? {
                return Ok(());
            }
            info!(
                "blocking done after {} counterexamples",
                self.report.counterexamples
            );
            self.phase = Phase::Enumerating;
            if self.config.stop_after_blocking {
                return Ok(());
            }
        }
        if self.phase == Phase::Enumerating {
            info!("enumerating valid matches");
            if self.enumerate(sink)? {
                self.phase = Phase::Done;
            }
        }
        Ok(())
    }

    fn selector(&self) -> Result<SatLit> {
        self.matrix.selector().ok_or_else(|| {
            BoolMatchError::PreconditionViolation("blocking matrix has no selector".to_string())
        })
    }

    /// Blocks counterexamples until the miter is UNSAT under the selector. Returns false
    /// when interrupted.
    fn block_all(&mut self) -> Result<bool> {
        let selector = self.selector()?;
        loop {
            if is_cancelled(&self.cancel, &mut self.report) {
                return Ok(false);
            }
            if self.config.use_max_val_approx {
                self.bias_inputs();
            }
            let status = self.miter.solve_under_assumptions(&[selector])?;
            if !is_sat(status, "counterexample search")? {
                return Ok(true);
            }
            self.report.counterexamples += 1;

            let mut src = self.miter.assignment(Side::Source);
            let mut trg = self.miter.assignment(Side::Target);
            trace!(
                "counterexample src [{}] trg [{}]",
                assignment_to_string(&src),
                assignment_to_string(&trg)
            );
            if self.generalizer.generalize(&mut src, &mut trg)? {
                debug!("generalization stopped at the deadline");
            }
            let src = indexed_assignment(&src, self.miter.inputs(Side::Source));
            let trg = indexed_assignment(&trg, self.miter.inputs(Side::Target));
            let plan =
                self.matrix
                    .block_matches_by_inputs_val(self.miter.oracle_mut(), &src, &trg)?;
            self.valid.apply_block_plan(&mut self.valid_oracle, &plan);
            trace!("blocked with {plan:?}");

            if self.config.use_adaptive_max_val {
                self.max_val = self.matrix.last_max_val();
            }
        }
    }

    /// Steers every input toward the current dominant value.
    fn bias_inputs(&mut self) {
        let val = TVal::from(self.max_val);
        for side in [Side::Source, Side::Target] {
            for lit in self.miter.inputs(side).to_vec() {
                self.miter.fix_input(lit, side, val);
                self.miter.boost_input(lit, side, self.config.max_val_boost);
            }
        }
    }

    /// Enumerates the valid-only matrix. Returns false when stopped early.
    fn enumerate(&mut self, sink: &mut impl MatchSink) -> Result<bool> {
        loop {
            if is_cancelled(&self.cancel, &mut self.report) {
                return Ok(false);
            }
            let status = self.valid.find_next_match(&mut self.valid_oracle)?;
            if !is_sat(status, "valid match enumeration")? {
                return Ok(true);
            }
            let candidate = self.valid.current_match(&self.valid_oracle);
            self.report.candidates += 1;
            let core = if self.config.minimize_valid_matches {
                self.match_core(&candidate)?
            } else {
                None
            };
            self.valid
                .eliminate_match(&mut self.valid_oracle, &candidate, false);
            self.report.valid_matches += 1;
            let found = FoundMatch {
                pairs: candidate,
                core,
            };
            debug!("valid match #{}: {found}", self.report.valid_matches);
            sink.emit(&found);
            if self.config.stop_at_first_valid_match {
                info!("stopping at the first valid match");
                return Ok(false);
            }
        }
    }

    /// Core of a valid match on a fresh miter, free of the matrix and blocking clauses.
    fn match_core(&mut self, candidate: &FullMatch) -> Result<Option<Vec<MatchPair>>> {
        let mut miter = Miter::new(
            Oracle::with_deadline(self.deadline),
            &self.src,
            &self.trg,
            Encoding::Tseitin,
        )?;
        miter.assert_output_diff(false);
        let assumptions = eq_assumptions(&mut miter, candidate, false)?;
        Ok(self
            .generalizer
            .minimize_match(miter.oracle_mut(), &assumptions)?
            .map(|kept| core_pairs(candidate, kept)))
    }
}
