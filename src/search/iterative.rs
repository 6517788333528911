//! Iterative search: the matrix proposes, the miter disposes.

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
    matrix::{FullMatch, MatchMatrix, MatchPair},
    miter::{Encoding, Miter, Side},
    oracle::SatOracle,
    search::{
        FoundMatch, MatchSink, Oracle, SearchReport, check_initial_model, core_pairs,
        eq_assumptions, finish, indexed_assignment, is_cancelled, is_sat,
    },
};

/// Candidates come from a matrix in a dedicated oracle. Each one is checked on the miter
/// (asserting output difference) under its input equalities: UNSAT proves it valid, a
/// model is a counterexample that blocks it and every permutation it also refutes.
pub struct IterativeMatcher {
    miter: Miter<Oracle>,
    matrix_oracle: Oracle,
    matrix: MatchMatrix,
    generalizer: Generalizer<Oracle>,
    config: MatchConfig,
    report: SearchReport,
    cancel: Arc<AtomicBool>,
    initialized: bool,
}

impl IterativeMatcher {
    pub fn new(
        src: &Circuit,
        trg: &Circuit,
        config: &MatchConfig,
        initial: &[MatchPair],
    ) -> Result<Self> {
        let deadline = config.deadline();
        let mut miter = Miter::new(Oracle::with_deadline(deadline), src, trg, config.encoding)?;
        if config.encoding == Encoding::DualRail && config.use_dual_rail_dc_bias {
            for side in [Side::Source, Side::Target] {
                for lit in miter.inputs(side).to_vec() {
                    miter.fix_input(lit, side, TVal::DontCare);
                }
            }
        }

        let mut matrix_oracle = Oracle::with_deadline(deadline);
        let matrix = MatchMatrix::new(
            &mut matrix_oracle,
            src.num_inputs(),
            config.block_type,
            config.allow_neg_map,
            initial,
            false,
        )?;
        let generalizer = Generalizer::new(src, trg, config.generalize_options(), || {
            Oracle::with_deadline(deadline)
        })?;

        Ok(IterativeMatcher {
            miter,
            matrix_oracle,
            matrix,
            generalizer,
            config: config.clone(),
            report: SearchReport::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            initialized: false,
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

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        check_initial_model(&mut self.miter, &[])?;
        // An initial partial match that is not part of any permutation.
        let status = self.matrix_oracle.solve()?;
        if !is_sat(status, "initial match")? {
            return Err(BoolMatchError::InitialModelUnsat);
        }
        self.miter.assert_output_diff(false);
        self.initialized = true;
        Ok(())
    }

    fn search(&mut self, sink: &mut impl MatchSink) -> Result<()> {
        self.initialize()?;
        info!("searching candidates");
        loop {
            if is_cancelled(&self.cancel, &mut self.report) {
                return Ok(());
            }
            let status = self.matrix.find_next_match(&mut self.matrix_oracle)?;
            if !is_sat(status, "candidate search")? {
                debug!("no candidate left");
                return Ok(());
            }
            let candidate = self.matrix.current_match(&self.matrix_oracle);
            self.report.candidates += 1;

            let weak = self.config.use_weak_input_eq;
            let assumptions = eq_assumptions(&mut self.miter, &candidate, weak)?;
            if is_cancelled(&self.cancel, &mut self.report) {
                return Ok(());
            }
            let status = self.miter.solve_under_assumptions(&assumptions)?;
            if is_sat(status, "candidate validation")? {
                self.block_counterexample()?;
            } else {
                self.accept(candidate, &assumptions, sink)?;
                if self.config.stop_at_first_valid_match {
                    info!("stopping at the first valid match");
                    return Ok(());
                }
            }
        }
    }

    fn accept(
        &mut self,
        candidate: FullMatch,
        assumptions: &[SatLit],
        sink: &mut impl MatchSink,
    ) -> Result<()> {
        let core = if self.config.minimize_valid_matches {
            self.generalizer
                .minimize_match(self.miter.oracle_mut(), assumptions)?
                .map(|kept| core_pairs(&candidate, kept))
        } else {
            None
        };
        self.matrix
            .eliminate_match(&mut self.matrix_oracle, &candidate, false);
        self.report.valid_matches += 1;
        let found = FoundMatch {
            pairs: candidate,
            core,
        };
        debug!("valid match #{}: {found}", self.report.valid_matches);
        sink.emit(&found);
        Ok(())
    }

    fn block_counterexample(&mut self) -> Result<()> {
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
        let plan = self
            .matrix
            .block_matches_by_inputs_val(&mut self.matrix_oracle, &src, &trg)?;
        trace!("blocked with {plan:?}");
        Ok(())
    }
}
