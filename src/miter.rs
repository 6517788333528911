//! Encode a pair of circuits (source and target) into one SAT oracle: the mitter.
//!
//! To check that a mapping of target inputs onto source inputs makes the circuits equal:
//! - create a miter from both circuits with [`Miter::new`]
//! - assert that the outputs differ with [`Miter::assert_output_diff`]
//! - solve under the input-equality literals of the mapping ([`Miter::input_eq_lit`]).
//!
//! If the query is **UNSAT**, no input pattern distinguishes the circuits under this
//! mapping. If it is SAT, the model is a counterexample, read back with
//! [`Miter::assignment`].
//!
//! The source is encoded at offset 0 and the target at offset `source.max_index()`, so
//! the two variable spaces never collide.

use std::fmt::{self, Display};

use log::debug;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    circuit::{Circuit, CircuitError},
    cnf::{self, add_clause, write_and, write_or},
    lit::{AigIndex, AigLit, DualRail, InputAssignment, SatLit, TVal},
    oracle::{OracleError, SatOracle, SolveStatus},
};

/// How circuit nodes are mapped onto oracle variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// One variable per node.
    Tseitin,
    /// Two variables per node (positive and negative rail), allowing don't-cares.
    DualRail,
}

impl Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Tseitin => write!(f, "tseitin"),
            Encoding::DualRail => write!(f, "dual-rail"),
        }
    }
}

/// Which circuit of the pair a literal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

/// Error returned when a miter cannot be built or is used with the wrong encoding.
#[derive(Debug, Error)]
pub enum MiterError {
    /// Matching is only defined for circuits with the same number of inputs.
    #[error("circuits have different input counts: {0} vs {1}")]
    InputCountMismatch(usize, usize),

    /// The operation is only available under another encoding.
    #[error("{op} is not available with {encoding} encoding")]
    EncodingMismatch {
        op: &'static str,
        encoding: Encoding,
    },

    /// Just forwarding a [`CircuitError`] (eg a circuit without a single output).
    #[error("{0}")]
    CircuitError(#[from] CircuitError),
}

/// Emits the clauses of `circuit` into `oracle`, with its variables shifted by `offset`.
///
/// Any model of the oracle restricted to these variables is a consistent valuation of the
/// gates. Under [`Encoding::DualRail`], referenced nodes additionally cannot have both
/// rails set, and a node with neither rail set is a don't-care.
pub fn encode(oracle: &mut impl SatOracle, circuit: &Circuit, offset: u32, encoding: Encoding) {
    match encoding {
        Encoding::Tseitin => {
            for gate in circuit.ands() {
                write_and(
                    oracle,
                    gate.lhs.to_sat(offset),
                    gate.rhs0.to_sat(offset),
                    gate.rhs1.to_sat(offset),
                );
            }
            oracle.reserve_vars(circuit.max_index() + 1 + offset);
        }
        Encoding::DualRail => {
            for gate in circuit.ands() {
                let l = gate.lhs.to_dual_rail(offset);
                let r0 = gate.rhs0.to_dual_rail(offset);
                let r1 = gate.rhs1.to_dual_rail(offset);
                write_and(oracle, l.pos, r0.pos, r1.pos);
                // Any false operand makes the gate false.
                write_or(oracle, l.neg, r0.neg, r1.neg);
            }
            for index in 1..=circuit.max_index() {
                if circuit.is_index_referenced(index) {
                    let rails = AigLit::from_index(index).to_dual_rail(offset);
                    add_clause(oracle, &[!rails.pos, !rails.neg]);
                }
            }
            oracle.reserve_vars(2 * (circuit.max_index() + offset) + 1);
        }
    }
}

/// The two circuits encoded in one oracle, with a cache of input-equality literals.
pub struct Miter<O: SatOracle> {
    oracle: O,
    encoding: Encoding,
    target_offset: u32,
    src_inputs: Vec<AigLit>,
    trg_inputs: Vec<AigLit>,
    src_output: AigLit,
    trg_output: AigLit,
    /// Keyed by a canonical (source, target) pair, see [`Miter::input_eq_lit`].
    eq_cache: FxHashMap<(AigLit, AigLit), SatLit>,
    weak_eq_cache: FxHashMap<(AigLit, AigLit), SatLit>,
}

impl<O: SatOracle> Miter<O> {
    /// Encodes both circuits into `oracle`.
    ///
    /// This will fail if the circuits have different input counts or if one of them does
    /// not have exactly one output.
    pub fn new(
        mut oracle: O,
        src: &Circuit,
        trg: &Circuit,
        encoding: Encoding,
    ) -> Result<Self, MiterError> {
        if src.num_inputs() != trg.num_inputs() {
            return Err(MiterError::InputCountMismatch(
                src.num_inputs(),
                trg.num_inputs(),
            ));
        }
        let src_output = src.output()?;
        let trg_output = trg.output()?;

        let target_offset = src.max_index();
        encode(&mut oracle, src, 0, encoding);
        encode(&mut oracle, trg, target_offset, encoding);
        debug!(
            "{} miter: {} + {} gates, target offset {}",
            encoding,
            src.ands().len(),
            trg.ands().len(),
            target_offset
        );

        Ok(Miter {
            oracle,
            encoding,
            target_offset,
            src_inputs: src.inputs().to_vec(),
            trg_inputs: trg.inputs().to_vec(),
            src_output,
            trg_output,
            eq_cache: FxHashMap::default(),
            weak_eq_cache: FxHashMap::default(),
        })
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn inputs(&self, side: Side) -> &[AigLit] {
        match side {
            Side::Source => &self.src_inputs,
            Side::Target => &self.trg_inputs,
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.src_inputs.len()
    }

    fn offset(&self, side: Side) -> u32 {
        match side {
            Side::Source => 0,
            Side::Target => self.target_offset,
        }
    }

    fn check_encoding(&self, expected: Encoding, op: &'static str) -> Result<(), MiterError> {
        if self.encoding != expected {
            return Err(MiterError::EncodingMismatch {
                op,
                encoding: self.encoding,
            });
        }
        Ok(())
    }

    /// The oracle literal of `lit` under Tseitin encoding.
    pub fn sat_lit(&self, lit: AigLit, side: Side) -> Result<SatLit, MiterError> {
        self.check_encoding(Encoding::Tseitin, "single literal mapping")?;
        Ok(lit.to_sat(self.offset(side)))
    }

    /// The oracle literals of the inputs of one side, in input order (Tseitin only).
    pub fn input_sat_lits(&self, side: Side) -> Result<Vec<SatLit>, MiterError> {
        self.inputs(side)
            .iter()
            .map(|&lit| self.sat_lit(lit, side))
            .collect()
    }

    fn rails(&self, lit: AigLit, side: Side) -> DualRail {
        lit.to_dual_rail(self.offset(side))
    }

    /// Forces the outputs to disagree. With `negated`, the target output is complemented
    /// first, which turns the assertion into output equality.
    pub fn assert_output_diff(&mut self, negated: bool) {
        let trg_output = if negated {
            !self.trg_output
        } else {
            self.trg_output
        };
        match self.encoding {
            Encoding::Tseitin => {
                let s = self.src_output.to_sat(0);
                let t = trg_output.to_sat(self.target_offset);
                cnf::assert_not_equal(&mut self.oracle, s, t);
            }
            Encoding::DualRail => {
                // Both outputs must be Boolean and opposite.
                let s = self.rails(self.src_output, Side::Source);
                let t = self.rails(trg_output, Side::Target);
                let s1_t0 = cnf::new_and(&mut self.oracle, s.pos, t.neg);
                let s0_t1 = cnf::new_and(&mut self.oracle, s.neg, t.pos);
                add_clause(&mut self.oracle, &[s1_t0, s0_t1]);
            }
        }
    }

    /// A literal true iff source input `src` equals target input `trg` (complemented when
    /// `negated`). Gadgets are created once and cached.
    ///
    /// Under Tseitin encoding one cached gadget serves the four polarity combinations of
    /// the pair. Under dual-rail encoding a gadget serves the pair and its double
    /// complement, since a dual-rail equality cannot be complemented into an inequality.
    pub fn input_eq_lit(&mut self, src: AigLit, trg: AigLit, negated: bool) -> SatLit {
        match self.encoding {
            Encoding::Tseitin => {
                let key = (src.regular(), trg.regular());
                let eq = match self.eq_cache.get(&key) {
                    Some(&eq) => eq,
                    None => {
                        let eq = cnf::is_equal(
                            &mut self.oracle,
                            key.0.to_sat(0),
                            key.1.to_sat(self.target_offset),
                        );
                        self.eq_cache.insert(key, eq);
                        eq
                    }
                };
                let flip = src.is_complemented() ^ trg.is_complemented() ^ negated;
                if flip { !eq } else { eq }
            }
            Encoding::DualRail => {
                let key = Miter::<O>::dual_rail_key(src, trg, negated);
                if let Some(&eq) = self.eq_cache.get(&key) {
                    return eq;
                }
                let a = self.rails(key.0, Side::Source);
                let b = self.rails(key.1, Side::Target);
                let eq = cnf::is_equal_dual_rail(&mut self.oracle, a, b);
                self.eq_cache.insert(key, eq);
                eq
            }
        }
    }

    /// Like [`input_eq_lit`], but two don't-cares also count as equal (dual-rail only).
    ///
    /// [`input_eq_lit`]: Miter::input_eq_lit
    pub fn input_weak_eq_lit(
        &mut self,
        src: AigLit,
        trg: AigLit,
        negated: bool,
    ) -> Result<SatLit, MiterError> {
        self.check_encoding(Encoding::DualRail, "weak input equality")?;
        let key = Miter::<O>::dual_rail_key(src, trg, negated);
        if let Some(&eq) = self.weak_eq_cache.get(&key) {
            return Ok(eq);
        }
        let a = self.rails(key.0, Side::Source);
        let b = self.rails(key.1, Side::Target);
        let eq = cnf::is_weak_equal_dual_rail(&mut self.oracle, a, b);
        self.weak_eq_cache.insert(key, eq);
        Ok(eq)
    }

    /// `(a, b)` and `(!a, !b)` compare the same rails, so the source is kept positive.
    fn dual_rail_key(src: AigLit, trg: AigLit, negated: bool) -> (AigLit, AigLit) {
        let trg = if negated { !trg } else { trg };
        if src.is_complemented() {
            (!src, !trg)
        } else {
            (src, trg)
        }
    }

    pub fn solve(&mut self) -> Result<SolveStatus, OracleError> {
        self.oracle.solve()
    }

    pub fn solve_under_assumptions(
        &mut self,
        assumptions: &[SatLit],
    ) -> Result<SolveStatus, OracleError> {
        self.oracle.solve_under_assumptions(assumptions)
    }

    pub fn is_assumption_required(&self, index: usize) -> bool {
        self.oracle.is_assumption_required(index)
    }

    /// Value of `lit` in the last model.
    pub fn value(&self, lit: AigLit, side: Side) -> TVal {
        match self.encoding {
            Encoding::Tseitin => {
                TVal::from(self.oracle.is_lit_satisfied(lit.to_sat(self.offset(side))))
            }
            Encoding::DualRail => {
                let rails = self.rails(lit, side);
                DualRail::value(
                    self.oracle.is_lit_satisfied(rails.pos),
                    self.oracle.is_lit_satisfied(rails.neg),
                )
            }
        }
    }

    /// The input values of one side in the last model, in input order.
    pub fn assignment(&self, side: Side) -> InputAssignment {
        self.inputs(side)
            .iter()
            .map(|&lit| (lit, self.value(lit, side)))
            .collect()
    }

    /// Steers the oracle towards giving `val` to the input `lit`.
    ///
    /// Under Tseitin encoding a don't-care cannot be expressed and is ignored. Under
    /// dual-rail encoding a don't-care clears both rails.
    pub fn fix_input(&mut self, lit: AigLit, side: Side, val: TVal) {
        match self.encoding {
            Encoding::Tseitin => {
                let sat = lit.to_sat(self.offset(side));
                match val {
                    TVal::True => self.oracle.fix_polarity(sat),
                    TVal::False => self.oracle.fix_polarity(!sat),
                    _ => (),
                }
            }
            Encoding::DualRail => {
                let rails = self.rails(lit, side);
                let (pos, neg) = match val {
                    TVal::True => (rails.pos, !rails.neg),
                    TVal::False => (!rails.pos, rails.neg),
                    _ => (!rails.pos, !rails.neg),
                };
                self.oracle.fix_polarity(pos);
                self.oracle.fix_polarity(neg);
            }
        }
    }

    /// Bumps the branching score of the variables of the input `lit`.
    pub fn boost_input(&mut self, lit: AigLit, side: Side, value: f64) {
        match self.encoding {
            Encoding::Tseitin => {
                let sat = lit.to_sat(self.offset(side));
                self.oracle.boost_score(sat, value);
            }
            Encoding::DualRail => {
                let rails = self.rails(lit, side);
                self.oracle.boost_score(rails.pos, value);
                self.oracle.boost_score(rails.neg, value);
            }
        }
    }

    /// Index of the output node of one side, mostly for logging.
    pub fn output_index(&self, side: Side) -> AigIndex {
        match side {
            Side::Source => self.src_output.index(),
            Side::Target => self.trg_output.index(),
        }
    }
}
