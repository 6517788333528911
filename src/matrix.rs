//! The permutation matrix: one pair of decision literals per (source input, target input)
//! cell, constrained so that every model is a bijection between source and target inputs.
//!
//! Cell `(x, y)` holds a positive literal (source input `x` maps onto target input `y`)
//! and a negative literal (source input `x` maps onto the complement of target input
//! `y`). Every row and every column has exactly one true literal.
//!
//! Blocking clauses may be guarded by a selector literal: they only hold while the
//! selector is assumed, and [`MatchMatrix::reset_eliminated_matches`] retires all of them
//! at once.

use std::fmt::{self, Display};

use log::{debug, trace};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    cnf::{add_clause, assert_exactly_one},
    lit::{IndexedAssignment, SatLit, TVal},
    oracle::{OracleError, SatOracle, SolveStatus},
};

/// Up to this many inputs outside the dominant value bucket, [`BlockType::Dynamic`]
/// eliminates permutations one by one instead of enforcing a single clause.
pub const DYNAMIC_BLOCK_MIN_GROUP_SIZE: usize = 4;

/// How a counterexample is turned into clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    /// One clause per invalidated permutation of the minority inputs.
    Eliminate,
    /// A single clause requiring some minority input to map onto a disagreeing input.
    Enforce,
    /// `Eliminate` for small minorities, `Enforce` otherwise.
    Dynamic,
}

/// A resolved cell: 1-based input indices, the relative sign encodes the polarity.
/// Same signs map positively, opposite signs map onto the complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchPair {
    src: i32,
    trg: i32,
}

impl MatchPair {
    /// Pair from 0-based input positions.
    pub fn new(src: usize, trg: usize, negated: bool) -> Self {
        let src = src as i32 + 1;
        let trg = trg as i32 + 1;
        MatchPair {
            src,
            trg: if negated { -trg } else { trg },
        }
    }

    /// Pair from signed 1-based indices.
    pub fn from_signed(src: i32, trg: i32) -> Self {
        if src == 0 || trg == 0 {
            panic!("Tried to create a MatchPair with index 0. Indices are 1-based.");
        }
        MatchPair { src, trg }
    }

    /// 0-based position of the source input.
    pub fn src_index(&self) -> usize {
        self.src.unsigned_abs() as usize - 1
    }

    /// 0-based position of the target input.
    pub fn trg_index(&self) -> usize {
        self.trg.unsigned_abs() as usize - 1
    }

    pub fn is_negated(&self) -> bool {
        (self.src > 0) != (self.trg > 0)
    }

    pub fn signed(&self) -> (i32, i32) {
        (self.src, self.trg)
    }
}

impl Display for MatchPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.src, self.trg)
    }
}

/// One pair per source input, in row order.
pub type FullMatch = Vec<MatchPair>;

/// Clauses derived from one counterexample, so that they can be replayed on another
/// matrix of the same size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockPlan {
    /// No permutation survives the counterexample.
    NoMatch,
    /// At least one of these cells must hold.
    Enforce(Vec<MatchPair>),
    /// None of these (partial) matches may hold.
    Eliminate(Vec<Vec<MatchPair>>),
}

/// Counters of the clauses added on top of the bijection constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixStats {
    pub blocked_clauses: u64,
    pub eliminated: u64,
    pub enforced: u64,
    pub no_match: u64,
}

impl Display for MatrixStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} blocking clauses ({} eliminated, {} enforced, {} no-match)",
            self.blocked_clauses, self.eliminated, self.enforced, self.no_match
        )
    }
}

/// Error returned when the matrix is misused.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// The pair refers to an input outside the matrix.
    #[error("match pair {pair} is out of range for a matrix of size {size}")]
    IndexOutOfRange { pair: MatchPair, size: usize },

    /// The matrix was built with input literals of the wrong length.
    #[error("expected {expected} input literals, got {got}")]
    InputCountMismatch { expected: usize, got: usize },

    /// Without negated maps, counterexamples must assign every input a Boolean value.
    #[error("counterexample holds don't-cares but negated maps are disallowed")]
    DontCareWithoutNegMap,

    /// A counterexample consistent with a permutation has as many ones on both sides.
    #[error("counterexample has {src} source inputs at {value} but {trg} target inputs")]
    BucketSizeMismatch { value: bool, src: usize, trg: usize },

    /// Elimination with negated maps needs fully Boolean counterexamples.
    #[error("elimination with negated maps requires counterexamples without don't-cares")]
    DontCareInNegElimination,

    /// The matrix was built without a selector.
    #[error("the matrix has no selector")]
    NoSelector,
}

/// The permutation matrix and its blocking operators.
///
/// The matrix does not own its oracle: the cells may live in an oracle shared with a
/// miter, so every operation takes the oracle as a parameter. Always pass the oracle the
/// matrix was built in.
#[derive(Debug, Clone)]
pub struct MatchMatrix {
    size: usize,
    /// (positive, negative) literal per cell, row-major.
    cells: Vec<(SatLit, SatLit)>,
    selector: Option<SatLit>,
    allow_neg_map: bool,
    block_type: BlockType,
    last_max_val: bool,
    stats: MatrixStats,
}

impl MatchMatrix {
    /// A matrix over fresh variables, for an oracle dedicated to permutation bookkeeping.
    ///
    /// The cells of `initial` are asserted before anything else.
    pub fn new(
        oracle: &mut impl SatOracle,
        size: usize,
        block_type: BlockType,
        allow_neg_map: bool,
        initial: &[MatchPair],
        use_selector: bool,
    ) -> Result<Self, MatrixError> {
        let cells = (0..size * size)
            .map(|_| (oracle.new_var(), oracle.new_var()))
            .collect();
        let mut matrix = MatchMatrix {
            size,
            cells,
            selector: None,
            allow_neg_map,
            block_type,
            last_max_val: true,
            stats: MatrixStats::default(),
        };
        matrix.assert_bijection(oracle, initial, use_selector)?;
        Ok(matrix)
    }

    /// A matrix whose cells imply equalities between the given input literals, so that
    /// solving the oracle under the selector ranges over (permutation, input values) pairs.
    ///
    /// A positive cell `(x, y)` implies `src[x] == trg[y]`, a negative cell implies
    /// `src[x] != trg[y]`.
    pub fn with_input_lits(
        oracle: &mut impl SatOracle,
        src_lits: &[SatLit],
        trg_lits: &[SatLit],
        block_type: BlockType,
        allow_neg_map: bool,
        initial: &[MatchPair],
        use_selector: bool,
    ) -> Result<Self, MatrixError> {
        let size = src_lits.len();
        if trg_lits.len() != size {
            return Err(MatrixError::InputCountMismatch {
                expected: size,
                got: trg_lits.len(),
            });
        }
        let mut cells = Vec::with_capacity(size * size);
        for &s in src_lits {
            for &t in trg_lits {
                let pos = oracle.new_var();
                let neg = oracle.new_var();
                add_clause(oracle, &[!pos, s, !t]);
                add_clause(oracle, &[!pos, !s, t]);
                add_clause(oracle, &[!neg, s, t]);
                add_clause(oracle, &[!neg, !s, !t]);
                cells.push((pos, neg));
            }
        }
        let mut matrix = MatchMatrix {
            size,
            cells,
            selector: None,
            allow_neg_map,
            block_type,
            last_max_val: true,
            stats: MatrixStats::default(),
        };
        matrix.assert_bijection(oracle, initial, use_selector)?;
        Ok(matrix)
    }

    fn assert_bijection(
        &mut self,
        oracle: &mut impl SatOracle,
        initial: &[MatchPair],
        use_selector: bool,
    ) -> Result<(), MatrixError> {
        let mut given_neg = vec![false; self.size * self.size];
        for &pair in initial {
            self.check_pair(pair)?;
            add_clause(oracle, &[self.cell_lit(pair)]);
            if pair.is_negated() {
                given_neg[pair.src_index() * self.size + pair.trg_index()] = true;
            }
        }

        if !self.allow_neg_map {
            for (&(_, neg), given) in self.cells.iter().zip(given_neg) {
                if !given {
                    add_clause(oracle, &[!neg]);
                }
            }
        }

        let n = self.size;
        for x in 0..n {
            let row: Vec<SatLit> = (0..n)
                .flat_map(|y| {
                    let (pos, neg) = self.cells[x * n + y];
                    [pos, neg]
                })
                .collect();
            assert_exactly_one(oracle, &row);
        }
        for y in 0..n {
            let col: Vec<SatLit> = (0..n)
                .flat_map(|x| {
                    let (pos, neg) = self.cells[x * n + y];
                    [pos, neg]
                })
                .collect();
            assert_exactly_one(oracle, &col);
        }

        if use_selector {
            self.selector = Some(oracle.new_var());
        }
        debug!(
            "match matrix {n}x{n}: {} initial pairs, negated maps {}",
            initial.len(),
            if self.allow_neg_map { "allowed" } else { "disallowed" }
        );
        Ok(())
    }

    fn check_pair(&self, pair: MatchPair) -> Result<(), MatrixError> {
        if pair.src_index() >= self.size || pair.trg_index() >= self.size {
            return Err(MatrixError::IndexOutOfRange {
                pair,
                size: self.size,
            });
        }
        Ok(())
    }

    fn cell_lit(&self, pair: MatchPair) -> SatLit {
        let (pos, neg) = self.cells[pair.src_index() * self.size + pair.trg_index()];
        if pair.is_negated() { neg } else { pos }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn selector(&self) -> Option<SatLit> {
        self.selector
    }

    pub fn allow_neg_map(&self) -> bool {
        self.allow_neg_map
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    /// The dominant value of the last counterexample blocked without negated maps.
    pub fn last_max_val(&self) -> bool {
        self.last_max_val
    }

    pub fn stats(&self) -> MatrixStats {
        self.stats
    }

    /// Asks for a match that has not been blocked yet.
    pub fn find_next_match(
        &self,
        oracle: &mut impl SatOracle,
    ) -> Result<SolveStatus, OracleError> {
        match self.selector {
            Some(selector) => oracle.solve_under_assumptions(&[selector]),
            None => oracle.solve(),
        }
    }

    /// Reads the match of the last model: per row, the first satisfied cell literal.
    pub fn current_match(&self, oracle: &impl SatOracle) -> FullMatch {
        let n = self.size;
        let mut current = Vec::with_capacity(n);
        for x in 0..n {
            for y in 0..n {
                let (pos, neg) = self.cells[x * n + y];
                if oracle.is_lit_satisfied(pos) {
                    current.push(MatchPair::new(x, y, false));
                    break;
                }
                if oracle.is_lit_satisfied(neg) {
                    current.push(MatchPair::new(x, y, true));
                    break;
                }
            }
        }
        current
    }

    /// Forbids this exact combination of cells. Guarded by the selector unless
    /// `ignore_selector` is set.
    pub fn eliminate_match(
        &mut self,
        oracle: &mut impl SatOracle,
        pairs: &[MatchPair],
        ignore_selector: bool,
    ) {
        let mut clause: Vec<SatLit> = pairs.iter().map(|&pair| !self.cell_lit(pair)).collect();
        if !ignore_selector {
            clause.extend(self.selector.map(|s| !s));
        }
        trace!("eliminate {pairs:?}");
        add_clause(oracle, &clause);
        self.stats.eliminated += 1;
        self.stats.blocked_clauses += 1;
    }

    pub fn eliminate_matches(&mut self, oracle: &mut impl SatOracle, matches: &[Vec<MatchPair>]) {
        for pairs in matches {
            self.eliminate_match(oracle, pairs, false);
        }
    }

    /// Requires at least one of the cells to hold (behind the selector).
    pub fn enforce_match(&mut self, oracle: &mut impl SatOracle, pairs: &[MatchPair]) {
        let mut clause: Vec<SatLit> = pairs.iter().map(|&pair| self.cell_lit(pair)).collect();
        clause.extend(self.selector.map(|s| !s));
        trace!("enforce one of {pairs:?}");
        add_clause(oracle, &clause);
        self.stats.enforced += 1;
        self.stats.blocked_clauses += 1;
    }

    /// No match may be found anymore (until the selector is reset, if there is one).
    pub fn assert_no_match(&mut self, oracle: &mut impl SatOracle) {
        let mut clause = vec![SatLit::FALSE];
        clause.extend(self.selector.map(|s| !s));
        add_clause(oracle, &clause);
        self.stats.no_match += 1;
        self.stats.blocked_clauses += 1;
    }

    /// Retires every clause added behind the current selector.
    pub fn reset_eliminated_matches(
        &mut self,
        oracle: &mut impl SatOracle,
    ) -> Result<(), MatrixError> {
        let selector = self.selector.ok_or(MatrixError::NoSelector)?;
        add_clause(oracle, &[!selector]);
        self.selector = Some(oracle.new_var());
        debug!("match selector reset");
        Ok(())
    }

    /// Blocks every match that the counterexample `(src, trg)` invalidates, and returns
    /// the clauses added so that they can be replayed on another matrix with
    /// [`apply_block_plan`].
    ///
    /// A match is invalidated when the counterexample is consistent with it: every pair of
    /// mapped inputs with Boolean values agrees (disagrees, for a negated pair).
    ///
    /// [`apply_block_plan`]: MatchMatrix::apply_block_plan
    pub fn block_matches_by_inputs_val(
        &mut self,
        oracle: &mut impl SatOracle,
        src: &IndexedAssignment,
        trg: &IndexedAssignment,
    ) -> Result<BlockPlan, MatrixError> {
        let plan = self.plan_block(src, trg)?;
        self.apply_block_plan(oracle, &plan);
        Ok(plan)
    }

    /// Adds the clauses of a plan computed on a matrix of the same size.
    pub fn apply_block_plan(&mut self, oracle: &mut impl SatOracle, plan: &BlockPlan) {
        match plan {
            BlockPlan::NoMatch => self.assert_no_match(oracle),
            BlockPlan::Enforce(pairs) => self.enforce_match(oracle, pairs),
            BlockPlan::Eliminate(matches) => self.eliminate_matches(oracle, matches),
        }
    }

    /// Computes the clauses for a counterexample without adding them.
    pub fn plan_block(
        &mut self,
        src: &IndexedAssignment,
        trg: &IndexedAssignment,
    ) -> Result<BlockPlan, MatrixError> {
        if !self.allow_neg_map {
            return self.plan_without_neg(src, trg);
        }
        // Elimination with negated maps enumerates all bijections, so it is kept for
        // small matrices only.
        match self.block_type {
            BlockType::Eliminate if self.size <= DYNAMIC_BLOCK_MIN_GROUP_SIZE => {
                self.plan_eliminate_for_neg(src, trg)
            }
            _ => Ok(self.plan_enforce_for_neg(src, trg)),
        }
    }

    /// Buckets the indices of one side by value.
    fn buckets(&self, assignment: &IndexedAssignment) -> Result<[Vec<usize>; 2], MatrixError> {
        let mut buckets: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for &(index, val) in assignment {
            let val = val.to_bool().ok_or(MatrixError::DontCareWithoutNegMap)?;
            buckets[val as usize].push(index);
        }
        if buckets[0].len() + buckets[1].len() != self.size {
            return Err(MatrixError::DontCareWithoutNegMap);
        }
        Ok(buckets)
    }

    /// Permuting inputs inside a (side, value) bucket preserves consistency, so only the
    /// inputs outside the largest bucket (the minority) need clauses.
    fn plan_without_neg(
        &mut self,
        src: &IndexedAssignment,
        trg: &IndexedAssignment,
    ) -> Result<BlockPlan, MatrixError> {
        let src_buckets = self.buckets(src)?;
        let trg_buckets = self.buckets(trg)?;
        for value in [false, true] {
            let (s, t) = (
                src_buckets[value as usize].len(),
                trg_buckets[value as usize].len(),
            );
            if s != t {
                return Err(MatrixError::BucketSizeMismatch {
                    value,
                    src: s,
                    trg: t,
                });
            }
        }

        // Ties go to 1.
        let max_val = src_buckets[1].len() >= src_buckets[0].len();
        self.last_max_val = max_val;
        let max_size = src_buckets[max_val as usize].len();
        if max_size == self.size {
            return Ok(BlockPlan::NoMatch);
        }

        let minority_size = self.size - max_size;
        let block_type = match self.block_type {
            BlockType::Dynamic if minority_size <= DYNAMIC_BLOCK_MIN_GROUP_SIZE => {
                BlockType::Eliminate
            }
            BlockType::Dynamic => BlockType::Enforce,
            other => other,
        };

        let min_val = !max_val;
        let src_min = &src_buckets[min_val as usize];
        let trg_min = &trg_buckets[min_val as usize];
        match block_type {
            BlockType::Enforce => {
                let pairs = src_min
                    .iter()
                    .flat_map(|&s| {
                        trg_buckets[max_val as usize]
                            .iter()
                            .map(move |&t| MatchPair::new(s, t, false))
                    })
                    .collect();
                Ok(BlockPlan::Enforce(pairs))
            }
            _ => {
                let matches = permutations(trg_min.len())
                    .into_iter()
                    .map(|perm| {
                        src_min
                            .iter()
                            .zip(perm)
                            .map(|(&s, k)| MatchPair::new(s, trg_min[k], false))
                            .collect()
                    })
                    .collect();
                Ok(BlockPlan::Eliminate(matches))
            }
        }
    }

    /// With negated maps, a Boolean (source, target) pair is consistent positively when
    /// the values agree and negatively otherwise. The clause requires one mapped pair to
    /// use the inconsistent polarity. Don't-care inputs are unconstrained.
    fn plan_enforce_for_neg(&self, src: &IndexedAssignment, trg: &IndexedAssignment) -> BlockPlan {
        let src: Vec<(usize, bool)> = src
            .iter()
            .filter_map(|&(i, v)| v.to_bool().map(|b| (i, b)))
            .collect();
        let trg: Vec<(usize, bool)> = trg
            .iter()
            .filter_map(|&(i, v)| v.to_bool().map(|b| (i, b)))
            .collect();
        if src.is_empty() || trg.is_empty() {
            return BlockPlan::NoMatch;
        }
        let pairs = src
            .iter()
            .flat_map(|&(s, vs)| trg.iter().map(move |&(t, vt)| MatchPair::new(s, t, vs == vt)))
            .collect();
        BlockPlan::Enforce(pairs)
    }

    /// Eliminates, for every bijection, the one polarity choice consistent with the
    /// counterexample. Exponential in the matrix size and restricted to fully Boolean
    /// counterexamples on matrices of at most [`DYNAMIC_BLOCK_MIN_GROUP_SIZE`] inputs.
    fn plan_eliminate_for_neg(
        &self,
        src: &IndexedAssignment,
        trg: &IndexedAssignment,
    ) -> Result<BlockPlan, MatrixError> {
        let values = |assignment: &IndexedAssignment| -> Result<Vec<bool>, MatrixError> {
            let mut values = vec![None; self.size];
            for &(i, v) in assignment {
                if i < self.size {
                    values[i] = v.to_bool();
                }
            }
            values
                .into_iter()
                .map(|v| v.ok_or(MatrixError::DontCareInNegElimination))
                .collect()
        };
        let src_vals = values(src)?;
        let trg_vals = values(trg)?;

        let matches = permutations(self.size)
            .into_iter()
            .map(|perm| {
                perm.into_iter()
                    .enumerate()
                    .map(|(s, t)| MatchPair::new(s, t, src_vals[s] != trg_vals[t]))
                    .collect()
            })
            .collect();
        Ok(BlockPlan::Eliminate(matches))
    }
}

/// All orderings of `0..n`, in lexicographic order.
fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut current: Vec<usize> = (0..n).collect();
    let mut all = vec![current.clone()];
    while next_permutation(&mut current) {
        all.push(current.clone());
    }
    all
}

fn next_permutation(items: &mut [usize]) -> bool {
    if items.len() < 2 {
        return false;
    }
    let mut i = items.len() - 1;
    while i > 0 && items[i - 1] >= items[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = items.len() - 1;
    while items[j] <= items[i - 1] {
        j -= 1;
    }
    items.swap(i - 1, j);
    items[i..].reverse();
    true
}

/// Translates an assignment keyed by literal values into one keyed by input position.
pub fn indexed(values: &[TVal]) -> IndexedAssignment {
    values.iter().copied().enumerate().collect()
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;
    use crate::oracle::VarisatOracle;

    fn all_matches(
        matrix: &mut MatchMatrix,
        oracle: &mut VarisatOracle,
    ) -> Vec<FullMatch> {
        let mut found = Vec::new();
        while matrix.find_next_match(oracle).unwrap() == SolveStatus::Sat {
            let m = matrix.current_match(oracle);
            matrix.eliminate_match(oracle, &m, false);
            found.push(m);
        }
        found
    }

    fn is_bijection(m: &FullMatch, n: usize) -> bool {
        let src: HashSet<usize> = m.iter().map(|p| p.src_index()).collect();
        let trg: HashSet<usize> = m.iter().map(|p| p.trg_index()).collect();
        m.len() == n && src.len() == n && trg.len() == n
    }

    fn tvals(bits: &[u8]) -> IndexedAssignment {
        indexed(
            &bits
                .iter()
                .map(|&b| match b {
                    0 => TVal::False,
                    1 => TVal::True,
                    _ => TVal::DontCare,
                })
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn match_pair_test() {
        let p = MatchPair::new(0, 2, true);
        assert_eq!(p.signed(), (1, -3));
        assert_eq!(p.src_index(), 0);
        assert_eq!(p.trg_index(), 2);
        assert!(p.is_negated());
        assert!(MatchPair::from_signed(-1, -3).signed() == (-1, -3));
        assert!(!MatchPair::from_signed(-1, -3).is_negated());
        assert_eq!(p.to_string(), "(1, -3)");
    }

    #[test]
    #[should_panic]
    fn match_pair_zero_test() {
        _ = MatchPair::from_signed(0, 1);
    }

    #[test]
    fn permutations_test() {
        assert_eq!(permutations(0), vec![Vec::<usize>::new()]);
        assert_eq!(permutations(1), vec![vec![0]]);
        assert_eq!(permutations(3).len(), 6);
        assert_eq!(permutations(3)[1], vec![0, 2, 1]);
        let set: HashSet<Vec<usize>> = permutations(4).into_iter().collect();
        assert_eq!(set.len(), 24);
    }

    #[test]
    fn bijection_test() {
        for n in 1..=4 {
            let mut oracle = VarisatOracle::new(None);
            let mut matrix =
                MatchMatrix::new(&mut oracle, n, BlockType::Dynamic, false, &[], false).unwrap();
            let found = all_matches(&mut matrix, &mut oracle);
            let expected = (1..=n).product::<usize>();
            assert_eq!(found.len(), expected);
            assert!(found.iter().all(|m| is_bijection(m, n)));
            assert!(found.iter().flatten().all(|p| !p.is_negated()));
            assert_eq!(found.iter().collect::<HashSet<_>>().len(), expected);
        }
    }

    #[test]
    fn negated_bijection_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 2, BlockType::Dynamic, true, &[], false).unwrap();
        let found = all_matches(&mut matrix, &mut oracle);
        assert_eq!(found.len(), 8);
        assert!(found.iter().all(|m| is_bijection(m, 2)));
    }

    #[test]
    fn initial_match_test() {
        let mut oracle = VarisatOracle::new(None);
        let initial = [MatchPair::new(0, 2, false)];
        let mut matrix =
            MatchMatrix::new(&mut oracle, 3, BlockType::Dynamic, false, &initial, false).unwrap();
        let found = all_matches(&mut matrix, &mut oracle);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|m| m[0] == initial[0]));

        // A negated initial pair is kept even when negated maps are disallowed.
        let mut oracle = VarisatOracle::new(None);
        let initial = [MatchPair::new(1, 0, true)];
        let mut matrix =
            MatchMatrix::new(&mut oracle, 2, BlockType::Dynamic, false, &initial, false).unwrap();
        let found = all_matches(&mut matrix, &mut oracle);
        assert_eq!(found, vec![vec![MatchPair::new(0, 1, false), initial[0]]]);

        let mut oracle = VarisatOracle::new(None);
        let res = MatchMatrix::new(
            &mut oracle,
            2,
            BlockType::Dynamic,
            false,
            &[MatchPair::new(0, 2, false)],
            false,
        );
        assert!(matches!(res, Err(MatrixError::IndexOutOfRange { .. })));
    }

    #[test]
    fn elimination_idempotence_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 3, BlockType::Dynamic, false, &[], true).unwrap();
        assert_eq!(matrix.find_next_match(&mut oracle).unwrap(), SolveStatus::Sat);
        let first = matrix.current_match(&oracle);
        matrix.eliminate_match(&mut oracle, &first, false);
        for _ in 0..5 {
            assert_eq!(matrix.find_next_match(&mut oracle).unwrap(), SolveStatus::Sat);
            let m = matrix.current_match(&oracle);
            assert_ne!(m, first);
            matrix.eliminate_match(&mut oracle, &m, false);
        }
        assert_eq!(matrix.find_next_match(&mut oracle).unwrap(), SolveStatus::Unsat);
        assert_eq!(matrix.stats().eliminated, 6);
    }

    #[test]
    fn selector_reset_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 2, BlockType::Dynamic, false, &[], true).unwrap();
        let before = all_matches(&mut matrix, &mut oracle);
        assert_eq!(before.len(), 2);

        matrix.reset_eliminated_matches(&mut oracle).unwrap();
        let after = all_matches(&mut matrix, &mut oracle);
        assert_eq!(
            after.iter().collect::<HashSet<_>>(),
            before.iter().collect::<HashSet<_>>()
        );
        assert_eq!(after.len(), 2);

        // Clauses added while ignoring the selector survive the reset.
        matrix.reset_eliminated_matches(&mut oracle).unwrap();
        matrix.eliminate_match(&mut oracle, &before[0], true);
        matrix.reset_eliminated_matches(&mut oracle).unwrap();
        assert_eq!(all_matches(&mut matrix, &mut oracle), vec![before[1].clone()]);
    }

    #[test]
    fn no_selector_reset_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 2, BlockType::Dynamic, false, &[], false).unwrap();
        assert!(matches!(
            matrix.reset_eliminated_matches(&mut oracle),
            Err(MatrixError::NoSelector)
        ));
    }

    #[test]
    fn assert_no_match_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 3, BlockType::Dynamic, false, &[], true).unwrap();
        matrix.assert_no_match(&mut oracle);
        assert_eq!(matrix.find_next_match(&mut oracle).unwrap(), SolveStatus::Unsat);
        matrix.reset_eliminated_matches(&mut oracle).unwrap();
        assert_eq!(matrix.find_next_match(&mut oracle).unwrap(), SolveStatus::Sat);
        assert_eq!(matrix.stats().no_match, 1);
    }

    #[test]
    fn enforce_match_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 3, BlockType::Dynamic, false, &[], false).unwrap();
        matrix.enforce_match(&mut oracle, &[MatchPair::new(0, 1, false), MatchPair::new(1, 1, false)]);
        let found = all_matches(&mut matrix, &mut oracle);
        assert_eq!(found.len(), 4);
        assert!(found.iter().all(|m| m[0].trg_index() == 1 || m[1].trg_index() == 1));
    }

    /// Matches consistent with the counterexample, without negated maps.
    fn consistent(m: &FullMatch, src: &[u8], trg: &[u8]) -> bool {
        m.iter().all(|p| src[p.src_index()] == trg[p.trg_index()])
    }

    #[test]
    fn block_without_neg_test() {
        let src = [1, 0, 0, 0];
        let trg = [0, 0, 1, 0];
        for block_type in [BlockType::Dynamic, BlockType::Eliminate, BlockType::Enforce] {
            let mut oracle = VarisatOracle::new(None);
            let mut matrix =
                MatchMatrix::new(&mut oracle, 4, block_type, false, &[], false).unwrap();
            let plan = matrix
                .block_matches_by_inputs_val(&mut oracle, &tvals(&src), &tvals(&trg))
                .unwrap();
            match block_type {
                BlockType::Enforce => assert_eq!(
                    plan,
                    BlockPlan::Enforce(vec![
                        MatchPair::new(0, 0, false),
                        MatchPair::new(0, 1, false),
                        MatchPair::new(0, 3, false)
                    ])
                ),
                _ => assert_eq!(
                    plan,
                    BlockPlan::Eliminate(vec![vec![MatchPair::new(0, 2, false)]])
                ),
            }
            assert!(!matrix.last_max_val());
            let found = all_matches(&mut matrix, &mut oracle);
            assert_eq!(found.len(), 18);
            assert!(found.iter().all(|m| !consistent(m, &src, &trg)));
        }
    }

    #[test]
    fn block_two_minority_test() {
        let src = [1, 0, 1, 0, 0];
        let trg = [0, 1, 0, 1, 0];
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 5, BlockType::Dynamic, false, &[], false).unwrap();
        let plan = matrix
            .block_matches_by_inputs_val(&mut oracle, &tvals(&src), &tvals(&trg))
            .unwrap();
        assert!(matches!(&plan, BlockPlan::Eliminate(ms) if ms.len() == 2));
        let found = all_matches(&mut matrix, &mut oracle);
        // 2! * 3! consistent permutations are gone.
        assert_eq!(found.len(), 120 - 12);
        assert!(found.iter().all(|m| !consistent(m, &src, &trg)));
    }

    #[test]
    fn block_plan_replay_test() {
        let src = tvals(&[1, 1, 0]);
        let trg = tvals(&[1, 0, 1]);
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 3, BlockType::Enforce, false, &[], true).unwrap();
        let mut other_oracle = VarisatOracle::new(None);
        let mut other =
            MatchMatrix::new(&mut other_oracle, 3, BlockType::Enforce, false, &[], false).unwrap();
        let plan = matrix
            .block_matches_by_inputs_val(&mut oracle, &src, &trg)
            .unwrap();
        other.apply_block_plan(&mut other_oracle, &plan);
        assert!(matrix.last_max_val());
        let found = all_matches(&mut matrix, &mut oracle);
        let found_other = all_matches(&mut other, &mut other_oracle);
        assert_eq!(found.len(), 4);
        assert_eq!(
            found.iter().collect::<HashSet<_>>(),
            found_other.iter().collect::<HashSet<_>>()
        );
    }

    #[test]
    fn block_all_same_value_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 3, BlockType::Dynamic, false, &[], true).unwrap();
        let plan = matrix
            .block_matches_by_inputs_val(&mut oracle, &tvals(&[0, 0, 0]), &tvals(&[0, 0, 0]))
            .unwrap();
        assert_eq!(plan, BlockPlan::NoMatch);
        assert!(!matrix.last_max_val());
        assert_eq!(matrix.find_next_match(&mut oracle).unwrap(), SolveStatus::Unsat);
    }

    #[test]
    fn block_errors_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 3, BlockType::Dynamic, false, &[], false).unwrap();
        assert!(matches!(
            matrix.plan_block(&tvals(&[1, 2, 0]), &tvals(&[1, 0, 0])),
            Err(MatrixError::DontCareWithoutNegMap)
        ));
        assert!(matches!(
            matrix.plan_block(&tvals(&[1, 1, 0]), &tvals(&[1, 0, 0])),
            Err(MatrixError::BucketSizeMismatch { .. })
        ));
    }

    #[test]
    fn enforce_for_neg_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 2, BlockType::Dynamic, true, &[], false).unwrap();
        let plan = matrix
            .block_matches_by_inputs_val(&mut oracle, &tvals(&[1, 2]), &tvals(&[2, 1]))
            .unwrap();
        assert_eq!(plan, BlockPlan::Enforce(vec![MatchPair::new(0, 1, true)]));
        // Every match leaving source input 0 and target input 1 unpaired is consistent
        // with some completion of the don't-cares.
        let found = all_matches(&mut matrix, &mut oracle);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|m| m[0] == MatchPair::new(0, 1, true)));

        let plan = matrix.plan_block(&tvals(&[2, 2]), &tvals(&[0, 1])).unwrap();
        assert_eq!(plan, BlockPlan::NoMatch);
    }

    #[test]
    fn eliminate_for_neg_test() {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, 2, BlockType::Eliminate, true, &[], false).unwrap();
        let plan = matrix
            .block_matches_by_inputs_val(&mut oracle, &tvals(&[1, 0]), &tvals(&[0, 1]))
            .unwrap();
        assert_eq!(
            plan,
            BlockPlan::Eliminate(vec![
                vec![MatchPair::new(0, 0, true), MatchPair::new(1, 1, true)],
                vec![MatchPair::new(0, 1, false), MatchPair::new(1, 0, false)],
            ])
        );
        assert_eq!(all_matches(&mut matrix, &mut oracle).len(), 6);
        assert!(matches!(
            matrix.plan_block(&tvals(&[1, 2]), &tvals(&[0, 1])),
            Err(MatrixError::DontCareInNegElimination)
        ));
    }

    #[test]
    fn eliminate_for_neg_large_test() {
        let n = DYNAMIC_BLOCK_MIN_GROUP_SIZE + 2;
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, n, BlockType::Eliminate, true, &[], false).unwrap();
        let src: Vec<u8> = (0..n).map(|i| (i % 2) as u8).collect();
        let trg: Vec<u8> = (0..n).map(|i| ((i + 1) % 2) as u8).collect();
        let plan = matrix
            .block_matches_by_inputs_val(&mut oracle, &tvals(&src), &tvals(&trg))
            .unwrap();
        match plan {
            BlockPlan::Enforce(pairs) => assert_eq!(pairs.len(), n * n),
            other => panic!("expected a single enforced clause, got {other:?}"),
        }
        assert_eq!(matrix.stats().blocked_clauses, 1);
        assert_eq!(matrix.stats().eliminated, 0);

        // Don't-cares are fine on the enforce path.
        let mut src = src;
        src[0] = 2;
        assert!(matches!(
            matrix.plan_block(&tvals(&src), &tvals(&trg)),
            Ok(BlockPlan::Enforce(_))
        ));
    }

    #[test]
    fn input_lits_test() {
        let mut oracle = VarisatOracle::new(None);
        let src: Vec<SatLit> = (0..2).map(|_| oracle.new_var()).collect();
        let trg: Vec<SatLit> = (0..2).map(|_| oracle.new_var()).collect();
        let matrix =
            MatchMatrix::with_input_lits(&mut oracle, &src, &trg, BlockType::Dynamic, true, &[], true)
                .unwrap();
        // Source input 0 maps onto the complement of target input 1.
        let cell = matrix.cell_lit(MatchPair::new(0, 1, true));
        let sel = matrix.selector().unwrap();
        assert_eq!(
            oracle.solve_under_assumptions(&[sel, cell, src[0], trg[1]]).unwrap(),
            SolveStatus::Unsat
        );
        assert_eq!(
            oracle.solve_under_assumptions(&[sel, cell, src[0]]).unwrap(),
            SolveStatus::Sat
        );
        assert!(oracle.is_lit_satisfied(!trg[1]));

        let res = MatchMatrix::with_input_lits(
            &mut oracle,
            &src,
            &trg[..1],
            BlockType::Dynamic,
            true,
            &[],
            true,
        );
        assert!(matches!(res, Err(MatrixError::InputCountMismatch { .. })));
    }
}
