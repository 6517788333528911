//! Clause gadgets shared by the circuit encoder and the match matrix.
//!
//! Every function writes directly into a [`SatOracle`]. Clauses go through constant
//! folding first: a clause holding [`SatLit::TRUE`] is dropped, and [`SatLit::FALSE`]
//! literals are removed from it. A clause left with only `FALSE` literals is kept as the
//! unit clause `FALSE`, so that it still makes the formula unsatisfiable.

use crate::{
    lit::{DualRail, SatLit},
    oracle::SatOracle,
};

/// Above this many literals, at-most-one splits the literals with an auxiliary variable
/// instead of emitting all pairs.
const AT_MOST_ONE_PAIRWISE_LIMIT: usize = 4;

/// Returns the clause once we got rid of `TRUE` and `FALSE` literals,
/// or None if it is obviously satisfied.
fn fold_constants(lits: &[SatLit]) -> Option<Vec<SatLit>> {
    if lits.contains(&SatLit::TRUE) {
        return None;
    }
    let clause: Vec<SatLit> = lits
        .iter()
        .copied()
        .filter(|&lit| lit != SatLit::FALSE)
        .collect();
    if clause.is_empty() {
        Some(vec![SatLit::FALSE])
    } else {
        Some(clause)
    }
}

/// Adds the clause after constant folding.
pub fn add_clause(oracle: &mut impl SatOracle, lits: &[SatLit]) {
    if let Some(clause) = fold_constants(lits) {
        oracle.add_clause(&clause);
    }
}

/// Add clauses that encode `l = AND(r1, r2)`.
pub fn write_and(oracle: &mut impl SatOracle, l: SatLit, r1: SatLit, r2: SatLit) {
    add_clause(oracle, &[l, !r1, !r2]);
    add_clause(oracle, &[!l, r1]);
    add_clause(oracle, &[!l, r2]);
}

/// Add clauses that encode `l = OR(r1, r2)`.
pub fn write_or(oracle: &mut impl SatOracle, l: SatLit, r1: SatLit, r2: SatLit) {
    write_and(oracle, !l, !r1, !r2);
}

/// Add clauses that encode `l = AND(rs)`.
pub fn write_and_many(oracle: &mut impl SatOracle, l: SatLit, rs: &[SatLit]) {
    let mut big = Vec::with_capacity(rs.len() + 1);
    big.push(l);
    for &r in rs {
        big.push(!r);
        add_clause(oracle, &[!l, r]);
    }
    add_clause(oracle, &big);
}

/// Add clauses that encode `l = OR(rs)`.
pub fn write_or_many(oracle: &mut impl SatOracle, l: SatLit, rs: &[SatLit]) {
    let negated: Vec<SatLit> = rs.iter().map(|&r| !r).collect();
    write_and_many(oracle, !l, &negated);
}

/// Fresh literal `v` with `v = AND(r1, r2)`.
pub fn new_and(oracle: &mut impl SatOracle, r1: SatLit, r2: SatLit) -> SatLit {
    let v = oracle.new_var();
    write_and(oracle, v, r1, r2);
    v
}

/// Fresh literal `v` with `v = (l1 == l2)`.
pub fn is_equal(oracle: &mut impl SatOracle, l1: SatLit, l2: SatLit) -> SatLit {
    let v = oracle.new_var();
    add_clause(oracle, &[!v, !l1, l2]);
    add_clause(oracle, &[!v, l1, !l2]);
    add_clause(oracle, &[v, l1, l2]);
    add_clause(oracle, &[v, !l1, !l2]);
    v
}

/// Add clauses that encode `l1 == l2`.
pub fn assert_equal(oracle: &mut impl SatOracle, l1: SatLit, l2: SatLit) {
    add_clause(oracle, &[!l1, l2]);
    add_clause(oracle, &[l1, !l2]);
}

/// Add clauses that encode `l1 != l2`, ie `XOR(l1, l2) = true`.
pub fn assert_not_equal(oracle: &mut impl SatOracle, l1: SatLit, l2: SatLit) {
    assert_equal(oracle, l1, !l2);
}

/// Fresh literal true iff both pairs hold the same Boolean value: both positive rails
/// or both negative rails are set. Two don't-cares are not equal.
pub fn is_equal_dual_rail(oracle: &mut impl SatOracle, a: DualRail, b: DualRail) -> SatLit {
    let both_pos = new_and(oracle, a.pos, b.pos);
    let both_neg = new_and(oracle, a.neg, b.neg);
    let v = oracle.new_var();
    write_or(oracle, v, both_pos, both_neg);
    v
}

/// Like [`is_equal_dual_rail`], but two don't-cares are also equal.
pub fn is_weak_equal_dual_rail(oracle: &mut impl SatOracle, a: DualRail, b: DualRail) -> SatLit {
    let both_pos = new_and(oracle, a.pos, b.pos);
    let both_neg = new_and(oracle, a.neg, b.neg);
    let both_dc = oracle.new_var();
    write_and_many(oracle, both_dc, &[!a.pos, !a.neg, !b.pos, !b.neg]);
    let v = oracle.new_var();
    write_or_many(oracle, v, &[both_pos, both_neg, both_dc]);
    v
}

/// At most one of `lits` is true.
///
/// Pairwise up to a few literals. Above that, the literals are split in two halves
/// sharing a fresh variable `y`: at most one of `first ∪ {y}` and at most one of
/// `second ∪ {¬y}`.
pub fn assert_at_most_one(oracle: &mut impl SatOracle, lits: &[SatLit]) {
    if lits.len() <= AT_MOST_ONE_PAIRWISE_LIMIT {
        for (i, &a) in lits.iter().enumerate() {
            for &b in &lits[i + 1..] {
                add_clause(oracle, &[!a, !b]);
            }
        }
        return;
    }

    let mid = lits.len() / 2;
    let y = oracle.new_var();

    let mut first = lits[..mid].to_vec();
    first.push(y);
    let mut second = lits[mid..].to_vec();
    second.push(!y);

    assert_at_most_one(oracle, &first);
    assert_at_most_one(oracle, &second);
}

/// Exactly one of `lits` is true.
pub fn assert_exactly_one(oracle: &mut impl SatOracle, lits: &[SatLit]) {
    add_clause(oracle, lits);
    assert_at_most_one(oracle, lits);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::oracle::{SolveStatus, VarisatOracle};

    fn vars(oracle: &mut impl SatOracle, n: usize) -> Vec<SatLit> {
        (0..n).map(|_| oracle.new_var()).collect()
    }

    fn fix(lit: SatLit, val: bool) -> SatLit {
        if val { lit } else { !lit }
    }

    #[test]
    fn fold_constants_test() {
        let a = SatLit::from(2);
        let b = SatLit::from(-3);
        assert!(fold_constants(&[a, SatLit::TRUE]).is_none());
        assert_eq!(fold_constants(&[a, SatLit::FALSE, b]).unwrap(), vec![a, b]);
        assert_eq!(
            fold_constants(&[SatLit::FALSE, SatLit::FALSE]).unwrap(),
            vec![SatLit::FALSE]
        );
    }

    #[test]
    fn write_and_or_test() {
        for (is_and, expected) in [(true, [false, false, false, true]), (false, [false, true, true, true])] {
            let mut oracle = VarisatOracle::new(None);
            let v = vars(&mut oracle, 3);
            if is_and {
                write_and(&mut oracle, v[0], v[1], v[2]);
            } else {
                write_or(&mut oracle, v[0], v[1], v[2]);
            }
            for (k, &out) in expected.iter().enumerate() {
                let assumptions = [fix(v[1], k & 1 != 0), fix(v[2], k & 2 != 0)];
                assert_eq!(
                    oracle.solve_under_assumptions(&assumptions).unwrap(),
                    SolveStatus::Sat
                );
                assert_eq!(oracle.is_lit_satisfied(v[0]), out);
            }
        }
    }

    #[test]
    fn write_many_test() {
        let mut oracle = VarisatOracle::new(None);
        let v = vars(&mut oracle, 5);
        write_and_many(&mut oracle, v[0], &v[2..]);
        write_or_many(&mut oracle, v[1], &v[2..]);
        for k in 0..8usize {
            let assumptions: Vec<SatLit> = (0..3).map(|i| fix(v[2 + i], k >> i & 1 != 0)).collect();
            assert_eq!(
                oracle.solve_under_assumptions(&assumptions).unwrap(),
                SolveStatus::Sat
            );
            assert_eq!(oracle.is_lit_satisfied(v[0]), k == 7);
            assert_eq!(oracle.is_lit_satisfied(v[1]), k != 0);
        }
    }

    #[test]
    fn is_equal_test() {
        let mut oracle = VarisatOracle::new(None);
        let v = vars(&mut oracle, 2);
        let eq = is_equal(&mut oracle, v[0], v[1]);
        for k in 0..4usize {
            let assumptions = [fix(v[0], k & 1 != 0), fix(v[1], k & 2 != 0)];
            oracle.solve_under_assumptions(&assumptions).unwrap();
            assert_eq!(oracle.is_lit_satisfied(eq), k == 0 || k == 3);
        }
    }

    #[test]
    fn assert_not_equal_test() {
        let mut oracle = VarisatOracle::new(None);
        let v = vars(&mut oracle, 2);
        assert_not_equal(&mut oracle, v[0], v[1]);
        assert_eq!(
            oracle.solve_under_assumptions(&[v[0], v[1]]).unwrap(),
            SolveStatus::Unsat
        );
        assert_eq!(
            oracle.solve_under_assumptions(&[v[0], !v[1]]).unwrap(),
            SolveStatus::Sat
        );
    }

    #[test]
    fn dual_rail_equal_test() {
        // (pos, neg) rail values for 0, 1 and X.
        let values = [(false, true), (true, false), (false, false)];
        for weak in [false, true] {
            let mut oracle = VarisatOracle::new(None);
            let v = vars(&mut oracle, 4);
            let a = DualRail { pos: v[0], neg: v[1] };
            let b = DualRail { pos: v[2], neg: v[3] };
            let eq = if weak {
                is_weak_equal_dual_rail(&mut oracle, a, b)
            } else {
                is_equal_dual_rail(&mut oracle, a, b)
            };
            for (i, &(ap, an)) in values.iter().enumerate() {
                for (j, &(bp, bn)) in values.iter().enumerate() {
                    let assumptions = [fix(a.pos, ap), fix(a.neg, an), fix(b.pos, bp), fix(b.neg, bn)];
                    assert_eq!(
                        oracle.solve_under_assumptions(&assumptions).unwrap(),
                        SolveStatus::Sat
                    );
                    let expected = (i == j && i < 2) || (weak && i == 2 && j == 2);
                    assert_eq!(oracle.is_lit_satisfied(eq), expected);
                }
            }
        }
    }

    #[test]
    fn exactly_one_test() {
        for n in 1..=9 {
            let mut oracle = VarisatOracle::new(None);
            let v = vars(&mut oracle, n);
            assert_exactly_one(&mut oracle, &v);

            let none: Vec<SatLit> = v.iter().map(|&l| !l).collect();
            assert_eq!(
                oracle.solve_under_assumptions(&none).unwrap(),
                SolveStatus::Unsat
            );
            for i in 0..n {
                assert_eq!(
                    oracle.solve_under_assumptions(&[v[i]]).unwrap(),
                    SolveStatus::Sat
                );
                for j in 0..n {
                    assert_eq!(oracle.is_lit_satisfied(v[j]), i == j);
                }
                for j in i + 1..n {
                    assert_eq!(
                        oracle.solve_under_assumptions(&[v[i], v[j]]).unwrap(),
                        SolveStatus::Unsat
                    );
                }
            }
        }
    }
}
