mod common;

use std::collections::BTreeSet;

use boolmatch::{
    AigLit, Circuit, CircuitBuilder, SolveStatus, VarisatOracle,
    matrix::{BlockType, MatchMatrix},
};
use common::*;
use proptest::prelude::*;

const INPUTS: usize = 3;

/// (lhs, lhs complemented, rhs, rhs complemented), indices taken modulo the nodes so far.
type Gate = (usize, bool, usize, bool);

fn gates() -> impl Strategy<Value = Vec<Gate>> {
    proptest::collection::vec((0..64usize, any::<bool>(), 0..64usize, any::<bool>()), 1..7)
}

/// Builds the gates on top of `leaves`, source input `i` being replaced by `leaves[i]`.
fn build_gates(
    b: &mut CircuitBuilder,
    leaves: Vec<AigLit>,
    gates: &[Gate],
    negate_output: bool,
) -> AigLit {
    let mut nodes = leaves;
    for &(x, x_neg, y, y_neg) in gates {
        let mut lhs = nodes[x % nodes.len()];
        let mut rhs = nodes[y % nodes.len()];
        if x_neg {
            lhs = !lhs;
        }
        if y_neg {
            rhs = !rhs;
        }
        nodes.push(b.add_and(lhs, rhs));
    }
    let out = nodes[nodes.len() - 1];
    if negate_output { !out } else { out }
}

/// A source circuit, and a target computing the same function once its inputs are
/// permuted by `perm` and complemented by `mask`.
fn circuit_pair(gates: &[Gate], negate_output: bool, perm: &[usize], mask: u8) -> (Circuit, Circuit) {
    let mut b = CircuitBuilder::new();
    let inputs: Vec<AigLit> = (0..INPUTS).map(|_| b.add_input()).collect();
    let out = build_gates(&mut b, inputs, gates, negate_output);
    b.add_output(out);
    let src = b.build().unwrap();

    let mut b = CircuitBuilder::new();
    let inputs: Vec<AigLit> = (0..INPUTS).map(|_| b.add_input()).collect();
    let leaves = (0..INPUTS)
        .map(|i| {
            let lit = inputs[perm[i]];
            if mask >> i & 1 != 0 { !lit } else { lit }
        })
        .collect();
    let out = build_gates(&mut b, leaves, gates, negate_output);
    b.add_output(out);
    let trg = b.build().unwrap();
    (src, trg)
}

fn permutation() -> impl Strategy<Value = Vec<usize>> {
    Just((0..INPUTS).collect::<Vec<_>>()).prop_shuffle()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn matches_brute_force(
        gates in gates(),
        negate_output in any::<bool>(),
        perm in permutation(),
        mask in 0u8..8,
        allow_neg_map in any::<bool>(),
        which in 0usize..16,
    ) {
        let mask = if allow_neg_map { mask } else { 0 };
        let (src, trg) = circuit_pair(&gates, negate_output, &perm, mask);
        let expected = brute_force(&src, &trg, allow_neg_map);
        let planted: SignedMatch = (0..INPUTS)
            .map(|i| boolmatch::MatchPair::new(i, perm[i], mask >> i & 1 != 0).signed())
            .collect();
        prop_assert!(expected.contains(&planted));

        let configs = configs(allow_neg_map);
        let config = &configs[which % configs.len()];
        let (report, found) = run(&src, &trg, config);
        prop_assert!(!report.is_partial());
        prop_assert_eq!(found.len(), expected.len());
        prop_assert_eq!(signed(&found), expected);
    }

    #[test]
    fn matrix_enumerates_bijections(size in 1usize..5, allow_neg_map in any::<bool>()) {
        let mut oracle = VarisatOracle::new(None);
        let mut matrix =
            MatchMatrix::new(&mut oracle, size, BlockType::Dynamic, allow_neg_map, &[], false)
                .unwrap();
        let mut seen = BTreeSet::new();
        while matrix.find_next_match(&mut oracle).unwrap() == SolveStatus::Sat {
            let current = matrix.current_match(&oracle);
            prop_assert_eq!(current.len(), size);
            let srcs: BTreeSet<usize> = current.iter().map(|p| p.src_index()).collect();
            let trgs: BTreeSet<usize> = current.iter().map(|p| p.trg_index()).collect();
            prop_assert_eq!(srcs.len(), size);
            prop_assert_eq!(trgs.len(), size);
            prop_assert!(allow_neg_map || current.iter().all(|p| !p.is_negated()));
            matrix.eliminate_match(&mut oracle, &current, false);
            prop_assert!(seen.insert(current));
        }
        let factorial: usize = (1..=size).product();
        let signs = if allow_neg_map { 1 << size } else { 1 };
        prop_assert_eq!(seen.len(), factorial * signs);
    }
}
