#![allow(dead_code)]

use std::collections::BTreeSet;

use boolmatch::{
    AigLit, BoolMatcher, Circuit, CircuitBuilder, FoundMatch, MatchConfig, MatchPair,
    SearchReport,
};

pub type SignedMatch = Vec<(i32, i32)>;

pub fn asset(name: &str) -> Circuit {
    Circuit::from_file(format!("{}/assets/circuits/{name}", env!("CARGO_MANIFEST_DIR"))).unwrap()
}

/// A single-output circuit over `n` inputs built from a closure.
pub fn build(n: usize, f: impl FnOnce(&mut CircuitBuilder, &[AigLit]) -> AigLit) -> Circuit {
    let mut b = CircuitBuilder::new();
    let inputs: Vec<AigLit> = (0..n).map(|_| b.add_input()).collect();
    let o = f(&mut b, &inputs);
    b.add_output(o);
    b.build().unwrap()
}

pub fn xor3() -> Circuit {
    build(3, |b, i| {
        let x = b.add_xor(i[0], i[1]);
        b.add_xor(x, i[2])
    })
}

pub fn maj3() -> Circuit {
    build(3, |b, i| {
        let ab = b.add_and(i[0], i[1]);
        let bc = b.add_and(i[1], i[2]);
        let ca = b.add_and(i[2], i[0]);
        let x = b.add_or(ab, bc);
        b.add_or(x, ca)
    })
}

fn next_permutation(items: &mut [usize]) -> bool {
    let n = items.len();
    if n < 2 {
        return false;
    }
    let mut i = n - 1;
    while i > 0 && items[i - 1] >= items[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = n - 1;
    while items[j] <= items[i - 1] {
        j -= 1;
    }
    items.swap(i - 1, j);
    items[i..].reverse();
    true
}

/// Every valid (signed) permutation, by exhaustive evaluation.
pub fn brute_force(src: &Circuit, trg: &Circuit, allow_neg_map: bool) -> BTreeSet<SignedMatch> {
    let n = src.num_inputs();
    let mut found = BTreeSet::new();
    let mut perm: Vec<usize> = (0..n).collect();
    loop {
        let masks = if allow_neg_map { 1usize << n } else { 1 };
        for mask in 0..masks {
            let valid = (0..1usize << n).all(|k| {
                let x: Vec<bool> = (0..n).map(|i| k >> i & 1 != 0).collect();
                let mut y = vec![false; n];
                for i in 0..n {
                    y[perm[i]] = x[i] ^ (mask >> i & 1 != 0);
                }
                src.evaluate(&x) == trg.evaluate(&y)
            });
            if valid {
                found.insert(
                    (0..n)
                        .map(|i| MatchPair::new(i, perm[i], mask >> i & 1 != 0).signed())
                        .collect(),
                );
            }
        }
        if !next_permutation(&mut perm) {
            break;
        }
    }
    found
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn run(src: &Circuit, trg: &Circuit, config: &MatchConfig) -> (SearchReport, Vec<FoundMatch>) {
    init_logging();
    let mut matcher = BoolMatcher::new(src, trg, config).unwrap();
    let mut found = Vec::new();
    let report = matcher
        .run(&mut |m: &FoundMatch| found.push(m.clone()))
        .unwrap();
    assert_eq!(report.valid_matches as usize, found.len());
    (report, found)
}

pub fn signed(found: &[FoundMatch]) -> BTreeSet<SignedMatch> {
    found
        .iter()
        .map(|m| m.pairs.iter().map(|p| p.signed()).collect())
        .collect()
}

pub fn config(toml: &str) -> MatchConfig {
    let mut config: MatchConfig = toml.parse().unwrap();
    config.timeout_secs = 0;
    config
}

/// Configurations covering the three strategies and the generalization modes.
pub fn configs(allow_neg_map: bool) -> Vec<MatchConfig> {
    let toml: &[&str] = if allow_neg_map {
        &[
            "allow_neg_map = true",
            "allow_neg_map = true\nuse_cirsim = true\nuse_ucore = true",
            "allow_neg_map = true\nuse_ucore = true\nuse_lit_drop = false\nblock_type = \"enforce\"",
            "allow_neg_map = true\nuse_cirsim = true\nsim_order = \"output-first\"",
            "allow_neg_map = true\nblock_type = \"eliminate\"",
            "allow_neg_map = true\nencoding = \"dual-rail\"",
            "allow_neg_map = true\nencoding = \"dual-rail\"\nuse_weak_input_eq = true\nuse_dual_rail_dc_bias = true",
            "allow_neg_map = true\nencoding = \"dual-rail\"\nuse_ucore = true\nuse_cirsim = true",
            "allow_neg_map = true\nalgorithm = \"blocking\"",
            "allow_neg_map = true\nalgorithm = \"blocking\"\nuse_ucore = true\nuse_cirsim = true",
            "allow_neg_map = true\nalgorithm = \"blocking\"\nblock_type = \"eliminate\"",
        ]
    } else {
        &[
            "",
            "block_type = \"eliminate\"",
            "block_type = \"enforce\"",
            "encoding = \"dual-rail\"",
            "algorithm = \"blocking\"",
            "algorithm = \"blocking\"\nblock_type = \"enforce\"",
            "algorithm = \"blocking\"\nuse_max_val_approx = true",
            "algorithm = \"blocking\"\nuse_max_val_approx = true\nuse_adaptive_max_val = false\nmax_val_init = 0",
        ]
    };
    toml.iter().map(|t| config(t)).collect()
}

/// Runs every configuration and checks the result against brute force.
pub fn check_all(src: &Circuit, trg: &Circuit, allow_neg_map: bool) -> BTreeSet<SignedMatch> {
    let expected = brute_force(src, trg, allow_neg_map);
    for config in configs(allow_neg_map) {
        let (report, found) = run(src, trg, &config);
        assert!(!report.is_partial());
        assert_eq!(signed(&found), expected, "{config:?}");
        assert_eq!(found.len(), expected.len(), "duplicates with {config:?}");
    }
    expected
}
