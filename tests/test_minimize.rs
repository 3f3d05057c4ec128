use std::collections::{BTreeMap, BTreeSet};

use exeval::coverage::{self, CoverageRelation};
use exeval::minimize::{self, Algorithm};

fn relation(entries: &[(&str, &[&str])]) -> CoverageRelation {
    let mut relation = CoverageRelation::new();
    for (test, kills) in entries {
        let kills: BTreeSet<String> = kills.iter().map(|k| k.to_string()).collect();
        relation.insert(test.to_string(), kills);
    }
    relation
}

fn no_tiebreak() -> BTreeMap<String, i64> {
    BTreeMap::new()
}

#[test]
fn greedy_covers_every_killed_mutant() {
    let relation = relation(&[
        ("t1", &["p-1", "p-2"]),
        ("t2", &["p-2", "p-3"]),
        ("t3", &["p-3"]),
    ]);
    let selected = minimize::minimize(&relation, Algorithm::Greedy, &no_tiebreak());
    assert_eq!(selected, vec!["t1".to_string(), "t2".to_string()]);

    let mut covered = BTreeSet::new();
    for test in &selected {
        covered.extend(relation[test].iter().cloned());
    }
    assert_eq!(covered, coverage::union_kills(&relation));
}

#[test]
fn greedy_skips_tests_with_zero_marginal_gain() {
    // t3's only kill is already covered by t1, so it never appears.
    let relation = relation(&[
        ("t1", &["p-1", "p-2", "p-3"]),
        ("t2", &["p-4"]),
        ("t3", &["p-2"]),
    ]);
    let selected = minimize::minimize(&relation, Algorithm::Greedy, &no_tiebreak());
    assert_eq!(selected, vec!["t1".to_string(), "t2".to_string()]);
}

#[test]
fn greedy_breaks_ties_lexicographically() {
    let relation = relation(&[("tb", &["p-1"]), ("ta", &["p-2"])]);
    let selected = minimize::minimize(&relation, Algorithm::Greedy, &no_tiebreak());
    assert_eq!(selected, vec!["ta".to_string(), "tb".to_string()]);
}

#[test]
fn tiebreak_rank_overrides_lexicographic_order() {
    let relation = relation(&[("ta", &["p-1"]), ("tb", &["p-2"])]);
    let mut tiebreak = BTreeMap::new();
    tiebreak.insert("ta".to_string(), 5i64);
    tiebreak.insert("tb".to_string(), 1i64);
    let selected = minimize::minimize(&relation, Algorithm::Greedy, &tiebreak);
    assert_eq!(selected, vec!["tb".to_string(), "ta".to_string()]);
}

#[test]
fn equal_tiebreak_ranks_fall_back_to_identity() {
    let relation = relation(&[("tb", &["p-1"]), ("ta", &["p-2"])]);
    let mut tiebreak = BTreeMap::new();
    tiebreak.insert("ta".to_string(), 3i64);
    tiebreak.insert("tb".to_string(), 3i64);
    let selected = minimize::minimize(&relation, Algorithm::Greedy, &tiebreak);
    assert_eq!(selected, vec!["ta".to_string(), "tb".to_string()]);
}

#[test]
fn greedy_is_deterministic() {
    let relation = relation(&[
        ("t5", &["p-1", "p-4"]),
        ("t1", &["p-2", "p-3"]),
        ("t9", &["p-1", "p-2"]),
        ("t2", &["p-5"]),
    ]);
    let first = minimize::minimize(&relation, Algorithm::Greedy, &no_tiebreak());
    for _ in 0..10 {
        assert_eq!(
            minimize::minimize(&relation, Algorithm::Greedy, &no_tiebreak()),
            first
        );
    }
}

#[test]
fn order_based_keeps_each_test_that_adds_coverage() {
    let relation = relation(&[
        ("t1", &["p-1"]),
        ("t2", &["p-1"]),
        ("t3", &["p-1", "p-2"]),
    ]);
    let selected = minimize::minimize(&relation, Algorithm::OrderBased, &no_tiebreak());
    // t2 adds nothing after t1; t3 still adds p-2.
    assert_eq!(selected, vec!["t1".to_string(), "t3".to_string()]);
}

#[test]
fn order_based_preserves_coverage() {
    let relation = relation(&[
        ("t1", &["p-1", "p-2"]),
        ("t2", &["p-3"]),
        ("t3", &["p-2", "p-4"]),
    ]);
    let selected = minimize::minimize(&relation, Algorithm::OrderBased, &no_tiebreak());
    let mut covered = BTreeSet::new();
    for test in &selected {
        covered.extend(relation[test].iter().cloned());
    }
    assert_eq!(covered, coverage::union_kills(&relation));
}

#[test]
fn empty_relation_selects_nothing() {
    let relation = CoverageRelation::new();
    assert!(minimize::minimize(&relation, Algorithm::Greedy, &no_tiebreak()).is_empty());
    assert!(minimize::minimize(&relation, Algorithm::OrderBased, &no_tiebreak()).is_empty());
}

#[test]
fn selection_lines_are_sorted_with_kills() {
    let relation = relation(&[("tb", &["p-2", "p-1"]), ("ta", &["p-3"])]);
    let selected = vec!["tb".to_string(), "ta".to_string()];
    let lines = minimize::selection_to_lines(&relation, &selected);
    assert_eq!(
        lines,
        vec!["ta,p-3".to_string(), "tb,p-1,p-2".to_string()]
    );
}

#[test]
fn algorithm_names_round_trip() {
    for algorithm in Algorithm::ALL {
        assert_eq!(algorithm.name().parse::<Algorithm>().unwrap(), algorithm);
    }
    assert!("optimal".parse::<Algorithm>().is_err());
}
