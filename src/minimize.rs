use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::coverage::{self, CoverageRelation};
use crate::error::EvalError;

/// Test-suite reduction heuristic. Every algorithm preserves full kill
/// coverage; only the selection order differs. Minimum set cover is
/// NP-hard, so none of these promises minimality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Largest-marginal-gain selection with deterministic tie-breaks.
    Greedy,
    /// Take tests in identity order, keeping each one that adds
    /// uncovered kills.
    OrderBased,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Greedy, Algorithm::OrderBased];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Greedy => "greedy",
            Algorithm::OrderBased => "order-based",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(Algorithm::Greedy),
            "order-based" => Ok(Algorithm::OrderBased),
            other => Err(EvalError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Reduce a coverage relation to a subset with the same total kill
/// power. Deterministic: identical relation and tie-break map always
/// produce the identical subset in the identical order.
pub fn minimize(
    relation: &CoverageRelation,
    algorithm: Algorithm,
    tiebreak: &BTreeMap<String, i64>,
) -> Vec<String> {
    match algorithm {
        Algorithm::Greedy => greedy(relation, tiebreak),
        Algorithm::OrderBased => order_based(relation),
    }
}

/// Classic greedy set cover. Ties on marginal gain go to the test with
/// the lower tie-break rank when both are ranked, otherwise to the
/// lexicographically smaller identity; insertion order is never
/// consulted (it is unspecified in the inputs).
fn greedy(relation: &CoverageRelation, tiebreak: &BTreeMap<String, i64>) -> Vec<String> {
    let mut uncovered = coverage::union_kills(relation);
    let mut remaining: BTreeMap<&str, &BTreeSet<String>> = relation
        .iter()
        .map(|(test, kills)| (test.as_str(), kills))
        .collect();
    let mut selected = Vec::new();

    while !uncovered.is_empty() {
        let mut best: Option<(&str, usize)> = None;
        for (&test, kills) in &remaining {
            let gain = kills.intersection(&uncovered).count();
            if gain == 0 {
                continue;
            }
            best = match best {
                None => Some((test, gain)),
                Some((best_test, best_gain)) => {
                    if gain > best_gain
                        || (gain == best_gain && wins_tie(test, best_test, tiebreak))
                    {
                        Some((test, gain))
                    } else {
                        Some((best_test, best_gain))
                    }
                }
            };
        }
        // A test with zero remaining uncovered kills is never selected.
        let Some((test, _)) = best else { break };
        if let Some(kills) = remaining.remove(test) {
            for kill in kills {
                uncovered.remove(kill);
            }
        }
        selected.push(test.to_string());
    }
    selected
}

fn wins_tie(candidate: &str, incumbent: &str, tiebreak: &BTreeMap<String, i64>) -> bool {
    match (tiebreak.get(candidate), tiebreak.get(incumbent)) {
        (Some(a), Some(b)) if a != b => a < b,
        _ => candidate < incumbent,
    }
}

fn order_based(relation: &CoverageRelation) -> Vec<String> {
    let mut uncovered = coverage::union_kills(relation);
    let mut selected = Vec::new();
    for (test, kills) in relation {
        if kills.iter().any(|k| uncovered.contains(k)) {
            for kill in kills {
                uncovered.remove(kill);
            }
            selected.push(test.clone());
        }
        if uncovered.is_empty() {
            break;
        }
    }
    selected
}

/// Project the selection back onto the relation and render storage
/// lines `<test>,<sorted mutant keys>`, sorted lexicographically by
/// test identity for reproducibility.
pub fn selection_to_lines(relation: &CoverageRelation, selected: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = selected
        .iter()
        .filter_map(|test| {
            relation.get(test).map(|kills| {
                let kills: Vec<&str> = kills.iter().map(String::as_str).collect();
                format!("{},{}", test, kills.join(","))
            })
        })
        .collect();
    lines.sort();
    lines
}
