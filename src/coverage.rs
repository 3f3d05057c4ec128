use std::collections::{BTreeMap, BTreeSet};

use crate::battery::Battery;
use crate::config::EvalConfig;
use crate::error::EvalError;
use crate::output;
use crate::registry::{self, KilledMutantEntry, Mutant};
use crate::report;

/// Test identity -> set of mutant keys it kills. Keys are unique and
/// kill sets are non-empty by construction: a test that kills nothing
/// is absent, never present with an empty set.
pub type CoverageRelation = BTreeMap<String, BTreeSet<String>>;

/// Stable mutant key, unique across projects: `<project>-<id>`.
pub fn mutant_key(project: &str, id: u32) -> String {
    format!("{project}-{id}")
}

/// Test identity without a battery tag: `<project>#<class>#<method>`.
pub fn test_identity(project: &str, class_name: &str, method_name: &str) -> String {
    format!("{project}#{class_name}#{method_name}")
}

/// Scan the structured per-mutant reports of one inline battery and
/// build the killed-mutants index. Mutants flagged as compilation
/// failures are excluded; a missing report is logged and skipped
/// (missing data, not Survived).
pub fn build_killed_index(
    config: &EvalConfig,
    project: &str,
    sha: &str,
    battery: Battery,
    mutants: &[Mutant],
) -> Result<Vec<KilledMutantEntry>, EvalError> {
    let mut entries = Vec::new();
    for mutant in mutants {
        if mutant.is_compile_failed() {
            continue;
        }
        let report_file = config.inline_report_file(
            project,
            sha,
            battery,
            &mutant.inline_test_file_name(),
            mutant.id,
        );
        let cases = match report::decode_report_file(&report_file) {
            Ok(cases) => cases,
            Err(EvalError::MissingArtifact { path }) => {
                output::print_skip(&format!("missing report: {}", path.display()));
                continue;
            }
            Err(e) => return Err(e),
        };
        for case in cases {
            if !case.failed {
                continue;
            }
            let simple_name = case.class_name.rsplit('.').next().unwrap_or(&case.class_name);
            let target_stmt_linenumber = report::split_test_class_name(simple_name)
                .map(|(_, line)| line.to_string())
                .unwrap_or_default();
            let inline_test_linenumber = report::inline_test_line(&case.method_name)
                .unwrap_or_default()
                .to_string();
            entries.push(KilledMutantEntry {
                test_class_name: case.class_name.clone(),
                test_method_name: case.method_name.clone(),
                target_stmt_linenumber,
                inline_test_linenumber,
                id: mutant.id,
                killed_mutant_file_path: mutant.file_path.clone(),
            });
        }
    }
    registry::save_killed_index(config, project, sha, battery, &entries)?;
    Ok(entries)
}

/// Fold a killed-mutants index into the per-test coverage relation.
/// Sets collapse duplicate kills: a mutant is never double-counted for
/// the same test.
pub fn relation_from_index(project: &str, entries: &[KilledMutantEntry]) -> CoverageRelation {
    let mut relation = CoverageRelation::new();
    for entry in entries {
        let test = test_identity(project, &entry.test_class_name, &entry.test_method_name);
        relation
            .entry(test)
            .or_default()
            .insert(mutant_key(project, entry.id));
    }
    relation
}

/// Invert an index into mutant id -> tests that killed it.
pub fn killers_by_mutant(project: &str, entries: &[KilledMutantEntry]) -> BTreeMap<u32, BTreeSet<String>> {
    let mut killers: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
    for entry in entries {
        killers
            .entry(entry.id)
            .or_default()
            .insert(test_identity(project, &entry.test_class_name, &entry.test_method_name));
    }
    killers
}

pub fn union_kills(relation: &CoverageRelation) -> BTreeSet<String> {
    relation.values().flatten().cloned().collect()
}

/// Text form of a relation: `<test>,<comma-joined sorted mutant keys>`
/// per line, lines sorted by test identity.
pub fn relation_to_lines(relation: &CoverageRelation) -> Vec<String> {
    relation
        .iter()
        .map(|(test, mutants)| {
            let mutants: Vec<&str> = mutants.iter().map(String::as_str).collect();
            format!("{},{}", test, mutants.join(","))
        })
        .collect()
}

pub fn relation_from_lines(lines: &[String]) -> CoverageRelation {
    let mut relation = CoverageRelation::new();
    for line in lines {
        let mut fields = line.split(',');
        let Some(test) = fields.next() else { continue };
        let mutants: BTreeSet<String> = fields
            .filter(|m| !m.is_empty())
            .map(|m| m.to_string())
            .collect();
        if !mutants.is_empty() {
            relation.insert(test.to_string(), mutants);
        }
    }
    relation
}
