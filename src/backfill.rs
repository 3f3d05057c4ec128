use std::collections::BTreeSet;

use crate::battery::Battery;
use crate::config::EvalConfig;
use crate::coverage::{self, CoverageRelation};
use crate::error::EvalError;
use crate::registry;
use crate::report;

/// Tag a test identity with the battery that contributed it.
fn tagged(test: &str, battery: Battery) -> String {
    format!("{test}#{battery}")
}

/// Cross-battery back-fill: every mutant the candidate battery failed
/// to kill but the baseline battery killed gets its baseline killer(s)
/// reinstated into the working relation, tagged with their origin. The
/// merged relation can therefore never have less kill power than the
/// baseline had on those mutants.
///
/// Writes the add-back and merged relation files and returns the
/// merged relation used for minimization.
pub fn merge_with_baseline_killers(
    config: &EvalConfig,
    project: &str,
    sha: &str,
) -> Result<CoverageRelation, EvalError> {
    let baseline_index =
        registry::load_killed_index(config, project, sha, Battery::InlineBaseline)?;
    let killers = coverage::killers_by_mutant(project, &baseline_index);

    let candidate_results =
        registry::load_results(config, project, sha, Battery::InlineCandidate)?;
    let mut addback = CoverageRelation::new();
    for record in &candidate_results {
        if record.killed {
            continue;
        }
        if let Some(tests) = killers.get(&record.id) {
            for test in tests {
                addback
                    .entry(test.clone())
                    .or_default()
                    .insert(coverage::mutant_key(project, record.id));
            }
        }
    }
    registry::write_lines(
        &config.addback_file(project, sha),
        &coverage::relation_to_lines(&addback),
    )?;

    let candidate_index =
        registry::load_killed_index(config, project, sha, Battery::InlineCandidate)?;
    let candidate_relation = coverage::relation_from_index(project, &candidate_index);

    let mut merged = CoverageRelation::new();
    for (test, mutants) in &candidate_relation {
        merged
            .entry(tagged(test, Battery::InlineCandidate))
            .or_default()
            .extend(mutants.iter().cloned());
    }
    for (test, mutants) in &addback {
        merged
            .entry(tagged(test, Battery::InlineBaseline))
            .or_default()
            .extend(mutants.iter().cloned());
    }
    registry::write_lines(
        &config.merged_relation_file(project, sha),
        &coverage::relation_to_lines(&merged),
    )?;
    Ok(merged)
}

/// Unmutated / uncovered-statement back-fill. Inline tests whose target
/// statement contributed no killed-mutants entry at all would be
/// silently dropped by mutant-centric minimization, so they are
/// appended to the final suite unconditionally.
///
/// Statements with zero generated mutants and statements whose mutants
/// every battery survived are deliberately indistinguishable here, as
/// in the original pipeline's output; callers should not read this set
/// as "statements without mutants" alone.
pub fn itests_without_mutants(
    config: &EvalConfig,
    project: &str,
    sha: &str,
) -> Result<Vec<String>, EvalError> {
    // Baseline-passing inline tests, one
    // `<project>;<class>;<target-line>;<itest-line>` per line.
    let passed = registry::read_lines(&config.passed_tests_file(Battery::InlineCandidate))?;

    let mut mutated_stmts = BTreeSet::new();
    for battery in Battery::INLINE {
        for entry in registry::load_killed_index(config, project, sha, battery)? {
            let simple = entry
                .test_class_name
                .rsplit('.')
                .next()
                .unwrap_or(&entry.test_class_name);
            let class_name = match report::split_test_class_name(simple) {
                Some((class, _)) => {
                    let package = entry
                        .test_class_name
                        .strip_suffix(simple)
                        .unwrap_or_default();
                    format!("{package}{class}")
                }
                None => entry.test_class_name.clone(),
            };
            mutated_stmts.insert(format!(
                "{};{};{}",
                project, class_name, entry.target_stmt_linenumber
            ));
        }
    }

    let mut uncovered = BTreeSet::new();
    for line in &passed {
        let fields: Vec<&str> = line.split(';').collect();
        if fields.len() < 3 || fields[0] != project {
            continue;
        }
        let stmt = format!("{};{};{}", fields[0], fields[1], fields[2]);
        if !mutated_stmts.contains(&stmt) {
            uncovered.insert(line.clone());
        }
    }

    let lines: Vec<String> = uncovered.into_iter().collect();
    registry::write_lines(&config.itests_without_mutants_file(project, sha), &lines)?;
    Ok(lines)
}

/// Assemble the final selected-suite file ("r2"): the minimized tests
/// decoded back to `<project>;<class>;<target-line>;<itest-line>;<battery>`
/// records, plus the unmutated-statement back-fill tagged as candidate
/// battery, bypassing minimization.
pub fn collect_final_suite(
    config: &EvalConfig,
    project: &str,
    sha: &str,
    algorithm: &str,
) -> Result<Vec<String>, EvalError> {
    let mut suite = Vec::new();

    let minimized = registry::read_lines(&config.minimized_file(project, sha, algorithm))?;
    for line in &minimized {
        // <project>#<class>_<line>Test#testLine<N>()#<battery>,<mutants...>
        let identity = line.split(',').next().unwrap_or(line);
        let fields: Vec<&str> = identity.split('#').collect();
        if fields.len() != 4 {
            continue;
        }
        let (test_project, class_with_line, method, battery) =
            (fields[0], fields[1], fields[2], fields[3]);
        let Some((class, target_line)) = report::split_test_class_name(class_with_line) else {
            continue;
        };
        let Some(itest_line) = report::inline_test_line(method) else {
            continue;
        };
        suite.push(format!(
            "{test_project};{class};{target_line};{itest_line};{battery}"
        ));
    }

    for line in itests_without_mutants(config, project, sha)? {
        suite.push(format!("{};{}", line, Battery::InlineCandidate));
    }

    registry::write_lines(&config.r2_file(project, sha, algorithm), &suite)?;
    Ok(suite)
}
