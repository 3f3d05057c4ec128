use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::EvalError;

/// One decoded test-case entry from a structured execution report.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCaseOutcome {
    pub class_name: String,
    pub method_name: String,
    /// True when the entry carries a failure or error marker.
    pub failed: bool,
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Tests run: \d+, Failures: (\d+), Errors: (\d+)").unwrap())
}

fn summary_no_errors_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Two-space variant printed when a run aborts before the error
    // column: "Tests run: 4619,  Failures: 2654"
    RE.get_or_init(|| Regex::new(r"Tests run: \d+,  Failures: (\d+)").unwrap())
}

/// Count failed tests in a textual execution log by scanning summary
/// lines and summing Failures + Errors across all matches (suites that
/// run one module at a time print one summary per module). The
/// no-Errors variant is only consulted when the primary format never
/// appears. A missing log counts as zero failures.
pub fn count_failed_tests(log_content: &str) -> u32 {
    let mut failed = 0;
    let mut matched = false;
    for captures in summary_re().captures_iter(log_content) {
        let failures: u32 = captures[1].parse().unwrap_or(0);
        let errors: u32 = captures[2].parse().unwrap_or(0);
        failed += failures + errors;
        matched = true;
    }
    if matched {
        return failed;
    }
    for captures in summary_no_errors_re().captures_iter(log_content) {
        let failures: u32 = captures[1].parse().unwrap_or(0);
        failed += failures;
    }
    failed
}

pub fn count_failed_tests_in_file(log_path: &Path) -> u32 {
    match fs::read_to_string(log_path) {
        Ok(content) => count_failed_tests(&content),
        Err(_) => 0,
    }
}

/// Decode a structured inline-test report:
/// `{"testsuite": {"testcase": [...]}}`, where a single test case may
/// be an object rather than a one-element array, and a failing case
/// carries a `failure` or `error` member.
pub fn decode_test_cases(report: &serde_json::Value) -> Option<Vec<TestCaseOutcome>> {
    let testcase = report.get("testsuite")?.get("testcase")?;
    let cases: Vec<&serde_json::Value> = match testcase {
        serde_json::Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut outcomes = Vec::with_capacity(cases.len());
    for case in cases {
        outcomes.push(TestCaseOutcome {
            class_name: case
                .get("@classname")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            method_name: case
                .get("@name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            failed: case.get("failure").is_some() || case.get("error").is_some(),
        });
    }
    Some(outcomes)
}

pub fn decode_report_file(path: &Path) -> Result<Vec<TestCaseOutcome>, EvalError> {
    if !path.exists() {
        return Err(EvalError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    decode_test_cases(&report).ok_or(EvalError::MissingArtifact {
        path: path.to_path_buf(),
    })
}

/// Target statement line encoded in a generated test-class name:
/// `com.example.Foo_42Test` -> ("com.example.Foo", "42").
pub fn split_test_class_name(class_name: &str) -> Option<(&str, &str)> {
    let stripped = class_name.strip_suffix("Test")?;
    let (class, line) = stripped.rsplit_once('_')?;
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((class, line))
}

/// Inline-test line encoded in a generated test-method name:
/// `testLine28()` or `testLine28` -> "28".
pub fn inline_test_line(method_name: &str) -> Option<&str> {
    let line = method_name
        .strip_prefix("testLine")?
        .trim_end_matches("()");
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(line)
}
