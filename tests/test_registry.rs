use std::fs;
use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;

use exeval::battery::Battery;
use exeval::config::EvalConfig;
use exeval::error::EvalError;
use exeval::executor::ExecutionOutcome;
use exeval::registry::{self, Mutant, MutantRecord};

const PROJECT: &str = "acme-core";
const SHA: &str = "deadbeef";

#[test]
fn mutant_deserializes_wire_field_names() {
    // The registry files spell the original-code key "orginal_code".
    let data = json!([{
        "id": 3,
        "orginal_code": "a + b",
        "mutated_code": "a - b",
        "filepath": "src/main/java/com/acme/Calc.java",
        "linenumber": 12
    }]);
    let mutants: Vec<Mutant> = serde_json::from_value(data).unwrap();
    assert_eq!(mutants[0].id, 3);
    assert_eq!(mutants[0].original_code, "a + b");
    assert_eq!(mutants[0].line_number, 12);
    assert_eq!(mutants[0].compilation_failure, None);
    assert!(!mutants[0].is_compile_failed());
}

#[test]
fn mutant_serializes_back_to_wire_field_names() {
    let mutant = Mutant {
        id: 3,
        original_code: "a + b".to_string(),
        mutated_code: "a - b".to_string(),
        file_path: PathBuf::from("src/Calc.java"),
        line_number: 12,
        compilation_failure: None,
    };
    let value = serde_json::to_value(&mutant).unwrap();
    assert_eq!(value["orginal_code"], "a + b");
    assert_eq!(value["filepath"], "src/Calc.java");
    assert_eq!(value["linenumber"], 12);
    // The flag is omitted entirely until first set.
    assert!(value.get("compilation_failure").is_none());
}

#[test]
fn mutant_helpers_derive_inline_test_names() {
    let mutant = Mutant {
        id: 1,
        original_code: String::new(),
        mutated_code: String::new(),
        file_path: PathBuf::from("src/main/java/com/acme/Calc.java"),
        line_number: 42,
        compilation_failure: None,
    };
    assert_eq!(mutant.class_stem(), "Calc");
    assert_eq!(mutant.inline_test_file_name(), "Calc_42Test.java");
}

#[test]
fn registry_round_trips_with_updated_flags() {
    let root = TempDir::new().unwrap();
    let config = EvalConfig::new(root.path());
    let mut mutants = vec![Mutant {
        id: 1,
        original_code: "x".to_string(),
        mutated_code: "y".to_string(),
        file_path: PathBuf::from("src/Calc.java"),
        line_number: 1,
        compilation_failure: None,
    }];
    registry::save_mutants(&config, PROJECT, SHA, &mutants).unwrap();

    mutants[0].compilation_failure = Some(true);
    registry::save_mutants(&config, PROJECT, SHA, &mutants).unwrap();

    let loaded = registry::load_mutants(&config, PROJECT, SHA).unwrap();
    assert!(loaded[0].is_compile_failed());
}

#[test]
fn missing_registry_is_a_distinct_error() {
    let root = TempDir::new().unwrap();
    let config = EvalConfig::new(root.path());
    match registry::load_mutants(&config, PROJECT, SHA) {
        Err(EvalError::MissingRegistry { project }) => assert_eq!(project, PROJECT),
        other => panic!("expected MissingRegistry, got {other:?}"),
    }
}

#[test]
fn record_keys_are_battery_prefixed() {
    let record = MutantRecord {
        id: 3,
        battery: Battery::DeveloperUnit,
        killed: true,
        time_secs: 12.5,
        reason: None,
    };
    let value = record.to_json();
    assert_eq!(value["id"], 3);
    assert_eq!(value["developer-unit-killed"], true);
    assert_eq!(value["developer-unit-time"], 12.5);
    assert!(value.get("reason").is_none());

    let parsed = MutantRecord::from_json(Battery::DeveloperUnit, &value).unwrap();
    assert_eq!(parsed, record);
    // The wrong battery's keys are absent.
    assert!(MutantRecord::from_json(Battery::InlineBaseline, &value).is_none());
}

#[test]
fn outcomes_map_to_records() {
    let battery = Battery::InlineCandidate;
    let killed = MutantRecord::from_outcome(1, battery, &ExecutionOutcome::Killed, 2.0).unwrap();
    assert!(killed.killed);
    assert!(killed.reason.is_none());

    let survived =
        MutantRecord::from_outcome(1, battery, &ExecutionOutcome::Survived, 2.0).unwrap();
    assert!(!survived.killed);

    let timeout = MutantRecord::from_outcome(
        1,
        battery,
        &ExecutionOutcome::Timeout { elapsed_secs: 600.0 },
        600.0,
    )
    .unwrap();
    assert!(!timeout.killed);
    assert_eq!(timeout.reason.as_deref(), Some("timeout"));
    assert_eq!(timeout.time_secs, 600.0);

    let error = MutantRecord::from_outcome(
        1,
        battery,
        &ExecutionOutcome::RuntimeError {
            message: "read failed".to_string(),
        },
        0.1,
    )
    .unwrap();
    assert_eq!(error.reason.as_deref(), Some("read failed"));

    // Neither classification produces a durable record.
    assert!(MutantRecord::from_outcome(1, battery, &ExecutionOutcome::CompilationFailure, 0.1)
        .is_none());
    assert!(
        MutantRecord::from_outcome(1, battery, &ExecutionOutcome::PatchNotFound, 0.1).is_none()
    );
}

#[test]
fn results_append_and_load_per_battery() {
    let root = TempDir::new().unwrap();
    let config = EvalConfig::new(root.path());
    let battery = Battery::InlineCandidate;

    for (id, killed) in [(1u32, true), (2, false)] {
        let record = MutantRecord {
            id,
            battery,
            killed,
            time_secs: 1.0,
            reason: None,
        };
        registry::append_result(&config, PROJECT, SHA, &record).unwrap();
    }

    let loaded = registry::load_results(&config, PROJECT, SHA, battery).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, 1);
    assert!(loaded[0].killed);
    assert!(!loaded[1].killed);

    // Other batteries see nothing.
    assert!(registry::load_results(&config, PROJECT, SHA, Battery::InlineBaseline)
        .unwrap()
        .is_empty());
}

#[test]
fn project_list_skips_comments_and_blanks() {
    let root = TempDir::new().unwrap();
    let config = EvalConfig::new(root.path());
    fs::create_dir_all(root.path()).unwrap();
    fs::write(
        &config.projects_file,
        "# evaluated projects\nacme-core deadbeef\n\nother-lib cafe0001\n",
    )
    .unwrap();

    let projects = registry::load_project_list(&config).unwrap();
    assert_eq!(
        projects,
        vec![
            ("acme-core".to_string(), "deadbeef".to_string()),
            ("other-lib".to_string(), "cafe0001".to_string()),
        ]
    );
}

#[test]
fn batch_times_merge_across_resumed_runs() {
    let root = TempDir::new().unwrap();
    let config = EvalConfig::new(root.path());

    let mut times = registry::load_batch_times(&config);
    assert!(times.is_empty());
    times.insert("acme-core-time".to_string(), 12.5);
    registry::save_batch_times(&config, &times).unwrap();

    // A resumed batch skips acme-core; its earlier time must survive.
    let mut resumed = registry::load_batch_times(&config);
    resumed.insert("other-lib-time".to_string(), 3.25);
    registry::save_batch_times(&config, &resumed).unwrap();

    let merged = registry::load_batch_times(&config);
    assert_eq!(merged.get("acme-core-time"), Some(&12.5));
    assert_eq!(merged.get("other-lib-time"), Some(&3.25));
}

#[test]
fn line_files_round_trip() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("nested/dir/lines.txt");
    let lines = vec!["a".to_string(), "b".to_string()];
    registry::write_lines(&path, &lines).unwrap();
    assert_eq!(registry::read_lines(&path).unwrap(), lines);

    // Absent files read as empty, not as an error.
    assert!(registry::read_lines(&root.path().join("absent.txt"))
        .unwrap()
        .is_empty());
}
