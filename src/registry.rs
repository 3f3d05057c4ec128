use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::battery::Battery;
use crate::config::EvalConfig;
use crate::error::EvalError;
use crate::executor::ExecutionOutcome;

/// One mutant record as stored in the per-project registry file. The
/// field names (including the `orginal_code` spelling) are a wire
/// contract shared with the mutant generation tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutant {
    pub id: u32,
    #[serde(rename = "orginal_code")]
    pub original_code: String,
    pub mutated_code: String,
    #[serde(rename = "filepath")]
    pub file_path: PathBuf,
    #[serde(rename = "linenumber")]
    pub line_number: usize,
    /// Once true, the mutant is permanently excluded from every later
    /// battery for this project. Never reset, never retried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_failure: Option<bool>,
}

impl Mutant {
    pub fn is_compile_failed(&self) -> bool {
        self.compilation_failure == Some(true)
    }

    /// Last path component without the `.java` suffix.
    pub fn class_stem(&self) -> String {
        self.file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// File name of the generated inline-test artifact targeting this
    /// mutant's statement: `<Class>_<line>Test.java`.
    pub fn inline_test_file_name(&self) -> String {
        format!("{}_{}Test.java", self.class_stem(), self.line_number)
    }
}

/// Load the mutant registry for a project, or `MissingRegistry` when the
/// file does not exist (the caller skips the project with a diagnostic).
pub fn load_mutants(config: &EvalConfig, project: &str, sha: &str) -> Result<Vec<Mutant>, EvalError> {
    let path = config.mutants_file(project, sha);
    if !path.exists() {
        return Err(EvalError::MissingRegistry {
            project: project.to_string(),
        });
    }
    let data = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Rewrite the registry wholesale. Only `compilation_failure` flags ever
/// change between load and save.
pub fn save_mutants(
    config: &EvalConfig,
    project: &str,
    sha: &str,
    mutants: &[Mutant],
) -> Result<(), EvalError> {
    write_json(&config.mutants_file(project, sha), mutants)
}

/// Per-mutant evaluation record, one per (mutant, battery) attempt that
/// produced a kill/survive/timeout/error classification. Serialized with
/// battery-prefixed keys: `{"id": 3, "<battery>-killed": true, ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct MutantRecord {
    pub id: u32,
    pub battery: Battery,
    pub killed: bool,
    pub time_secs: f64,
    pub reason: Option<String>,
}

impl MutantRecord {
    pub fn from_outcome(id: u32, battery: Battery, outcome: &ExecutionOutcome, time_secs: f64) -> Option<Self> {
        let (killed, reason) = match outcome {
            ExecutionOutcome::Killed => (true, None),
            ExecutionOutcome::Survived => (false, None),
            ExecutionOutcome::Timeout { .. } => (false, Some("timeout".to_string())),
            ExecutionOutcome::RuntimeError { message } => (false, Some(message.clone())),
            // No durable record: the registry flag / skip is the record.
            ExecutionOutcome::CompilationFailure | ExecutionOutcome::PatchNotFound => return None,
        };
        Some(MutantRecord {
            id,
            battery,
            killed,
            time_secs,
            reason,
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), json!(self.id));
        map.insert(format!("{}-killed", self.battery), json!(self.killed));
        map.insert(format!("{}-time", self.battery), json!(self.time_secs));
        if let Some(reason) = &self.reason {
            map.insert("reason".to_string(), json!(reason));
        }
        serde_json::Value::Object(map)
    }

    pub fn from_json(battery: Battery, value: &serde_json::Value) -> Option<Self> {
        let killed_key = format!("{battery}-killed");
        let time_key = format!("{battery}-time");
        Some(MutantRecord {
            id: value.get("id")?.as_u64()? as u32,
            battery,
            killed: value.get(killed_key.as_str())?.as_bool()?,
            time_secs: value
                .get(time_key.as_str())
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            reason: value
                .get("reason")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        })
    }
}

/// Append one record to the per-(project, battery) results array.
/// Single-writer: the whole array is read, extended and rewritten.
pub fn append_result(
    config: &EvalConfig,
    project: &str,
    sha: &str,
    record: &MutantRecord,
) -> Result<(), EvalError> {
    let path = config.eval_results_file(project, sha, record.battery);
    let mut records: Vec<serde_json::Value> = if path.exists() {
        serde_json::from_str(&fs::read_to_string(&path)?)?
    } else {
        Vec::new()
    };
    records.push(record.to_json());
    write_json(&path, &records)
}

pub fn load_results(
    config: &EvalConfig,
    project: &str,
    sha: &str,
    battery: Battery,
) -> Result<Vec<MutantRecord>, EvalError> {
    let path = config.eval_results_file(project, sha, battery);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let values: Vec<serde_json::Value> = serde_json::from_str(&fs::read_to_string(&path)?)?;
    Ok(values
        .iter()
        .filter_map(|v| MutantRecord::from_json(battery, v))
        .collect())
}

/// One entry of the killed-mutants index built by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KilledMutantEntry {
    pub test_class_name: String,
    pub test_method_name: String,
    pub target_stmt_linenumber: String,
    pub inline_test_linenumber: String,
    pub id: u32,
    pub killed_mutant_file_path: PathBuf,
}

pub fn save_killed_index(
    config: &EvalConfig,
    project: &str,
    sha: &str,
    battery: Battery,
    entries: &[KilledMutantEntry],
) -> Result<(), EvalError> {
    write_json(&config.killed_index_file(project, sha, battery), entries)
}

pub fn load_killed_index(
    config: &EvalConfig,
    project: &str,
    sha: &str,
    battery: Battery,
) -> Result<Vec<KilledMutantEntry>, EvalError> {
    let path = config.killed_index_file(project, sha, battery);
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&fs::read_to_string(&path)?)?)
}

/// Project list file: one `<project> <sha>` per line, `#` comments.
pub fn load_project_list(config: &EvalConfig) -> Result<Vec<(String, String)>, EvalError> {
    let data = fs::read_to_string(&config.projects_file)?;
    let mut projects = Vec::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        if let (Some(project), Some(sha)) = (parts.next(), parts.next()) {
            projects.push((project.to_string(), sha.to_string()));
        }
    }
    Ok(projects)
}

/// Batch wall-time ledger. A resumed batch skips finished projects, so
/// the existing entries are loaded and merged rather than overwritten.
pub fn load_batch_times(config: &EvalConfig) -> std::collections::BTreeMap<String, f64> {
    fs::read_to_string(config.batch_times_file())
        .ok()
        .and_then(|data| serde_json::from_str(&data).ok())
        .unwrap_or_default()
}

pub fn save_batch_times(
    config: &EvalConfig,
    times: &std::collections::BTreeMap<String, f64>,
) -> Result<(), EvalError> {
    write_json(&config.batch_times_file(), times)
}

pub fn read_lines(path: &Path) -> Result<Vec<String>, EvalError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(fs::read_to_string(path)?
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect())
}

pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    fs::write(path, body)?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
