use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::battery::Battery;
use crate::executor::BatterySummary;

#[derive(Debug, Serialize, Deserialize)]
pub struct RunState {
    pub project: String,
    pub sha: String,
    pub mutator: String,
    pub batteries: Vec<BatteryRun>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatteryRun {
    pub battery: String,
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub timeouts: usize,
    pub runtime_errors: usize,
    pub patch_not_found: usize,
    pub compile_failures: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

impl BatteryRun {
    pub fn from_summary(battery: Battery, summary: &BatterySummary) -> Self {
        BatteryRun {
            battery: battery.name().to_string(),
            total: summary.total,
            killed: summary.killed,
            survived: summary.survived,
            timeouts: summary.timeouts,
            runtime_errors: summary.runtime_errors,
            patch_not_found: summary.patch_not_found,
            compile_failures: summary.compile_failures,
            skipped: summary.skipped,
            duration_ms: summary.duration_ms,
        }
    }
}

fn state_path() -> PathBuf {
    let dir = dirs_or_cwd();
    dir.join(".exeval-state.json")
}

fn dirs_or_cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn save_last_run(result: &RunState) {
    if let Ok(json) = serde_json::to_string(result) {
        let _ = std::fs::write(state_path(), json);
    }
}

pub fn load_last_run() -> Option<RunState> {
    let path = state_path();
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

pub fn save_to_path(result: &RunState, path: &std::path::Path) {
    if let Ok(json) = serde_json::to_string(result) {
        let _ = std::fs::write(path, json);
    }
}

pub fn load_from_path(path: &std::path::Path) -> Option<RunState> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}
