use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a single project or operation. Failures at the
/// (mutant, battery) level are classifications, not errors; they are
/// recorded per mutant and never surface here.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing artifact: {path}")]
    MissingArtifact { path: PathBuf },
    #[error("no mutant registry for project {project}")]
    MissingRegistry { project: String },
    #[error("unknown mutator: {0}")]
    UnknownMutator(String),
    #[error("unknown battery: {0}")]
    UnknownBattery(String),
    #[error("unknown minimization algorithm: {0}")]
    UnknownAlgorithm(String),
}
