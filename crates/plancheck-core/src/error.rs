use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanCheckError {
    #[error("cannot index codebase root '{}': {reason}", root.display())]
    Index { root: PathBuf, reason: String },

    #[error("cannot read plan '{}': {source}", path.display())]
    PlanUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plan has no task structure: {0}")]
    Parse(String),

    #[error("indexing was cancelled")]
    Cancelled,

    #[error("changes can only be applied to an APPROVED_WITH_CHANGES report (verdict is {0})")]
    ApplyNotAllowed(String),

    #[error("plan changed since the review: line {line} no longer contains '{expected}'")]
    StaleEdit { line: usize, expected: String },

    #[error("plan content does not match the reviewed digest; re-run verify")]
    PlanDigestMismatch,

    #[error("refusing to overwrite the original plan at '{}'", .0.display())]
    WouldOverwritePlan(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlanCheckError>;
