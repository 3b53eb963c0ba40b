//! Error types for a pipeline run

use runscript_core::domain::stage::{MonitorState, StageStatus};
use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionError;

/// Result type alias for run operations
pub type RunResult<T> = std::result::Result<T, RunError>;

/// Everything that ends a run early
///
/// Soft degradations never show up here; they are recorded in the run trace
/// and execution continues.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("failed to read script {}: {source}", path.display())]
    ScriptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no browser session available: {0}")]
    NoSession(String),

    #[error("expected {expected} parameter containers, found {found}")]
    MissingContainer { expected: usize, found: usize },

    #[error("submit button never became clickable")]
    SubmitUnavailable,

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("{stage} stage timed out after {attempts} attempts")]
    StageTimeout { stage: MonitorState, attempts: u32 },

    #[error("{stage} stage reported {status}")]
    StageFailedStatus {
        stage: MonitorState,
        status: StageStatus,
    },

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RunError {
    /// Terminal monitor state this error leads to
    pub fn terminal_state(&self) -> MonitorState {
        match self {
            RunError::StageTimeout { .. } => MonitorState::TimedOut,
            _ => MonitorState::Failed,
        }
    }
}
