use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngagementError {
    #[error("FEEDBACK limit exceeded")]
    DailyLimitExceeded,

    #[error("Duplicate feedback submission")]
    DuplicateSubmission,

    #[error("Invalid feedback: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt snapshot {path}: {reason}")]
    CorruptSnapshot { path: String, reason: String },
}

impl EngagementError {
    /// File, engine, or worker failure as opposed to a rejected submission.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            EngagementError::Io(_)
                | EngagementError::Sqlite(_)
                | EngagementError::Task(_)
                | EngagementError::Json(_)
        )
    }

    pub(crate) fn corrupt_snapshot(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        EngagementError::CorruptSnapshot {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for EngagementError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngagementError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngagementError>;
