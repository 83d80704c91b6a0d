//! Error types for mdbstage

use thiserror::Error;

/// Result type alias for shared mdbstage operations
pub type Result<T> = std::result::Result<T, MdbStageError>;

/// Shared error type
#[derive(Error, Debug)]
pub enum MdbStageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed record payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

impl MdbStageError {
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
