//! Error types for the ingestion crate
//!
//! Each component reports through its own enum so that callers can branch on
//! the failure category without inspecting message text.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for storage backend calls
pub type StageResult<T> = std::result::Result<T, StageError>;

/// Faults raised by a [`StageBackend`](crate::stage::StageBackend)
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Stage '{0}' does not exist")]
    LocationNotFound(String),

    #[error("File '{name}' not found in stage '{location}'")]
    FileNotFound { location: String, name: String },

    #[error("Invalid stage path: {0}")]
    InvalidName(#[from] mdbstage_common::MdbStageError),

    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("S3 error: {0}")]
    S3(String),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn s3(message: impl std::fmt::Display) -> Self {
        Self::S3(message.to_string())
    }
}

/// Whole-file extraction faults
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The extraction tool ran and reported failure
    #[error("{tool} failed (exit status {status:?}): {stderr}")]
    ToolFailed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The tool could not be started at all
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but its output could not be understood
    #[error("Unexpected output from {tool}: {message}")]
    Output { tool: String, message: String },
}

impl ExtractError {
    /// True when the tool itself reported the failure, as opposed to an
    /// unexpected fault around it
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, ExtractError::ToolFailed { .. })
    }
}

/// Record persistence faults
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Malformed record payload: {0}")]
    Malformed(String),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No free record name for '{0}'")]
    NameExhausted(String),

    #[error("Failed to store record '{name}': {source}")]
    Sink {
        name: String,
        #[source]
        source: StageError,
    },
}

/// Configuration loading and validation faults
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Faults that stop a whole pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Could not list stage '{stage}'")]
    Lookup { stage: String },
}

/// Result alias for operator commands
pub type CliResult<T> = std::result::Result<T, CliError>;

/// User-facing command failures
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}. Check the configuration file or the MDBSTAGE_* environment variables.")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Stage(#[from] StageError),

    #[error("Extraction failed: {0}. Verify that mdb-tools is installed and the file is a valid Access database.")]
    Extract(#[from] ExtractError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("Move failed: {0}")]
    Move(String),

    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
