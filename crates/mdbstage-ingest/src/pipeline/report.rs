//! Outcome of a pipeline run

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Terminal stage a file was routed towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Complete,
    Error,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Complete => write!(f, "complete"),
            Destination::Error => write!(f, "error"),
        }
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Extracted and moved to the complete stage. `record` is `None` when the
    /// record could not be persisted and policy still routed the file here.
    Completed {
        record: Option<String>,
        tables: usize,
        rows: usize,
    },
    /// Moved to the error stage
    Failed { reason: String },
    /// Could not be reserved; still in the raw stage for the next run
    ReservationFailed { reason: String },
    /// Processed, but the final move failed; still in the processing stage
    FinalizationFailed {
        destination: Destination,
        reason: String,
    },
}

impl FileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Completed { .. } => "completed",
            FileOutcome::Failed { .. } => "failed",
            FileOutcome::ReservationFailed { .. } => "reservation failed",
            FileOutcome::FinalizationFailed { .. } => "finalization failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub file: String,
    pub outcome: FileOutcome,
    /// Non-fatal conditions an operator should look at
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub files: Vec<FileReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, report: FileReport) {
        self.files.push(report);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Completed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    pub fn reservation_failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::ReservationFailed { .. }))
    }

    pub fn finalization_failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::FinalizationFailed { .. }))
    }

    /// Every file reached complete without warnings
    pub fn is_clean(&self) -> bool {
        self.files
            .iter()
            .all(|f| matches!(f.outcome, FileOutcome::Completed { record: Some(_), .. }) && f.warnings.is_empty())
    }

    pub fn outcome_of(&self, file: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|f| f.file == file).map(|f| &f.outcome)
    }

    pub fn log_summary(&self) {
        let summary = format!(
            "{} files: {} completed, {} failed, {} not reserved, {} not finalized",
            self.files.len(),
            self.completed(),
            self.failed(),
            self.reservation_failed(),
            self.finalization_failed()
        );
        if self.is_clean() {
            info!("Run finished: {}", summary);
        } else {
            warn!("Run finished with problems: {}", summary);
        }
    }
}
