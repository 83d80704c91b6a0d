//! Ingestion pipeline
//!
//! One run lists the raw stage once, then takes each file through
//! `Discovered -> Reserved -> Extracted -> Finalized` strictly one after the
//! other, in listing order:
//!
//! 1. reserve: move raw -> processing; on failure the file stays in raw and
//!    the next run picks it up again
//! 2. extract: fetch into a scratch directory, read all tables, write the record
//! 3. finalize: move processing -> complete, or processing -> error
//!
//! A fault with one file never stops the run; only a failed listing of the
//! raw stage does.

pub mod report;

use crate::config::PersistFailurePolicy;
use crate::context::IngestContext;
use crate::error::PipelineError;
use crate::extract::{extract_all, PASSWORD_IGNORED};
use crate::record::write_tables;
use crate::stage::{list_stage, move_staged_file, MoveOutcome, StagedFile};
use mdbstage_common::checksum::sha256_file;
use mdbstage_common::types::record_base_name;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, error, info, instrument, warn};

pub use report::{Destination, FileOutcome, FileReport, RunReport};

/// Processing, complete and error stages are created on first use
const CREATE_MISSING_TARGETS: bool = true;

/// Result of the extraction step for one reserved file
enum Extraction {
    Succeeded {
        record: Option<String>,
        tables: usize,
        rows: usize,
    },
    Failed(String),
}

/// Run one ingestion cycle over everything currently in the raw stage
#[instrument(skip(ctx), fields(raw = %ctx.stages.raw_stage))]
pub async fn run_once(ctx: &IngestContext) -> Result<RunReport, PipelineError> {
    let raw = &ctx.stages.raw_stage;
    let files = list_stage(ctx.backend.as_ref(), raw, "")
        .await
        .ok_or_else(|| PipelineError::Lookup { stage: raw.clone() })?;

    let mut report = RunReport::new();
    if files.is_empty() {
        info!("No files to process");
    } else {
        info!("Processing {} files from {}", files.len(), raw);
    }

    for file in &files {
        report.push(process_file(ctx, file).await);
    }

    report.finish();
    report.log_summary();
    Ok(report)
}

/// Take one file from the raw stage to a terminal stage
#[instrument(skip(ctx, file), fields(file = %file.name))]
pub async fn process_file(ctx: &IngestContext, file: &StagedFile) -> FileReport {
    let stages = &ctx.stages;
    let name = file.name.as_str();
    let mut warnings = Vec::new();

    let reserved = move_staged_file(
        ctx.backend.as_ref(),
        name,
        &stages.raw_stage,
        &stages.processing_stage,
        CREATE_MISSING_TARGETS,
    )
    .await;
    match reserved {
        MoveOutcome::Moved => {},
        MoveOutcome::MovedWithLeftover { reason } => {
            warnings.push(format!(
                "copy left in {} after reservation: {}",
                stages.raw_stage, reason
            ));
        },
        MoveOutcome::Failed(failure) => {
            warn!(file = %name, reason = %failure, "Reservation failed; file stays in raw stage");
            return FileReport {
                file: name.to_string(),
                outcome: FileOutcome::ReservationFailed {
                    reason: failure.to_string(),
                },
                warnings,
            };
        },
    }

    if ctx.password.as_deref().is_some_and(|p| !p.is_empty()) {
        warnings.push(PASSWORD_IGNORED.to_string());
    }
    let extraction = extract_reserved(ctx, file).await;

    let (destination, target) = match &extraction {
        Extraction::Succeeded { .. } => (Destination::Complete, &stages.complete_stage),
        Extraction::Failed(_) => (Destination::Error, &stages.error_stage),
    };

    let finalized = move_staged_file(
        ctx.backend.as_ref(),
        name,
        &stages.processing_stage,
        target,
        CREATE_MISSING_TARGETS,
    )
    .await;
    match finalized {
        MoveOutcome::Moved => {},
        MoveOutcome::MovedWithLeftover { reason } => {
            warnings.push(format!(
                "copy left in {} after finalization: {}",
                stages.processing_stage, reason
            ));
        },
        MoveOutcome::Failed(failure) => {
            error!(
                file = %name,
                destination = %destination,
                reason = %failure,
                "Finalization failed; file remains in processing stage"
            );
            return FileReport {
                file: name.to_string(),
                outcome: FileOutcome::FinalizationFailed {
                    destination,
                    reason: failure.to_string(),
                },
                warnings,
            };
        },
    }

    let outcome = match extraction {
        Extraction::Succeeded {
            record,
            tables,
            rows,
        } => FileOutcome::Completed {
            record,
            tables,
            rows,
        },
        Extraction::Failed(reason) => FileOutcome::Failed { reason },
    };

    FileReport {
        file: name.to_string(),
        outcome,
        warnings,
    }
}

/// Stage the reserved file locally, extract it and persist the record.
///
/// The scratch directory is removed on every path out of this function.
async fn extract_reserved(ctx: &IngestContext, file: &StagedFile) -> Extraction {
    let scratch = match scratch_dir(ctx.stages.scratch_dir.as_deref()) {
        Ok(dir) => dir,
        Err(e) => {
            error!(error = %e, "Could not create scratch directory");
            return Extraction::Failed(format!("scratch directory: {}", e));
        },
    };

    let result = extract_into(ctx, file, scratch.path()).await;

    let scratch_path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(path = %scratch_path.display(), error = %e, "Failed to remove scratch directory");
    }

    result
}

/// Scratch directory for one file, under `parent` when one is configured
fn scratch_dir(parent: Option<&Path>) -> std::io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("mdbstage-");
    match parent {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            builder.tempdir_in(parent)
        },
        None => builder.tempdir(),
    }
}

async fn extract_into(ctx: &IngestContext, file: &StagedFile, scratch: &Path) -> Extraction {
    let stages = &ctx.stages;
    let local_path = scratch.join(file.file_name());

    if let Err(e) = ctx
        .backend
        .download(&stages.processing_stage, &file.name, &local_path)
        .await
    {
        error!(error = %e, "Error saving file locally");
        return Extraction::Failed(format!("could not stage file locally: {}", e));
    }

    match sha256_file(&local_path) {
        Ok(digest) => debug!(sha256 = %digest, "Fetched file into scratch directory"),
        Err(e) => debug!(error = %e, "Could not digest scratch copy"),
    }

    let tables = match extract_all(ctx.extractor.as_ref(), &local_path, ctx.password.as_deref()).await {
        Ok(tables) => tables,
        Err(e) => {
            error!(error = %e, "Error extracting tables");
            return Extraction::Failed(format!("could not list tables: {}", e));
        },
    };

    let table_count = tables.len();
    let row_count = tables.values().map(Vec::len).sum();
    let record = write_tables(ctx.sink.as_ref(), tables, &record_base_name(&file.name)).await;

    if record.is_none() {
        match stages.persist_failure_policy {
            PersistFailurePolicy::Complete => {
                warn!("Record not persisted; routing file as extracted");
            },
            PersistFailurePolicy::Error => {
                return Extraction::Failed("record could not be persisted".to_string());
            },
        }
    }

    Extraction::Succeeded {
        record,
        tables: table_count,
        rows: row_count,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_is_created_under_parent() {
        let parent = TempDir::new().unwrap();
        let nested = parent.path().join("scratch");

        let dir = scratch_dir(Some(&nested)).unwrap();
        assert!(dir.path().starts_with(&nested));
        assert!(dir
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("mdbstage-"));

        let path = dir.path().to_path_buf();
        dir.close().unwrap();
        assert!(!path.exists());
    }
}
