//! Moving files between stages
//!
//! Storage only offers copy and delete, so a move is copy, verify, then
//! delete from the source. The visible location of a file changes only when
//! the copy has been verified:
//!
//! - copy or verification fails: the file stays at the source only
//! - delete fails after a verified copy: the move still succeeds, but the file
//!   is now present in both stages and an operator warning is emitted

use super::StageBackend;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

/// Why a move did not happen. In every case the file is left at the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveFailure {
    SameLocation,
    SourceMissing(String),
    TargetMissing(String),
    CreateTarget { target: String, reason: String },
    /// The source stage does not hold the file (already moved, or never there)
    NotInSource,
    Lookup(String),
    Copy(String),
    Unverified { expected: u64, actual: u64 },
}

impl fmt::Display for MoveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveFailure::SameLocation => write!(f, "source and target stage are the same"),
            MoveFailure::SourceMissing(stage) => write!(f, "source stage '{}' does not exist", stage),
            MoveFailure::TargetMissing(stage) => write!(f, "target stage '{}' does not exist", stage),
            MoveFailure::CreateTarget { target, reason } => {
                write!(f, "could not create target stage '{}': {}", target, reason)
            },
            MoveFailure::NotInSource => write!(f, "file is not present in the source stage"),
            MoveFailure::Lookup(reason) => write!(f, "stage lookup failed: {}", reason),
            MoveFailure::Copy(reason) => write!(f, "copy failed: {}", reason),
            MoveFailure::Unverified { expected, actual } => write!(
                f,
                "copy could not be verified: expected {} bytes, target has {}",
                expected, actual
            ),
        }
    }
}

/// Outcome of [`move_staged_file`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// Copied and verified, but the source copy could not be removed
    MovedWithLeftover { reason: String },
    Failed(MoveFailure),
}

impl MoveOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, MoveOutcome::Failed(_))
    }
}

impl From<MoveOutcome> for bool {
    fn from(outcome: MoveOutcome) -> bool {
        outcome.is_success()
    }
}

/// Move `file_name` from `source` to `target`.
///
/// With `create_target_if_missing` the target stage is created first when it
/// does not exist; a creation failure fails the whole move. Moving a file that
/// has already fully moved fails with [`MoveFailure::NotInSource`] and never
/// touches the target.
#[instrument(skip(backend), fields(backend = backend.kind()))]
pub async fn move_staged_file(
    backend: &dyn StageBackend,
    file_name: &str,
    source: &str,
    target: &str,
    create_target_if_missing: bool,
) -> MoveOutcome {
    let outcome = try_move(backend, file_name, source, target, create_target_if_missing).await;
    match &outcome {
        MoveOutcome::Moved => {
            info!(file = %file_name, from = %source, to = %target, "File moved");
        },
        MoveOutcome::MovedWithLeftover { reason } => {
            warn!(
                file = %file_name,
                from = %source,
                to = %target,
                reason = %reason,
                "File copied but not removed from source; manual cleanup of the source copy may be required"
            );
        },
        MoveOutcome::Failed(failure) => {
            error!(file = %file_name, from = %source, to = %target, reason = %failure, "File move failed");
        },
    }
    outcome
}

async fn try_move(
    backend: &dyn StageBackend,
    file_name: &str,
    source: &str,
    target: &str,
    create_target_if_missing: bool,
) -> MoveOutcome {
    if source == target {
        return MoveOutcome::Failed(MoveFailure::SameLocation);
    }

    match backend.location_exists(source).await {
        Ok(true) => {},
        Ok(false) => return MoveOutcome::Failed(MoveFailure::SourceMissing(source.to_string())),
        Err(e) => return MoveOutcome::Failed(MoveFailure::Lookup(e.to_string())),
    }

    match backend.location_exists(target).await {
        Ok(true) => {},
        Ok(false) if create_target_if_missing => {
            if let Err(e) = backend.create_location(target).await {
                return MoveOutcome::Failed(MoveFailure::CreateTarget {
                    target: target.to_string(),
                    reason: e.to_string(),
                });
            }
            info!("Target stage '{}' created", target);
        },
        Ok(false) => return MoveOutcome::Failed(MoveFailure::TargetMissing(target.to_string())),
        Err(e) => return MoveOutcome::Failed(MoveFailure::Lookup(e.to_string())),
    }

    let original = match backend.stat(source, file_name).await {
        Ok(Some(file)) => file,
        Ok(None) => return MoveOutcome::Failed(MoveFailure::NotInSource),
        Err(e) => return MoveOutcome::Failed(MoveFailure::Lookup(e.to_string())),
    };

    let receipt = match backend.copy(file_name, source, target).await {
        Ok(receipt) => receipt,
        Err(e) => return MoveOutcome::Failed(MoveFailure::Copy(e.to_string())),
    };

    if receipt.name != file_name || receipt.size != original.size {
        // Withdraw the unverified copy so the file stays visible only at the source
        if let Err(e) = backend.delete(&receipt.name, target).await {
            error!(
                file = %receipt.name,
                stage = %target,
                error = %e,
                "Failed to remove unverified copy from target"
            );
        }
        return MoveOutcome::Failed(MoveFailure::Unverified {
            expected: original.size,
            actual: receipt.size,
        });
    }
    debug!("Verified copy of {} ({} bytes) in '{}'", file_name, receipt.size, target);

    match backend.delete(file_name, source).await {
        Ok(()) => MoveOutcome::Moved,
        Err(e) => MoveOutcome::MovedWithLeftover {
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::stage::LocalStageBackend;
    use tempfile::TempDir;

    async fn setup(stages: &[&str]) -> (LocalStageBackend, TempDir) {
        let temp = TempDir::new().unwrap();
        let backend = LocalStageBackend::new(temp.path());
        for stage in stages {
            backend.create_location(stage).await.unwrap();
        }
        (backend, temp)
    }

    #[tokio::test]
    async fn test_move_happy_path() {
        let (backend, _temp) = setup(&["RAW", "PROCESSING"]).await;
        backend.upload("RAW", "orders.mdb", b"abc".to_vec()).await.unwrap();

        let outcome = move_staged_file(&backend, "orders.mdb", "RAW", "PROCESSING", false).await;
        assert_eq!(outcome, MoveOutcome::Moved);
        assert!(bool::from(outcome));
        assert!(backend.stat("RAW", "orders.mdb").await.unwrap().is_none());
        assert!(backend.stat("PROCESSING", "orders.mdb").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_move_fails_cleanly() {
        let (backend, _temp) = setup(&["RAW", "PROCESSING"]).await;
        backend.upload("RAW", "orders.mdb", b"abc".to_vec()).await.unwrap();

        assert!(move_staged_file(&backend, "orders.mdb", "RAW", "PROCESSING", false)
            .await
            .is_success());
        let again = move_staged_file(&backend, "orders.mdb", "RAW", "PROCESSING", false).await;
        assert_eq!(again, MoveOutcome::Failed(MoveFailure::NotInSource));

        let target = backend.stat("PROCESSING", "orders.mdb").await.unwrap().unwrap();
        assert_eq!(target.size, 3);
    }

    #[tokio::test]
    async fn test_missing_source_stage() {
        let (backend, _temp) = setup(&["PROCESSING"]).await;
        let outcome = move_staged_file(&backend, "x.mdb", "RAW", "PROCESSING", false).await;
        assert_eq!(
            outcome,
            MoveOutcome::Failed(MoveFailure::SourceMissing("RAW".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_target_without_create() {
        let (backend, _temp) = setup(&["RAW"]).await;
        backend.upload("RAW", "x.mdb", b"x".to_vec()).await.unwrap();

        let outcome = move_staged_file(&backend, "x.mdb", "RAW", "DONE", false).await;
        assert_eq!(
            outcome,
            MoveOutcome::Failed(MoveFailure::TargetMissing("DONE".to_string()))
        );
        assert!(backend.stat("RAW", "x.mdb").await.unwrap().is_some());
        assert!(!backend.location_exists("DONE").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_target_is_created_on_request() {
        let (backend, _temp) = setup(&["RAW"]).await;
        backend.upload("RAW", "x.mdb", b"x".to_vec()).await.unwrap();

        let outcome = move_staged_file(&backend, "x.mdb", "RAW", "DONE", true).await;
        assert_eq!(outcome, MoveOutcome::Moved);
        assert!(backend.stat("DONE", "x.mdb").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_same_location_is_rejected() {
        let (backend, _temp) = setup(&["RAW"]).await;
        backend.upload("RAW", "x.mdb", b"x".to_vec()).await.unwrap();

        let outcome = move_staged_file(&backend, "x.mdb", "RAW", "RAW", false).await;
        assert_eq!(outcome, MoveOutcome::Failed(MoveFailure::SameLocation));
        assert!(backend.stat("RAW", "x.mdb").await.unwrap().is_some());
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            MoveFailure::Unverified { expected: 10, actual: 4 }.to_string(),
            "copy could not be verified: expected 10 bytes, target has 4"
        );
        assert!(!bool::from(MoveOutcome::Failed(MoveFailure::NotInSource)));
        assert!(MoveOutcome::MovedWithLeftover {
            reason: "denied".to_string()
        }
        .is_success());
    }
}
