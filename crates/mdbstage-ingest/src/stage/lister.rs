//! Stage listing
//!
//! Callers must treat the two outcomes differently: `Some(vec![])` means
//! nothing to do, `None` means the stage could not be checked.

use super::StageBackend;
use mdbstage_common::types::StagedFile;
use tracing::{debug, error};

/// List files in a stage, reporting lookup faults instead of returning them.
///
/// Returns `None` only when the location could not be queried at all (it does
/// not exist, the name is invalid, or the backend failed).
pub async fn list_stage(
    backend: &dyn StageBackend,
    location: &str,
    sub_path: &str,
) -> Option<Vec<StagedFile>> {
    match backend.list(location, sub_path).await {
        Ok(files) => {
            debug!(
                stage = %location,
                sub_path = %sub_path,
                count = files.len(),
                "Listed stage"
            );
            Some(files)
        },
        Err(e) => {
            error!(stage = %location, sub_path = %sub_path, error = %e, "Failed to list stage");
            None
        },
    }
}
