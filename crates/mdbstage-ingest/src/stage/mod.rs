//! Stage locations
//!
//! A stage is a named, bucket-like area holding files. The pipeline only ever
//! talks to stages through [`StageBackend`], which exposes the primitives the
//! underlying storage actually offers (list, copy, delete, create). Moving a
//! file is built on top of those in [`mover`].

pub mod lister;
pub mod local;
pub mod mover;
pub mod s3;

use crate::error::StageResult;
use async_trait::async_trait;
use std::path::Path;

pub use lister::list_stage;
pub use local::LocalStageBackend;
pub use mdbstage_common::types::StagedFile;
pub use mover::{move_staged_file, MoveFailure, MoveOutcome};
pub use s3::S3StageBackend;

/// Result of a copy between two stages, inspected by the mover before the
/// source is deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReceipt {
    /// Name of the file written in the target stage
    pub name: String,
    /// Bytes present at the target after the copy
    pub size: u64,
}

/// Result of writing bytes into a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub location: String,
    pub name: String,
    pub size: u64,
    pub checksum: String,
}

/// Storage primitives a stage location must support
#[async_trait]
pub trait StageBackend: Send + Sync {
    /// Short backend identifier for logs (`local`, `s3`)
    fn kind(&self) -> &'static str;

    async fn location_exists(&self, location: &str) -> StageResult<bool>;

    /// Create a stage. Creating an existing stage succeeds.
    async fn create_location(&self, location: &str) -> StageResult<()>;

    /// Files directly under `location/sub_path`, names relative to the stage.
    ///
    /// An empty `sub_path` lists the stage root. Errors when the stage cannot
    /// be queried, including when it does not exist.
    async fn list(&self, location: &str, sub_path: &str) -> StageResult<Vec<StagedFile>>;

    /// Metadata for one file, `None` when the stage exists but lacks the file
    async fn stat(&self, location: &str, name: &str) -> StageResult<Option<StagedFile>>;

    /// Copy `name` from `source` to the same name in `target`, overwriting
    async fn copy(&self, name: &str, source: &str, target: &str) -> StageResult<CopyReceipt>;

    async fn delete(&self, name: &str, location: &str) -> StageResult<()>;

    /// Fetch a staged file into a local path, returning the byte count
    async fn download(&self, location: &str, name: &str, dest: &Path) -> StageResult<u64>;

    async fn upload(&self, location: &str, name: &str, data: Vec<u8>)
        -> StageResult<UploadReceipt>;
}

/// Join a stage sub-path and a file name with `/`
pub(crate) fn join_name(sub_path: &str, name: &str) -> String {
    let sub_path = sub_path.trim_matches('/');
    if sub_path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", sub_path, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_name() {
        assert_eq!(join_name("", "a.mdb"), "a.mdb");
        assert_eq!(join_name("/uploads/", "a.mdb"), "uploads/a.mdb");
        assert_eq!(join_name("x/y", "a.mdb"), "x/y/a.mdb");
    }
}
