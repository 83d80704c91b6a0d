//! Filesystem stage backend
//!
//! Each stage is a directory under one root: stage `RAW` with file
//! `orders.mdb` lives at `<root>/RAW/orders.mdb`. Writes go to a hidden
//! partial file first and are renamed into place, so a listing never observes
//! a half-copied file.

use super::{join_name, CopyReceipt, StageBackend, UploadReceipt};
use crate::error::{StageError, StageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mdbstage_common::checksum::sha256_hex;
use mdbstage_common::types::{validate_relative_name, StagedFile};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

const PARTIAL_PREFIX: &str = ".partial-";

#[derive(Debug, Clone)]
pub struct LocalStageBackend {
    root: PathBuf,
}

impl LocalStageBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stage_dir(&self, location: &str) -> StageResult<PathBuf> {
        validate_relative_name(location)?;
        Ok(self.root.join(location))
    }

    fn file_path(&self, location: &str, name: &str) -> StageResult<PathBuf> {
        validate_relative_name(name)?;
        Ok(self.stage_dir(location)?.join(name))
    }

    async fn require_stage(&self, location: &str) -> StageResult<PathBuf> {
        let dir = self.stage_dir(location)?;
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StageError::LocationNotFound(location.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StageError::LocationNotFound(location.to_string()))
            },
            Err(e) => Err(StageError::io(dir, e)),
        }
    }

    /// Write into a hidden sibling, then rename over `dest`
    async fn write_atomically(&self, dest: &Path, data: &[u8]) -> StageResult<()> {
        let partial = partial_path(dest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::io(parent, e))?;
        }
        fs::write(&partial, data)
            .await
            .map_err(|e| StageError::io(&partial, e))?;
        if let Err(e) = fs::rename(&partial, dest).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StageError::io(dest, e));
        }
        Ok(())
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(
        "{}{}-{}",
        PARTIAL_PREFIX,
        std::process::id(),
        file_name
    ))
}

fn staged_file(location: &str, name: String, meta: &std::fs::Metadata) -> StagedFile {
    StagedFile {
        location: location.to_string(),
        name,
        size: meta.len(),
        last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
    }
}

#[async_trait]
impl StageBackend for LocalStageBackend {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn location_exists(&self, location: &str) -> StageResult<bool> {
        match self.require_stage(location).await {
            Ok(_) => Ok(true),
            Err(StageError::LocationNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn create_location(&self, location: &str) -> StageResult<()> {
        let dir = self.stage_dir(location)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StageError::io(&dir, e))?;
        info!("Created stage '{}' at {}", location, dir.display());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, location: &str, sub_path: &str) -> StageResult<Vec<StagedFile>> {
        let stage_dir = self.require_stage(location).await?;
        let sub_path = sub_path.trim_matches('/');
        let dir = if sub_path.is_empty() {
            stage_dir
        } else {
            validate_relative_name(sub_path)?;
            stage_dir.join(sub_path)
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // A missing sub-path inside an existing stage simply holds nothing
            Err(e) if e.kind() == ErrorKind::NotFound && !sub_path.is_empty() => {
                return Ok(Vec::new())
            },
            Err(e) => return Err(StageError::io(&dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StageError::io(&dir, e))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with('.') {
                continue;
            }
            let meta = entry
                .metadata()
                .await
                .map_err(|e| StageError::io(entry.path(), e))?;
            if !meta.is_file() {
                continue;
            }
            files.push(staged_file(location, join_name(sub_path, &file_name), &meta));
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Listed {} files in stage '{}'", files.len(), location);
        Ok(files)
    }

    async fn stat(&self, location: &str, name: &str) -> StageResult<Option<StagedFile>> {
        self.require_stage(location).await?;
        let path = self.file_path(location, name)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(staged_file(location, name.to_string(), &meta))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StageError::io(path, e)),
        }
    }

    #[instrument(skip(self))]
    async fn copy(&self, name: &str, source: &str, target: &str) -> StageResult<CopyReceipt> {
        self.require_stage(source).await?;
        self.require_stage(target).await?;

        let from = self.file_path(source, name)?;
        let to = self.file_path(target, name)?;
        let partial = partial_path(&to);

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::io(parent, e))?;
        }

        if let Err(e) = fs::copy(&from, &partial).await {
            let _ = fs::remove_file(&partial).await;
            return Err(if e.kind() == ErrorKind::NotFound {
                StageError::FileNotFound {
                    location: source.to_string(),
                    name: name.to_string(),
                }
            } else {
                StageError::io(from, e)
            });
        }

        if let Err(e) = fs::rename(&partial, &to).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StageError::io(to, e));
        }

        let size = fs::metadata(&to)
            .await
            .map_err(|e| StageError::io(&to, e))?
            .len();

        debug!("Copied {} bytes: {}/{} -> {}/{}", size, source, name, target, name);
        Ok(CopyReceipt {
            name: name.to_string(),
            size,
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str, location: &str) -> StageResult<()> {
        self.require_stage(location).await?;
        let path = self.file_path(location, name)?;
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StageError::FileNotFound {
                    location: location.to_string(),
                    name: name.to_string(),
                }
            } else {
                StageError::io(&path, e)
            }
        })?;
        debug!("Deleted {}/{}", location, name);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download(&self, location: &str, name: &str, dest: &Path) -> StageResult<u64> {
        self.require_stage(location).await?;
        let path = self.file_path(location, name)?;
        fs::copy(&path, dest).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StageError::FileNotFound {
                    location: location.to_string(),
                    name: name.to_string(),
                }
            } else {
                StageError::io(&path, e)
            }
        })
    }

    #[instrument(skip(self, data))]
    async fn upload(
        &self,
        location: &str,
        name: &str,
        data: Vec<u8>,
    ) -> StageResult<UploadReceipt> {
        self.require_stage(location).await?;
        let path = self.file_path(location, name)?;
        let checksum = sha256_hex(&data);
        let size = data.len() as u64;

        self.write_atomically(&path, &data).await?;

        info!("Uploaded {} bytes to {}/{}", size, location, name);
        Ok(UploadReceipt {
            location: location.to_string(),
            name: name.to_string(),
            size,
            checksum,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn backend_with_stages(stages: &[&str]) -> (LocalStageBackend, TempDir) {
        let temp = TempDir::new().unwrap();
        let backend = LocalStageBackend::new(temp.path());
        for stage in stages {
            backend.create_location(stage).await.unwrap();
        }
        (backend, temp)
    }

    #[tokio::test]
    async fn test_location_exists() {
        let (backend, _temp) = backend_with_stages(&["RAW"]).await;
        assert!(backend.location_exists("RAW").await.unwrap());
        assert!(!backend.location_exists("MISSING").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_empty_and_missing() {
        let (backend, _temp) = backend_with_stages(&["RAW"]).await;
        assert!(backend.list("RAW", "").await.unwrap().is_empty());
        assert!(matches!(
            backend.list("MISSING", "").await,
            Err(StageError::LocationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_skips_hidden() {
        let (backend, temp) = backend_with_stages(&["RAW"]).await;
        backend.upload("RAW", "b.mdb", b"b".to_vec()).await.unwrap();
        backend.upload("RAW", "a.mdb", b"a".to_vec()).await.unwrap();
        std::fs::write(temp.path().join("RAW/.partial-1-c.mdb"), b"c").unwrap();
        std::fs::create_dir(temp.path().join("RAW/nested")).unwrap();

        let files = backend.list("RAW", "").await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.mdb", "b.mdb"]);
        assert_eq!(files[0].location, "RAW");
        assert_eq!(files[0].size, 1);
        assert!(files[0].last_modified.is_some());
    }

    #[tokio::test]
    async fn test_list_sub_path() {
        let (backend, _temp) = backend_with_stages(&["RAW"]).await;
        backend
            .upload("RAW", "2024/orders.mdb", b"x".to_vec())
            .await
            .unwrap();

        let files = backend.list("RAW", "2024").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "2024/orders.mdb");
        assert!(backend.list("RAW", "2025").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_copy_and_delete() {
        let (backend, _temp) = backend_with_stages(&["RAW", "PROCESSING"]).await;
        backend
            .upload("RAW", "orders.mdb", b"payload".to_vec())
            .await
            .unwrap();

        let receipt = backend.copy("orders.mdb", "RAW", "PROCESSING").await.unwrap();
        assert_eq!(receipt.size, 7);
        assert!(backend.stat("PROCESSING", "orders.mdb").await.unwrap().is_some());
        assert!(backend.stat("RAW", "orders.mdb").await.unwrap().is_some());

        backend.delete("orders.mdb", "RAW").await.unwrap();
        assert!(backend.stat("RAW", "orders.mdb").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_copy_missing_file() {
        let (backend, _temp) = backend_with_stages(&["RAW", "PROCESSING"]).await;
        let err = backend.copy("ghost.mdb", "RAW", "PROCESSING").await.unwrap_err();
        assert!(matches!(err, StageError::FileNotFound { .. }));
        assert!(backend.list("PROCESSING", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_checksum_and_download() {
        let (backend, temp) = backend_with_stages(&["RAW"]).await;
        let receipt = backend
            .upload("RAW", "hello.txt", b"hello world".to_vec())
            .await
            .unwrap();
        assert_eq!(
            receipt.checksum,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );

        let dest = temp.path().join("copy.txt");
        let bytes = backend.download("RAW", "hello.txt", &dest).await.unwrap();
        assert_eq!(bytes, 11);
        assert_eq!(std::fs::read(dest).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let (backend, _temp) = backend_with_stages(&["RAW"]).await;
        assert!(matches!(
            backend.stat("RAW", "../secret").await,
            Err(StageError::InvalidName(_))
        ));
        assert!(backend.create_location("/abs").await.is_err());
    }
}
