//! Shared fixtures for integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use mdbstage_common::types::{Row, StagedFile};
use mdbstage_ingest::config::{PersistFailurePolicy, StageConfig};
use mdbstage_ingest::error::{ExtractError, StageError, StageResult};
use mdbstage_ingest::extract::TableExtractor;
use mdbstage_ingest::record::StageRecordSink;
use mdbstage_ingest::stage::{CopyReceipt, LocalStageBackend, StageBackend, UploadReceipt};
use mdbstage_ingest::IngestContext;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const RAW: &str = "RAW";
pub const PROCESSING: &str = "PROCESSING";
pub const COMPLETE: &str = "COMPLETE";
pub const ERROR: &str = "ERROR";
pub const RECORDS: &str = "RECORDS";

/// Build a row from `(column, value)` pairs
pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// What the scripted extractor returns for one table
#[derive(Clone)]
pub enum TableScript {
    Rows(Vec<Row>),
    Unreadable,
}

/// Extractor answering from a per-file script instead of running tools
#[derive(Default)]
pub struct ScriptedExtractor {
    files: Mutex<HashMap<String, Result<Vec<(String, TableScript)>, String>>>,
    passwords: Mutex<Vec<Option<String>>>,
}

impl ScriptedExtractor {
    pub fn with_tables(self, file: &str, tables: Vec<(&str, TableScript)>) -> Self {
        let tables = tables
            .into_iter()
            .map(|(name, script)| (name.to_string(), script))
            .collect();
        self.files.lock().unwrap().insert(file.to_string(), Ok(tables));
        self
    }

    /// Listing tables of `file` fails the way mdb-tools does on a corrupt file
    pub fn failing(self, file: &str, stderr: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(file.to_string(), Err(stderr.to_string()));
        self
    }

    pub fn passwords_seen(&self) -> Vec<Option<String>> {
        self.passwords.lock().unwrap().clone()
    }

    fn script_for(&self, path: &Path) -> Option<Result<Vec<(String, TableScript)>, String>> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        self.files.lock().unwrap().get(&name).cloned()
    }
}

#[async_trait]
impl TableExtractor for ScriptedExtractor {
    async fn list_tables(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Vec<String>, ExtractError> {
        self.passwords
            .lock()
            .unwrap()
            .push(password.map(str::to_string));

        if !path.is_file() {
            return Err(ExtractError::ToolFailed {
                tool: "mdb-tables".to_string(),
                status: Some(1),
                stderr: format!("File not found: {}", path.display()),
            });
        }

        match self.script_for(path) {
            Some(Ok(tables)) => Ok(tables.into_iter().map(|(name, _)| name).collect()),
            Some(Err(stderr)) => Err(ExtractError::ToolFailed {
                tool: "mdb-tables".to_string(),
                status: Some(1),
                stderr,
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn read_table(&self, path: &Path, table: &str) -> Vec<Row> {
        let Some(Ok(tables)) = self.script_for(path) else {
            return Vec::new();
        };
        tables
            .into_iter()
            .find(|(name, _)| name == table)
            .and_then(|(_, script)| match script {
                TableScript::Rows(rows) => Some(rows),
                TableScript::Unreadable => None,
            })
            .unwrap_or_default()
    }
}

/// Backend operations that can be made to fail
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `list` of this stage
    List(String),
    /// `copy` into this stage
    CopyInto(String),
    /// `delete` from this stage
    DeleteFrom(String),
    /// `upload` into this stage
    UploadInto(String),
    /// `download` from this stage
    DownloadFrom(String),
    /// `copy` into this stage reports a truncated size
    ShortCopyInto(String),
}

/// Local backend with switchable faults
pub struct FaultyBackend {
    inner: LocalStageBackend,
    faults: Mutex<HashSet<Fault>>,
}

impl FaultyBackend {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalStageBackend::new(root),
            faults: Mutex::new(HashSet::new()),
        }
    }

    pub fn inject(&self, fault: Fault) {
        self.faults.lock().unwrap().insert(fault);
    }

    pub fn clear(&self) {
        self.faults.lock().unwrap().clear();
    }

    fn check(&self, fault: Fault) -> StageResult<()> {
        if self.faults.lock().unwrap().contains(&fault) {
            Err(StageError::S3(format!("injected fault: {:?}", fault)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StageBackend for FaultyBackend {
    fn kind(&self) -> &'static str {
        "faulty"
    }

    async fn location_exists(&self, location: &str) -> StageResult<bool> {
        self.inner.location_exists(location).await
    }

    async fn create_location(&self, location: &str) -> StageResult<()> {
        self.inner.create_location(location).await
    }

    async fn list(&self, location: &str, sub_path: &str) -> StageResult<Vec<StagedFile>> {
        self.check(Fault::List(location.to_string()))?;
        self.inner.list(location, sub_path).await
    }

    async fn stat(&self, location: &str, name: &str) -> StageResult<Option<StagedFile>> {
        self.inner.stat(location, name).await
    }

    async fn copy(&self, name: &str, source: &str, target: &str) -> StageResult<CopyReceipt> {
        self.check(Fault::CopyInto(target.to_string()))?;
        let mut receipt = self.inner.copy(name, source, target).await?;
        if self.check(Fault::ShortCopyInto(target.to_string())).is_err() {
            receipt.size = receipt.size.saturating_sub(1);
        }
        Ok(receipt)
    }

    async fn delete(&self, name: &str, location: &str) -> StageResult<()> {
        self.check(Fault::DeleteFrom(location.to_string()))?;
        self.inner.delete(name, location).await
    }

    async fn download(&self, location: &str, name: &str, dest: &Path) -> StageResult<u64> {
        self.check(Fault::DownloadFrom(location.to_string()))?;
        self.inner.download(location, name, dest).await
    }

    async fn upload(&self, location: &str, name: &str, data: Vec<u8>) -> StageResult<UploadReceipt> {
        self.check(Fault::UploadInto(location.to_string()))?;
        self.inner.upload(location, name, data).await
    }
}

/// A temp stage root with the raw stage created
pub struct Fixture {
    pub temp: TempDir,
    pub backend: Arc<FaultyBackend>,
    pub scratch: PathBuf,
}

impl Fixture {
    pub async fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let backend = Arc::new(FaultyBackend::new(&temp.path().join("stages")));
        backend.create_location(RAW).await.unwrap();
        let scratch = temp.path().join("scratch");
        Self {
            temp,
            backend,
            scratch,
        }
    }

    pub async fn drop_file(&self, name: &str, content: &[u8]) {
        self.backend.upload(RAW, name, content.to_vec()).await.unwrap();
    }

    pub fn stages(&self, policy: PersistFailurePolicy) -> StageConfig {
        StageConfig {
            raw_stage: RAW.to_string(),
            processing_stage: PROCESSING.to_string(),
            complete_stage: COMPLETE.to_string(),
            error_stage: ERROR.to_string(),
            record_stage: RECORDS.to_string(),
            scratch_dir: Some(self.scratch.clone()),
            persist_failure_policy: policy,
        }
    }

    pub fn context(&self, extractor: Arc<ScriptedExtractor>) -> IngestContext {
        self.context_with_policy(extractor, PersistFailurePolicy::Complete)
    }

    pub fn context_with_policy(
        &self,
        extractor: Arc<ScriptedExtractor>,
        policy: PersistFailurePolicy,
    ) -> IngestContext {
        let sink = Arc::new(StageRecordSink::new(self.backend.clone(), RECORDS));
        IngestContext::new(self.backend.clone(), extractor, sink, self.stages(policy))
    }

    /// Names of the files currently in `stage`, empty when it does not exist
    pub async fn names_in(&self, stage: &str) -> Vec<String> {
        if !self.backend.location_exists(stage).await.unwrap() {
            return Vec::new();
        }
        self.backend
            .list(stage, "")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect()
    }

    /// Stages among the four pipeline stages that hold `file`
    pub async fn stages_holding(&self, file: &str) -> Vec<&'static str> {
        let mut holding = Vec::new();
        for stage in [RAW, PROCESSING, COMPLETE, ERROR] {
            if self.names_in(stage).await.iter().any(|n| n == file) {
                holding.push(stage);
            }
        }
        holding
    }
}
