//! Common types used across mdbstage

use crate::error::{MdbStageError, Result};
use chrono::{DateTime, Local, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Timestamp suffix appended to record names (`orders_mdb_20240118_093015`)
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One extracted row: column name to text value, in source column order.
///
/// Values are always text. No type inference happens at extraction time.
pub type Row = IndexMap<String, String>;

/// Extracted tables of one source file, in the order the tool listed them
pub type TableSet = IndexMap<String, Vec<Row>>;

/// A file observed in a stage location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    /// Stage the file was observed in
    pub location: String,
    /// Name relative to the stage, `/`-separated when listed under a sub-path
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl StagedFile {
    /// Final path component of the name (`sub/orders.mdb` -> `orders.mdb`)
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

impl std::fmt::Display for StagedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.location, self.name)
    }
}

/// A persisted ingestion record.
///
/// Each ingestion produces a fresh record; records are never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRecord {
    /// `<base_name>_<YYYYMMDD_HHMMSS>`
    pub name: String,
    pub base_name: String,
    pub generated_at: DateTime<Local>,
    pub tables: TableSet,
}

impl IngestionRecord {
    pub fn new(base_name: &str, generated_at: DateTime<Local>, tables: TableSet) -> Self {
        Self {
            name: record_name(base_name, &generated_at),
            base_name: base_name.to_string(),
            generated_at,
            tables,
        }
    }

    /// Total row count across all tables
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Base name of the record produced for a source file: the final path
/// component with every `.` replaced by `_`.
pub fn record_base_name(source_file: &str) -> String {
    let file_name = source_file.rsplit('/').next().unwrap_or(source_file);
    file_name.replace('.', "_")
}

/// Record name for a base name at a given instant
pub fn record_name(base_name: &str, at: &DateTime<Local>) -> String {
    format!("{}_{}", base_name, at.format(RECORD_TIMESTAMP_FORMAT))
}

/// Parse a JSON payload into the canonical table-name to rows mapping.
///
/// Every value must be a list of flat objects whose values are strings.
/// Table and column order follow the payload.
pub fn parse_table_payload(payload: &str) -> Result<TableSet> {
    serde_json::from_str::<TableSet>(payload)
        .map_err(|e| MdbStageError::MalformedPayload(format!("invalid table payload: {}", e)))
}

/// Validate a stage or file name segment supplied by configuration or a user.
///
/// Names are `/`-separated relative paths without empty, `.` or `..` parts.
pub fn validate_relative_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MdbStageError::invalid_name(name, "name is empty"));
    }
    if name.starts_with('/') || name.contains('\\') {
        return Err(MdbStageError::invalid_name(
            name,
            "must be a relative '/'-separated path",
        ));
    }
    for part in name.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            return Err(MdbStageError::invalid_name(
                name,
                format!("invalid path segment '{}'", part),
            ));
        }
    }
    Ok(())
}
