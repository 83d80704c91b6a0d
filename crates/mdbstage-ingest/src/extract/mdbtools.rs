//! Extraction through the `mdb-tools` command line programs
//!
//! `mdb-tables -1 <file>` prints one table name per line and
//! `mdb-export <file> <table>` prints a table as CSV with a header row.
//! A tool counts as failed when it exits non-zero or writes anything to
//! stderr.

use super::{TableExtractor, PASSWORD_IGNORED};
use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use async_trait::async_trait;
use mdbstage_common::types::Row;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, error, instrument, warn};

pub const DEFAULT_MDB_TABLES: &str = "mdb-tables";
pub const DEFAULT_MDB_EXPORT: &str = "mdb-export";

#[derive(Debug, Clone)]
pub struct MdbToolsExtractor {
    mdb_tables: PathBuf,
    mdb_export: PathBuf,
}

impl Default for MdbToolsExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MDB_TABLES, DEFAULT_MDB_EXPORT)
    }
}

impl MdbToolsExtractor {
    pub fn new(mdb_tables: impl Into<PathBuf>, mdb_export: impl Into<PathBuf>) -> Self {
        Self {
            mdb_tables: mdb_tables.into(),
            mdb_export: mdb_export.into(),
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.mdb_tables.clone(), config.mdb_export.clone())
    }

    async fn run(tool: &Path, args: &[&OsStr]) -> Result<Vec<u8>, ExtractError> {
        let tool_name = tool.display().to_string();
        let output = Command::new(tool)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExtractError::Spawn {
                tool: tool_name.clone(),
                source,
            })?;

        check_output(&tool_name, output)
    }
}

fn check_output(tool: &str, output: Output) -> Result<Vec<u8>, ExtractError> {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() || !stderr.is_empty() {
        return Err(ExtractError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.code(),
            stderr,
        });
    }
    Ok(output.stdout)
}

/// One table name per non-blank line
pub(crate) fn parse_table_list(tool: &str, stdout: &[u8]) -> Result<Vec<String>, ExtractError> {
    let text = std::str::from_utf8(stdout).map_err(|e| ExtractError::Output {
        tool: tool.to_string(),
        message: format!("table list is not UTF-8: {}", e),
    })?;

    Ok(text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// CSV with a header row into rows keyed by column, in column order
pub(crate) fn parse_csv_rows(data: &[u8]) -> Result<Vec<Row>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

#[async_trait]
impl TableExtractor for MdbToolsExtractor {
    #[instrument(skip(self, password), fields(path = %path.display()))]
    async fn list_tables(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Vec<String>, ExtractError> {
        if password.is_some_and(|p| !p.is_empty()) {
            warn!("{}", PASSWORD_IGNORED);
        }

        let stdout = Self::run(&self.mdb_tables, &[OsStr::new("-1"), path.as_os_str()]).await?;
        let tables = parse_table_list(&self.mdb_tables.display().to_string(), &stdout)?;
        debug!("Found {} tables", tables.len());
        Ok(tables)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_table(&self, path: &Path, table: &str) -> Vec<Row> {
        let stdout = match Self::run(&self.mdb_export, &[path.as_os_str(), OsStr::new(table)]).await {
            Ok(stdout) => stdout,
            Err(e) => {
                error!(table = %table, error = %e, "Error exporting table data");
                return Vec::new();
            },
        };

        match parse_csv_rows(&stdout) {
            Ok(rows) => {
                debug!("Read {} rows from {}", rows.len(), table);
                rows
            },
            Err(e) => {
                error!(table = %table, error = %e, "Could not parse exported table data");
                Vec::new()
            },
        }
    }
}
