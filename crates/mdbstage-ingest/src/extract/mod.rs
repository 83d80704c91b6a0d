//! Table extraction from legacy database files

pub mod mdbtools;

use crate::error::ExtractError;
use async_trait::async_trait;
use mdbstage_common::types::{Row, TableSet};
use std::path::Path;
use tracing::{info, instrument};

pub use mdbtools::MdbToolsExtractor;

/// Notice attached to every extraction that was given a password
pub const PASSWORD_IGNORED: &str =
    "mdb-tools does not support passwords; the password will be ignored";

/// Reads tables out of a local database file
#[async_trait]
pub trait TableExtractor: Send + Sync {
    /// Names of all tables in the file, in the order the file reports them.
    ///
    /// A file without tables yields an empty list, not an error.
    async fn list_tables(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Vec<String>, ExtractError>;

    /// Rows of one table. Any failure is logged and yields no rows.
    async fn read_table(&self, path: &Path, table: &str) -> Vec<Row>;
}

/// List every table and read each one.
///
/// Fails only when the table list cannot be obtained; unreadable tables map
/// to empty row lists.
#[instrument(skip(extractor, password), fields(path = %path.display()))]
pub async fn extract_all(
    extractor: &dyn TableExtractor,
    path: &Path,
    password: Option<&str>,
) -> Result<TableSet, ExtractError> {
    let tables = extractor.list_tables(path, password).await?;

    let mut result = TableSet::with_capacity(tables.len());
    for table in tables {
        let rows = extractor.read_table(path, &table).await;
        result.insert(table, rows);
    }

    info!(
        "Extracted {} tables ({} rows)",
        result.len(),
        result.values().map(Vec::len).sum::<usize>()
    );
    Ok(result)
}
