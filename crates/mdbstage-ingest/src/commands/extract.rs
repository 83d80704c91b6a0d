//! `mdbstage extract` command implementation
//!
//! Runs the extractor on a local file and prints the record that ingestion
//! would persist, without touching any stage.

use crate::error::{CliError, CliResult};
use crate::extract::{extract_all, TableExtractor};
use chrono::Local;
use mdbstage_common::types::{record_base_name, IngestionRecord};
use std::path::Path;

pub async fn run(
    extractor: &dyn TableExtractor,
    file: &Path,
    password: Option<&str>,
) -> CliResult<IngestionRecord> {
    if !file.is_file() {
        return Err(CliError::InvalidArgument(format!(
            "'{}' does not exist or is not a file",
            file.display()
        )));
    }

    let tables = extract_all(extractor, file, password).await?;
    let base_name = record_base_name(&file.to_string_lossy().replace('\\', "/"));
    let record = IngestionRecord::new(&base_name, Local::now(), tables);

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(record)
}
