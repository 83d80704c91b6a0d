//! `mdbstage upload` command implementation

use crate::error::{CliError, CliResult};
use crate::stage::{join_name, StageBackend, UploadReceipt};
use colored::Colorize;
use std::path::Path;

pub async fn run(
    backend: &dyn StageBackend,
    file: &Path,
    stage: &str,
    sub_path: &str,
) -> CliResult<UploadReceipt> {
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            CliError::InvalidArgument(format!("'{}' is not a file name", file.display()))
        })?;

    let data = tokio::fs::read(file).await?;
    let name = join_name(sub_path, file_name);
    let receipt = backend.upload(stage, &name, data).await?;

    println!(
        "{} uploaded {} to {} ({} bytes, sha256 {})",
        "✓".green(),
        receipt.name,
        receipt.location,
        receipt.size,
        &receipt.checksum[..16.min(receipt.checksum.len())]
    );
    Ok(receipt)
}
