//! `mdbstage list` command implementation

use super::format_bytes;
use crate::error::{CliResult, PipelineError};
use crate::stage::{list_stage, StageBackend, StagedFile};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

pub async fn run(backend: &dyn StageBackend, stage: &str, sub_path: &str) -> CliResult<Vec<StagedFile>> {
    let files = list_stage(backend, stage, sub_path)
        .await
        .ok_or_else(|| PipelineError::Lookup {
            stage: stage.to_string(),
        })?;

    if files.is_empty() {
        println!("No files in stage {}.", stage.cyan());
        return Ok(files);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Name", "Size", "Last modified"]);
    for file in &files {
        table.add_row(vec![
            file.name.clone(),
            format_bytes(file.size),
            file.last_modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default(),
        ]);
    }
    println!("{table}");

    let total: u64 = files.iter().map(|f| f.size).sum();
    println!(
        "{} files, {} in {}",
        files.len(),
        format_bytes(total),
        stage.cyan()
    );
    Ok(files)
}
