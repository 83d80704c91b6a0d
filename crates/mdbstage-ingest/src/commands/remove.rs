//! `mdbstage remove` command implementation

use crate::error::{CliResult, StageError};
use crate::stage::StageBackend;
use colored::Colorize;
use tracing::info;

pub async fn run(backend: &dyn StageBackend, stage: &str, file: &str) -> CliResult<()> {
    if backend.stat(stage, file).await?.is_none() {
        return Err(StageError::FileNotFound {
            location: stage.to_string(),
            name: file.to_string(),
        }
        .into());
    }

    backend.delete(file, stage).await?;
    info!(stage = %stage, file = %file, "File removed");
    println!("{} removed {} from {}", "✓".green(), file, stage);
    Ok(())
}
