//! `mdbstage move` command implementation

use crate::error::{CliError, CliResult};
use crate::stage::{move_staged_file, MoveOutcome, StageBackend};
use colored::Colorize;

pub async fn run(
    backend: &dyn StageBackend,
    file: &str,
    from: &str,
    to: &str,
    create_target: bool,
) -> CliResult<()> {
    match move_staged_file(backend, file, from, to, create_target).await {
        MoveOutcome::Moved => {
            println!("{} {} moved from {} to {}", "✓".green(), file, from, to);
            Ok(())
        },
        MoveOutcome::MovedWithLeftover { reason } => {
            println!("{} {} copied to {}", "✓".green(), file, to);
            println!(
                "{} could not remove it from {} ({}); remove it manually with `mdbstage remove {} {}`",
                "warning:".yellow().bold(),
                from,
                reason,
                from,
                file
            );
            Ok(())
        },
        MoveOutcome::Failed(failure) => Err(CliError::Move(failure.to_string())),
    }
}
