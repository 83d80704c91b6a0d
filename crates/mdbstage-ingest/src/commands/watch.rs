//! `mdbstage watch` command implementation
//!
//! Cycles run back to back with a pause in between, never concurrently.

use super::run::print_report;
use crate::context::IngestContext;
use crate::error::{CliError, CliResult};
use crate::pipeline::run_once;
use std::time::Duration;
use tracing::{error, info};

pub async fn run(ctx: &IngestContext, interval: Duration) -> CliResult<()> {
    if interval.is_zero() {
        return Err(CliError::InvalidArgument(
            "interval must be at least one second".to_string(),
        ));
    }

    info!("Watching stage {} every {:?}", ctx.stages.raw_stage, interval);
    let mut cycles: u64 = 0;
    loop {
        cycles += 1;
        match run_once(ctx).await {
            Ok(report) => print_report(&report),
            Err(e) => error!(cycle = cycles, error = %e, "Ingestion cycle aborted"),
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted after {} cycles", cycles);
                return Ok(());
            },
            _ = tokio::time::sleep(interval) => {},
        }
    }
}
