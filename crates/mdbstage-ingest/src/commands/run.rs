//! `mdbstage run` command implementation

use crate::context::IngestContext;
use crate::error::CliResult;
use crate::pipeline::{run_once, FileOutcome, RunReport};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

/// Run one ingestion cycle and print its report
pub async fn run(ctx: &IngestContext, json: bool) -> CliResult<RunReport> {
    let report = run_once(ctx).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(report)
}

pub(crate) fn print_report(report: &RunReport) {
    if report.files.is_empty() {
        println!("No files to process.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["File", "Outcome", "Details"]);

    for file in &report.files {
        let details = match &file.outcome {
            FileOutcome::Completed {
                record: Some(record),
                tables,
                rows,
            } => format!("{} ({} tables, {} rows)", record, tables, rows),
            FileOutcome::Completed { record: None, .. } => "record not persisted".to_string(),
            FileOutcome::Failed { reason }
            | FileOutcome::ReservationFailed { reason }
            | FileOutcome::FinalizationFailed { reason, .. } => reason.clone(),
        };
        table.add_row(vec![file.file.clone(), file.outcome.label().to_string(), details]);
    }
    println!("{table}");

    for file in &report.files {
        for warning in &file.warnings {
            println!("{} {}: {}", "warning:".yellow().bold(), file.file, warning);
        }
    }

    let summary = format!(
        "{} completed, {} failed, {} not reserved, {} not finalized",
        report.completed(),
        report.failed(),
        report.reservation_failed(),
        report.finalization_failed()
    );
    if report.is_clean() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.yellow());
    }
}
