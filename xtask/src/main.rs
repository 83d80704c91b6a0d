//! Build automation tasks for mdbstage
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for mdbstage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<mdbstage_ingest::Cli>();

    let content = format!(
        r#"# mdbstage CLI Reference

Generated from the CLI source code on {}.

## Overview

`mdbstage` moves uploaded MS Access files (`.mdb`, `.accdb`) through a staged
ingestion pipeline: files land in the raw stage, are reserved into the
processing stage, have every table extracted with mdb-tools, are recorded as a
timestamped JSON document in the record stage, and finally move to the
complete or error stage.

## Quick Start

```bash
# Drop a file into the raw stage
mdbstage upload ./orders.mdb RAW

# Process everything in the raw stage once
mdbstage run

# See where it went
mdbstage list COMPLETE
mdbstage list RECORDS
```

## Commands

{}

## Configuration

Settings are read from `./secrets/configuration.toml` (or `--config PATH`,
or `MDBSTAGE_CONFIG`):

```toml
[stages]
raw_stage = "RAW"
processing_stage = "PROCESSING"
complete_stage = "COMPLETE"
error_stage = "ERROR"
record_stage = "RECORDS"
persist_failure_policy = "complete"   # or "error"

[storage]
backend = "local"                     # or "s3"
root = "/srv/stages"

[extractor]
mdb_tables = "mdb-tables"
mdb_export = "mdb-export"
```

## Environment Variables

- `MDBSTAGE_CONFIG` - configuration file path
- `MDBSTAGE_RAW_STAGE`, `MDBSTAGE_PROCESSING_STAGE`, `MDBSTAGE_COMPLETE_STAGE`,
  `MDBSTAGE_ERROR_STAGE`, `MDBSTAGE_RECORD_STAGE` - stage names
- `MDBSTAGE_STORAGE_BACKEND`, `MDBSTAGE_STORAGE_ROOT` - storage selection
- `S3_ENDPOINT`, `S3_REGION`, `S3_BUCKET`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`,
  `S3_PATH_STYLE` - S3 connection
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR` - logging

---

*To update, run `cargo run -p xtask -- generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
