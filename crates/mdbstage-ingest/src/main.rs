//! mdbstage - main entry point

use clap::Parser;
use mdbstage_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use mdbstage_ingest::context::backend_from_config;
use mdbstage_ingest::extract::MdbToolsExtractor;
use mdbstage_ingest::{commands, AppConfig, Cli, CliResult, Commands, IngestContext};
use std::process;
use std::time::Duration;
use tracing::error;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .log_file_prefix("mdbstage")
        .filter_directives("aws_smithy_runtime=warn,aws_config=warn")
        .build();

    // Environment variables take precedence over the flags
    let log_config = match log_config.clone().with_env_overrides() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid LOG_* settings: {}", e);
            log_config
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Commands::Extract { file, password } => {
            let config = AppConfig::resolve(cli.config.as_deref())?;
            let extractor = MdbToolsExtractor::from_config(&config.extractor);
            let password = password.as_deref().or(config.extractor.password.as_deref());
            commands::extract::run(&extractor, file, password).await?;
            Ok(())
        },

        Commands::Run { json } => {
            let config = AppConfig::resolve(cli.config.as_deref())?;
            let ctx = IngestContext::from_config(&config)?;
            commands::run::run(&ctx, *json).await?;
            Ok(())
        },

        Commands::Watch { interval } => {
            let config = AppConfig::resolve(cli.config.as_deref())?;
            let ctx = IngestContext::from_config(&config)?;
            commands::watch::run(&ctx, Duration::from_secs(*interval)).await
        },

        Commands::List { stage, path } => {
            let config = AppConfig::resolve(cli.config.as_deref())?;
            let backend = backend_from_config(&config.storage);
            commands::list::run(backend.as_ref(), stage, path).await?;
            Ok(())
        },

        Commands::Move {
            file,
            from,
            to,
            create_target,
        } => {
            let config = AppConfig::resolve(cli.config.as_deref())?;
            let backend = backend_from_config(&config.storage);
            commands::move_file::run(backend.as_ref(), file, from, to, *create_target).await
        },

        Commands::Upload { file, stage, path } => {
            let config = AppConfig::resolve(cli.config.as_deref())?;
            let backend = backend_from_config(&config.storage);
            commands::upload::run(backend.as_ref(), file, stage, path).await?;
            Ok(())
        },

        Commands::Remove { stage, file } => {
            let config = AppConfig::resolve(cli.config.as_deref())?;
            let backend = backend_from_config(&config.storage);
            commands::remove::run(backend.as_ref(), stage, file).await
        },
    }
}
