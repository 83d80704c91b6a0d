//! Command line definition of the `mdbstage` binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mdbstage - staged ingestion of MS Access files
#[derive(Parser, Debug)]
#[command(name = "mdbstage")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./secrets/configuration.toml when present)
    #[arg(short, long, env = "MDBSTAGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one ingestion cycle over the raw stage
    Run {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run ingestion cycles repeatedly until interrupted
    Watch {
        /// Seconds to wait between cycles
        #[arg(short, long, default_value = "60")]
        interval: u64,
    },

    /// List files in a stage
    List {
        /// Stage name
        stage: String,

        /// Sub-path inside the stage
        #[arg(short, long, default_value = "")]
        path: String,
    },

    /// Move a file between stages
    Move {
        /// File name relative to the source stage
        file: String,

        /// Source stage
        from: String,

        /// Target stage
        to: String,

        /// Create the target stage if it does not exist
        #[arg(long)]
        create_target: bool,
    },

    /// Upload a local file into a stage
    Upload {
        /// Local file to upload
        file: PathBuf,

        /// Target stage
        stage: String,

        /// Sub-path inside the stage
        #[arg(short, long, default_value = "")]
        path: String,
    },

    /// Remove a file from a stage
    Remove {
        /// Stage name
        stage: String,

        /// File name relative to the stage
        file: String,
    },

    /// Extract all tables of a local file and print them as JSON
    Extract {
        /// Local .mdb or .accdb file
        file: PathBuf,

        /// Database password (not supported by mdb-tools, ignored with a warning)
        #[arg(long, env = "MDBSTAGE_MDB_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_move() {
        let cli = Cli::try_parse_from([
            "mdbstage",
            "move",
            "orders.mdb",
            "RAW",
            "ERROR",
            "--create-target",
        ])
        .unwrap();
        match cli.command {
            Commands::Move {
                file,
                from,
                to,
                create_target,
            } => {
                assert_eq!(file, "orders.mdb");
                assert_eq!(from, "RAW");
                assert_eq!(to, "ERROR");
                assert!(create_target);
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["mdbstage", "run", "--config", "/etc/mdbstage.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/mdbstage.toml")));
    }
}
