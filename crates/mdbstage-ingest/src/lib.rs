//! mdbstage ingestion library
//!
//! Moves uploaded MS Access files through a staged pipeline:
//!
//! - **Stages** ([`stage`]): named locations holding files, on a local
//!   directory tree or an S3 bucket, with a copy-verify-delete mover
//! - **Extraction** ([`extract`]): every table of a file as ordered text rows,
//!   through the `mdb-tools` programs
//! - **Records** ([`record`]): extracted tables persisted as timestamped JSON
//! - **Pipeline** ([`pipeline`]): raw -> processing -> complete | error, one
//!   file at a time
//!
//! All collaborators of a run are carried in an explicit [`IngestContext`].

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod record;
pub mod stage;
pub mod warehouse;

pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use context::IngestContext;
pub use error::{CliError, CliResult};
