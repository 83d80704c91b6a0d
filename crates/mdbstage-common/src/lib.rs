//! mdbstage common library
//!
//! Shared types, utilities, and error handling for the mdbstage workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the workspace error type and result alias
//! - **Checksums**: content digests for staged files and records
//! - **Logging**: `tracing` subscriber configuration
//! - **Types**: staged files, extracted rows, and ingestion records
//!
//! # Example
//!
//! ```no_run
//! use mdbstage_common::types::{record_base_name, IngestionRecord, TableSet};
//!
//! let base = record_base_name("orders.mdb");
//! let record = IngestionRecord::new(&base, chrono::Local::now(), TableSet::new());
//! assert!(record.name.starts_with("orders_mdb_"));
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{MdbStageError, Result};
