//! Persisting ingestion records
//!
//! Both entry points report failures through the log and return `None`;
//! nothing here propagates an error to the caller.

pub mod stage_sink;

use crate::error::RecordError;
use async_trait::async_trait;
use chrono::Local;
use mdbstage_common::types::{parse_table_payload, IngestionRecord, TableSet};
use tracing::{error, info, instrument};

pub use stage_sink::StageRecordSink;

/// Durable store for ingestion records. Records are only ever added.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Store a record and return the name it was stored under
    async fn store(&self, record: &IngestionRecord) -> Result<String, RecordError>;
}

/// Persist a JSON payload of `{table: [{column: text}]}` as a new record
/// named `<base_name>_<YYYYMMDD_HHMMSS>`.
#[instrument(skip(sink, payload))]
pub async fn write_record(sink: &dyn RecordSink, payload: &str, base_name: &str) -> Option<String> {
    let tables = match parse_table_payload(payload) {
        Ok(tables) => tables,
        Err(e) => {
            let e = RecordError::Malformed(e.to_string());
            error!(error = %e, "Record not written");
            return None;
        },
    };

    write_tables(sink, tables, base_name).await
}

/// Persist in-memory tables as a new record
#[instrument(skip(sink, tables), fields(tables = tables.len()))]
pub async fn write_tables(sink: &dyn RecordSink, tables: TableSet, base_name: &str) -> Option<String> {
    let record = IngestionRecord::new(base_name, Local::now(), tables);

    match sink.store(&record).await {
        Ok(name) => {
            info!(
                record = %name,
                tables = record.tables.len(),
                rows = record.row_count(),
                "Record written"
            );
            Some(name)
        },
        Err(e) => {
            error!(record = %record.name, error = %e, "Error writing record");
            None
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting {
        stored: Mutex<Vec<IngestionRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl RecordSink for Collecting {
        async fn store(&self, record: &IngestionRecord) -> Result<String, RecordError> {
            if self.fail {
                return Err(RecordError::Sink {
                    name: record.name.clone(),
                    source: StageError::S3("unavailable".to_string()),
                });
            }
            self.stored.lock().unwrap().push(record.clone());
            Ok(record.name.clone())
        }
    }

    #[tokio::test]
    async fn test_write_record_names_with_timestamp() {
        let sink = Collecting::default();
        let name = write_record(&sink, r#"{"customers": [{"id": "1"}]}"#, "orders_mdb")
            .await
            .unwrap();

        let suffix = name.strip_prefix("orders_mdb_").unwrap();
        assert_eq!(suffix.len(), "20240101_120000".len());
        assert_eq!(suffix.as_bytes()[8], b'_');
        assert!(suffix.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));

        let stored = sink.stored.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].tables["customers"][0]["id"], "1");
    }

    #[tokio::test]
    async fn test_write_record_keeps_payload_order() {
        let sink = Collecting::default();
        let payload = r#"{"orders": [{"order_id": "1", "amount": "7"}], "customers": []}"#;
        write_record(&sink, payload, "orders_mdb").await.unwrap();

        let stored = sink.stored.lock().unwrap();
        let tables: Vec<&str> = stored[0].tables.keys().map(String::as_str).collect();
        assert_eq!(tables, vec!["orders", "customers"]);
        let columns: Vec<&str> = stored[0].tables["orders"][0]
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(columns, vec!["order_id", "amount"]);
    }

    #[tokio::test]
    async fn test_malformed_payload_writes_nothing() {
        let sink = Collecting::default();
        assert!(write_record(&sink, "not json", "x").await.is_none());
        assert!(write_record(&sink, r#"{"t": [{"n": 1}]}"#, "x").await.is_none());
        assert!(sink.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_valid_record() {
        let sink = Collecting::default();
        assert!(write_record(&sink, "{}", "empty_mdb").await.is_some());
        assert!(sink.stored.lock().unwrap()[0].tables.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_returns_none() {
        let sink = Collecting {
            fail: true,
            ..Default::default()
        };
        assert!(write_tables(&sink, TableSet::new(), "x").await.is_none());
    }
}
