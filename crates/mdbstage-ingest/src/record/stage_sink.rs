//! Records stored as JSON documents in a stage location

use super::RecordSink;
use crate::error::RecordError;
use crate::stage::StageBackend;
use async_trait::async_trait;
use mdbstage_common::types::IngestionRecord;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Upper bound on `_<n>` suffixes tried when a record name is already taken
const MAX_NAME_SUFFIX: u32 = 100;

/// Writes each record to `<location>/<record name>.json`.
///
/// An existing record is never overwritten: when two records are generated
/// within the same second the later one gets a `_<n>` suffix.
pub struct StageRecordSink {
    backend: Arc<dyn StageBackend>,
    location: String,
    create_location: bool,
}

impl StageRecordSink {
    pub fn new(backend: Arc<dyn StageBackend>, location: impl Into<String>) -> Self {
        Self {
            backend,
            location: location.into(),
            create_location: true,
        }
    }

    /// Fail instead of creating the record stage when it is missing
    pub fn require_existing_location(mut self) -> Self {
        self.create_location = false;
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn sink_error(name: &str, source: crate::error::StageError) -> RecordError {
        RecordError::Sink {
            name: name.to_string(),
            source,
        }
    }

    async fn free_name(&self, base: &str) -> Result<String, RecordError> {
        for n in 0..=MAX_NAME_SUFFIX {
            let candidate = if n == 0 {
                base.to_string()
            } else {
                format!("{}_{}", base, n)
            };
            let taken = self
                .backend
                .stat(&self.location, &file_name(&candidate))
                .await
                .map_err(|e| Self::sink_error(base, e))?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
            warn!(record = %candidate, "Record name already taken");
        }
        Err(RecordError::NameExhausted(base.to_string()))
    }
}

fn file_name(record_name: &str) -> String {
    format!("{}.json", record_name)
}

#[async_trait]
impl RecordSink for StageRecordSink {
    #[instrument(skip(self, record), fields(stage = %self.location, record = %record.name))]
    async fn store(&self, record: &IngestionRecord) -> Result<String, RecordError> {
        let exists = self
            .backend
            .location_exists(&self.location)
            .await
            .map_err(|e| Self::sink_error(&record.name, e))?;
        if !exists && self.create_location {
            self.backend
                .create_location(&self.location)
                .await
                .map_err(|e| Self::sink_error(&record.name, e))?;
        }

        let name = self.free_name(&record.name).await?;
        let payload = if name == record.name {
            serde_json::to_vec_pretty(record)?
        } else {
            let renamed = IngestionRecord {
                name: name.clone(),
                ..record.clone()
            };
            serde_json::to_vec_pretty(&renamed)?
        };

        let receipt = self
            .backend
            .upload(&self.location, &file_name(&name), payload)
            .await
            .map_err(|e| Self::sink_error(&name, e))?;

        debug!(
            "Stored {} ({} bytes, sha256 {})",
            receipt.name, receipt.size, receipt.checksum
        );
        Ok(name)
    }
}
