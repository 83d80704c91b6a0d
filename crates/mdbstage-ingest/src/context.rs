//! Everything an ingestion run needs, passed explicitly to each operation

use crate::config::{AppConfig, StageConfig, StorageConfig};
use crate::error::ConfigError;
use crate::extract::{MdbToolsExtractor, TableExtractor};
use crate::record::{RecordSink, StageRecordSink};
use crate::stage::{LocalStageBackend, S3StageBackend, StageBackend};
use crate::warehouse::WarehouseContext;
use std::sync::Arc;
use tracing::info;

/// Collaborators and settings of an ingestion run
#[derive(Clone)]
pub struct IngestContext {
    pub backend: Arc<dyn StageBackend>,
    pub extractor: Arc<dyn TableExtractor>,
    pub sink: Arc<dyn RecordSink>,
    pub stages: StageConfig,
    /// Passed to the extractor for every file
    pub password: Option<String>,
    pub warehouse: Option<WarehouseContext>,
}

impl std::fmt::Debug for IngestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestContext")
            .field("backend", &self.backend.kind())
            .field("stages", &self.stages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("warehouse", &self.warehouse)
            .finish_non_exhaustive()
    }
}

impl IngestContext {
    pub fn new(
        backend: Arc<dyn StageBackend>,
        extractor: Arc<dyn TableExtractor>,
        sink: Arc<dyn RecordSink>,
        stages: StageConfig,
    ) -> Self {
        Self {
            backend,
            extractor,
            sink,
            stages,
            password: None,
            warehouse: None,
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_warehouse(mut self, warehouse: Option<WarehouseContext>) -> Self {
        self.warehouse = warehouse;
        self
    }

    /// Build the production context: configured storage backend, mdb-tools
    /// extraction, and records written to the record stage.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let backend = backend_from_config(&config.storage);
        let extractor = Arc::new(MdbToolsExtractor::from_config(&config.extractor));
        let sink = Arc::new(StageRecordSink::new(
            backend.clone(),
            config.stages.record_stage.clone(),
        ));
        let warehouse = WarehouseContext::resolve(config.warehouse.as_ref())?;

        info!(
            backend = backend.kind(),
            raw = %config.stages.raw_stage,
            records = %config.stages.record_stage,
            "Ingestion context ready"
        );

        Ok(Self::new(backend, extractor, sink, config.stages.clone())
            .with_password(config.extractor.password.clone())
            .with_warehouse(warehouse))
    }
}

/// Storage backend selected by configuration
pub fn backend_from_config(storage: &StorageConfig) -> Arc<dyn StageBackend> {
    match storage {
        StorageConfig::Local { root } => Arc::new(LocalStageBackend::new(root.clone())),
        StorageConfig::S3(s3) => Arc::new(S3StageBackend::new(s3)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PersistFailurePolicy;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_local() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig {
            storage: StorageConfig::Local {
                root: temp.path().to_path_buf(),
            },
            ..Default::default()
        };
        config.extractor.password = Some("pw".to_string());
        config.stages.persist_failure_policy = PersistFailurePolicy::Error;

        let context = IngestContext::from_config(&config).unwrap();
        assert_eq!(context.backend.kind(), "local");
        assert_eq!(context.password.as_deref(), Some("pw"));
        assert_eq!(context.stages.persist_failure_policy, PersistFailurePolicy::Error);

        let rendered = format!("{:?}", context);
        assert!(rendered.contains("local"));
        assert!(!rendered.contains("\"pw\""));
    }
}
