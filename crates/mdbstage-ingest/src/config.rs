//! Configuration management for mdbstage
//!
//! Settings come from a TOML file (`./secrets/configuration.toml` unless told
//! otherwise), with `MDBSTAGE_*` and `S3_*` environment variables taking
//! precedence over file values:
//!
//! ```toml
//! [stages]
//! raw_stage = "RAW"
//! processing_stage = "PROCESSING"
//! complete_stage = "COMPLETE"
//! error_stage = "ERROR"
//! record_stage = "RECORDS"
//! persist_failure_policy = "complete"
//!
//! [storage]
//! backend = "local"
//! root = "/srv/stages"
//!
//! [extractor]
//! mdb_tables = "/usr/bin/mdb-tables"
//!
//! [warehouse]
//! account = "xy12345"
//! user = "INGEST"
//! private_key_path = "./secrets/rsa_key.p8"
//! role = "INGEST_ROLE"
//! ```

use crate::error::ConfigError;
use crate::extract::mdbtools::{DEFAULT_MDB_EXPORT, DEFAULT_MDB_TABLES};
use mdbstage_common::types::validate_relative_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Configuration file read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "./secrets/configuration.toml";

/// Session token mounted into service containers by the warehouse
pub const DEFAULT_TOKEN_PATH: &str = "/snowflake/session/token";

pub const DEFAULT_RAW_STAGE: &str = "RAW";
pub const DEFAULT_PROCESSING_STAGE: &str = "PROCESSING";
pub const DEFAULT_COMPLETE_STAGE: &str = "COMPLETE";
pub const DEFAULT_ERROR_STAGE: &str = "ERROR";
pub const DEFAULT_RECORD_STAGE: &str = "RECORDS";

/// Root directory of the local stage backend
pub const DEFAULT_STORAGE_ROOT: &str = "./stages";

pub const DEFAULT_S3_REGION: &str = "us-east-1";

const REDACTED: &str = "<redacted>";

/// Where a file goes when its tables were extracted but the record could not
/// be persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistFailurePolicy {
    /// Route as extracted; the failure is only reported
    #[default]
    Complete,
    /// Treat the file as failed
    Error,
}

impl fmt::Display for PersistFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistFailurePolicy::Complete => write!(f, "complete"),
            PersistFailurePolicy::Error => write!(f, "error"),
        }
    }
}

impl FromStr for PersistFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "complete" => Ok(PersistFailurePolicy::Complete),
            "error" => Ok(PersistFailurePolicy::Error),
            other => Err(ConfigError::Invalid(format!(
                "unknown persist failure policy '{}' (expected 'complete' or 'error')",
                other
            ))),
        }
    }
}

/// Stage names and per-run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(default = "default_raw_stage")]
    pub raw_stage: String,
    #[serde(default = "default_processing_stage")]
    pub processing_stage: String,
    #[serde(default = "default_complete_stage")]
    pub complete_stage: String,
    #[serde(default = "default_error_stage")]
    pub error_stage: String,
    /// Stage receiving the JSON ingestion records
    #[serde(default = "default_record_stage")]
    pub record_stage: String,
    /// Parent directory for per-file scratch directories; system temp when unset
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    #[serde(default)]
    pub persist_failure_policy: PersistFailurePolicy,
}

fn default_raw_stage() -> String {
    DEFAULT_RAW_STAGE.to_string()
}

fn default_processing_stage() -> String {
    DEFAULT_PROCESSING_STAGE.to_string()
}

fn default_complete_stage() -> String {
    DEFAULT_COMPLETE_STAGE.to_string()
}

fn default_error_stage() -> String {
    DEFAULT_ERROR_STAGE.to_string()
}

fn default_record_stage() -> String {
    DEFAULT_RECORD_STAGE.to_string()
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            raw_stage: default_raw_stage(),
            processing_stage: default_processing_stage(),
            complete_stage: default_complete_stage(),
            error_stage: default_error_stage(),
            record_stage: default_record_stage(),
            scratch_dir: None,
            persist_failure_policy: PersistFailurePolicy::default(),
        }
    }
}

impl StageConfig {
    /// All stage names with the setting they come from
    fn named(&self) -> [(&'static str, &str); 5] {
        [
            ("raw_stage", &self.raw_stage),
            ("processing_stage", &self.processing_stage),
            ("complete_stage", &self.complete_stage),
            ("error_stage", &self.error_stage),
            ("record_stage", &self.record_stage),
        ]
    }
}

/// Connection settings for an S3-compatible object store
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct S3StorageConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub path_style: bool,
}

fn default_s3_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

impl fmt::Debug for S3StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &REDACTED)
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl S3StorageConfig {
    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: default_s3_region(),
            bucket: bucket.into(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
        }
    }

    /// Defaults overlaid with `S3_*` (and `AWS_*` key) environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(endpoint) = env::var("S3_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Ok(region) = env::var("S3_REGION") {
            self.region = region;
        }
        if let Ok(bucket) = env::var("S3_BUCKET") {
            self.bucket = bucket;
        }
        if let Ok(key) = env::var("S3_ACCESS_KEY").or_else(|_| env::var("AWS_ACCESS_KEY_ID")) {
            self.access_key = key;
        }
        if let Ok(secret) =
            env::var("S3_SECRET_KEY").or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
        {
            self.secret_key = secret;
        }
        if let Some(path_style) = env::var("S3_PATH_STYLE").ok().and_then(|v| v.parse().ok()) {
            self.path_style = path_style;
        }
    }
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_s3_region(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            path_style: false,
        }
    }
}

/// Which storage holds the stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Each stage is a directory under `root`
    Local {
        #[serde(default = "default_storage_root")]
        root: PathBuf,
    },
    /// Each stage is a key prefix in one bucket
    S3(S3StorageConfig),
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_ROOT)
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local {
            root: default_storage_root(),
        }
    }
}

impl StorageConfig {
    pub fn backend_name(&self) -> &'static str {
        match self {
            StorageConfig::Local { .. } => "local",
            StorageConfig::S3(_) => "s3",
        }
    }
}

/// External extraction tools
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_mdb_tables")]
    pub mdb_tables: PathBuf,
    #[serde(default = "default_mdb_export")]
    pub mdb_export: PathBuf,
    /// Database password; accepted but not supported by mdb-tools
    #[serde(default)]
    pub password: Option<String>,
}

fn default_mdb_tables() -> PathBuf {
    PathBuf::from(DEFAULT_MDB_TABLES)
}

fn default_mdb_export() -> PathBuf {
    PathBuf::from(DEFAULT_MDB_EXPORT)
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            mdb_tables: default_mdb_tables(),
            mdb_export: default_mdb_export(),
            password: None,
        }
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("mdb_tables", &self.mdb_tables)
            .field("mdb_export", &self.mdb_export)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// Warehouse connection parameters, consumed by the session collaborator
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub account: String,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    /// Service token; when this file exists the session runs as the service user
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
}

fn default_token_path() -> PathBuf {
    PathBuf::from(DEFAULT_TOKEN_PATH)
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("private_key_path", &self.private_key_path)
            .field("role", &self.role)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("token_path", &self.token_path)
            .finish()
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub stages: StageConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub warehouse: Option<WarehouseConfig>,
}

impl AppConfig {
    /// Parse TOML text without applying environment overrides
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load a configuration file, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&text, path)?.with_env_overrides()?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` when given; otherwise the default file when it exists, or
    /// defaults plus environment overrides when it does not.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load(default_path);
        }

        debug!("No configuration file at {}, using defaults", DEFAULT_CONFIG_PATH);
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MDBSTAGE_*` and `S3_*` environment variables
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        let stages = &mut self.stages;
        for (var, field) in [
            ("MDBSTAGE_RAW_STAGE", &mut stages.raw_stage),
            ("MDBSTAGE_PROCESSING_STAGE", &mut stages.processing_stage),
            ("MDBSTAGE_COMPLETE_STAGE", &mut stages.complete_stage),
            ("MDBSTAGE_ERROR_STAGE", &mut stages.error_stage),
            ("MDBSTAGE_RECORD_STAGE", &mut stages.record_stage),
        ] {
            if let Ok(value) = env::var(var) {
                *field = value;
            }
        }
        if let Ok(dir) = env::var("MDBSTAGE_SCRATCH_DIR") {
            stages.scratch_dir = Some(PathBuf::from(dir));
        }
        if let Ok(policy) = env::var("MDBSTAGE_PERSIST_FAILURE_POLICY") {
            stages.persist_failure_policy = policy.parse()?;
        }

        if let Ok(backend) = env::var("MDBSTAGE_STORAGE_BACKEND") {
            self.storage = match (backend.to_lowercase().as_str(), self.storage) {
                ("local", StorageConfig::Local { root }) => StorageConfig::Local { root },
                ("local", StorageConfig::S3(_)) => StorageConfig::default(),
                ("s3", StorageConfig::S3(s3)) => StorageConfig::S3(s3),
                ("s3", StorageConfig::Local { .. }) => StorageConfig::S3(S3StorageConfig::default()),
                (other, _) => {
                    return Err(ConfigError::Invalid(format!(
                        "unknown storage backend '{}' (expected 'local' or 's3')",
                        other
                    )))
                },
            };
        }
        match &mut self.storage {
            StorageConfig::Local { root } => {
                if let Ok(dir) = env::var("MDBSTAGE_STORAGE_ROOT") {
                    *root = PathBuf::from(dir);
                }
            },
            StorageConfig::S3(s3) => s3.apply_env(),
        }

        if let Ok(tool) = env::var("MDBSTAGE_MDB_TABLES") {
            self.extractor.mdb_tables = PathBuf::from(tool);
        }
        if let Ok(tool) = env::var("MDBSTAGE_MDB_EXPORT") {
            self.extractor.mdb_export = PathBuf::from(tool);
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (setting, name) in self.stages.named() {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", setting)));
            }
            validate_relative_name(name)
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", setting, e)))?;
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!(
                    "{} '{}' is already used by another stage",
                    setting, name
                )));
            }
        }

        if let StorageConfig::S3(s3) = &self.storage {
            if s3.bucket.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage backend 's3' requires a bucket".to_string(),
                ));
            }
        }

        if let Some(warehouse) = &self.warehouse {
            if warehouse.password.is_none() && warehouse.private_key_path.is_none() {
                return Err(ConfigError::Invalid(
                    "warehouse requires either password or private_key_path".to_string(),
                ));
            }
        }

        Ok(())
    }
}
