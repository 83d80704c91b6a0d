//! Warehouse session parameters
//!
//! The warehouse is never contacted from this crate. The context built here
//! is handed to whichever collaborator opens the session.

use crate::config::{WarehouseConfig, DEFAULT_TOKEN_PATH};
use crate::error::ConfigError;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// How the session authenticates
#[derive(Clone, PartialEq, Eq)]
pub enum WarehouseAuth {
    Password(String),
    KeyPair { private_key_path: PathBuf },
    /// Short-lived service token; re-read it before opening each connection
    OAuthToken(String),
}

impl fmt::Debug for WarehouseAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarehouseAuth::Password(_) => f.write_str("Password(<redacted>)"),
            WarehouseAuth::KeyPair { private_key_path } => f
                .debug_struct("KeyPair")
                .field("private_key_path", private_key_path)
                .finish(),
            WarehouseAuth::OAuthToken(_) => f.write_str("OAuthToken(<redacted>)"),
        }
    }
}

/// Connection parameters for a warehouse session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseContext {
    pub account: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub auth: WarehouseAuth,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
}

impl WarehouseContext {
    /// Resolve session parameters from the process environment.
    ///
    /// When the service token file exists the session runs as the service
    /// user with `SNOWFLAKE_*` variables; otherwise the `[warehouse]` section
    /// is used. `None` when neither is available.
    pub fn resolve(config: Option<&WarehouseConfig>) -> Result<Option<Self>, ConfigError> {
        let token_path = config
            .map(|c| c.token_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH));
        Self::from_sources(config, &token_path, |var| std::env::var(var).ok())
    }

    /// Resolve with an explicit token path and variable lookup
    pub fn from_sources(
        config: Option<&WarehouseConfig>,
        token_path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        if token_path.exists() {
            info!("Creating a session context as service user");
            let token = std::fs::read_to_string(token_path).map_err(|source| ConfigError::Read {
                path: token_path.to_path_buf(),
                source,
            })?;

            let port = match lookup("SNOWFLAKE_PORT") {
                Some(port) => Some(port.trim().parse::<u16>().map_err(|e| {
                    ConfigError::Invalid(format!("SNOWFLAKE_PORT '{}': {}", port, e))
                })?),
                None => None,
            };

            return Ok(Some(Self {
                account: lookup("SNOWFLAKE_ACCOUNT").or_else(|| config.map(|c| c.account.clone())),
                user: None,
                host: lookup("SNOWFLAKE_HOST"),
                port,
                auth: WarehouseAuth::OAuthToken(token.trim().to_string()),
                role: config.and_then(|c| c.role.clone()),
                warehouse: lookup("SNOWFLAKE_WAREHOUSE")
                    .or_else(|| config.and_then(|c| c.warehouse.clone())),
                database: lookup("SNOWFLAKE_DATABASE"),
                schema: lookup("SNOWFLAKE_SCHEMA"),
            }));
        }

        let Some(config) = config else {
            return Ok(None);
        };

        info!("Creating a session context for user {}", config.user);
        let auth = match (&config.password, &config.private_key_path) {
            (_, Some(path)) => WarehouseAuth::KeyPair {
                private_key_path: path.clone(),
            },
            (Some(password), None) => WarehouseAuth::Password(password.clone()),
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "warehouse requires either password or private_key_path".to_string(),
                ))
            },
        };

        Ok(Some(Self {
            account: Some(config.account.clone()),
            user: Some(config.user.clone()),
            host: None,
            port: None,
            auth,
            role: config.role.clone(),
            warehouse: config.warehouse.clone(),
            database: config.database.clone(),
            schema: config.schema.clone(),
        }))
    }

    pub fn is_service_session(&self) -> bool {
        matches!(self.auth, WarehouseAuth::OAuthToken(_))
    }
}
