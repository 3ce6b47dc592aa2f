//! Connection configuration.
//!
//! The crate never opens sockets itself; executors are injected. This type
//! carries the settings an embedding application hands to its driver layer,
//! serialized alongside the rest of its configuration.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Settings for one logical connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Logical connection key; transaction depth is tracked per key.
    pub key: String,

    /// Dialect name, matched against the registry ("mysql", "postgres").
    pub dialect: String,

    pub host: String,

    #[serde(default)]
    pub port: u16,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Default database (schema on PostgreSQL).
    pub database: String,

    /// TLS mode handed through to the driver (e.g. "disable", "require").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_mode: Option<String>,

    /// PostgreSQL search_path override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_path: Option<String>,
}

impl ConnectionInfo {
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(BridgeError::Config("connection key cannot be empty".to_string()));
        }
        if self.dialect.is_empty() {
            return Err(BridgeError::Config("dialect cannot be empty".to_string()));
        }
        if self.host.is_empty() {
            return Err(BridgeError::Config(format!(
                "connection {:?} has no host",
                self.key
            )));
        }
        if self.database.is_empty() {
            return Err(BridgeError::Config(format!(
                "connection {:?} has no database",
                self.key
            )));
        }
        Ok(())
    }
}
