//! Built-in dialect plugins.
//!
//! Each dialect module supplies up to two plugin halves: a transformer
//! (abstract query to SQL text) and a catalog (introspection and DDL).
//! Identifier quoting is centralized here; identifiers cannot be passed as
//! statement parameters, so they are validated and quoted before being
//! spliced into SQL.

pub mod mysql;
pub mod postgres;

pub use mysql::{MysqlCatalog, MysqlTransformer};
pub use postgres::{PostgresCatalog, PostgresTransformer};

use crate::core::registry::{DialectPlugin, DialectRegistry};
use crate::error::{BridgeError, Result};

/// Maximum identifier length (conservative limit across engines).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier before quoting.
///
/// Rejects empty names, embedded null bytes, and excessive length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BridgeError::Config("identifier cannot be empty".to_string()));
    }
    if name.contains('\0') {
        return Err(BridgeError::Config(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BridgeError::Config(format!(
            "identifier exceeds {} bytes: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }
    Ok(())
}

/// Quote a MySQL identifier with backticks (doubled inside).
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a PostgreSQL identifier with double quotes (doubled inside).
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Register the built-in dialects into a registry.
pub fn register_builtins(registry: &mut DialectRegistry) {
    registry.register(
        "mysql",
        DialectPlugin::new(MysqlCatalog::new(), MysqlTransformer::new()),
    );
    registry.register(
        "postgres",
        DialectPlugin::new(PostgresCatalog::new(), PostgresTransformer::new()),
    );
}
