//! Error types for the access layer.

use thiserror::Error;

/// Main error type for database-access operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No catalog or transformer registered under the requested dialect name.
    #[error("No dialect plugin registered under '{0}'")]
    UnsupportedDialect(String),

    /// A catalog operation the dialect does not provide.
    #[error("Operation '{operation}' is not supported by dialect '{dialect}'")]
    Unsupported { dialect: String, operation: String },

    /// A referenced column is absent from the table schema.
    #[error("Column '{column}' not found in table {table}")]
    ColumnNotFound { table: String, column: String },

    /// A fetched row carries a column the cached schema does not know.
    #[error("Schema drift: row column '{column}' is missing from the cached schema of {table}")]
    SchemaDrift { table: String, column: String },

    /// Replace/upsert requested on a table without a primary key.
    #[error("Table {0} has no primary key - replace/upsert requires one")]
    MissingPrimaryKey(String),

    /// A field map produced no writable columns after schema filtering.
    #[error("No recognized fields to write for table {0}")]
    NoFields(String),

    /// The dependency sorter could not order every input table.
    #[error("Circular foreign-key dependency among tables: {}", remaining.join(", "))]
    CircularDependency { remaining: Vec<String> },

    /// The reference-SQL parser could not recover an abstract query.
    #[error("SQL parse failed: {message} (at: {fragment})")]
    ParseFailure { message: String, fragment: String },

    /// A value cannot be rendered for its declared semantic type.
    #[error("Cannot format value '{value}' as {semantic}")]
    FormatFailure { semantic: String, value: String },

    /// Executor-level failure, wrapped with the offending SQL.
    #[error("Execution failed: {message}\n  SQL: {sql}")]
    Execution { sql: String, message: String },

    /// A transaction body panicked; the transaction was rolled back.
    #[error("Transaction body aborted: {0}")]
    TransactionAborted(String),

    /// Configuration error (bad connection descriptor, invalid identifier, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (script file ingestion).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Create an Execution error carrying the offending SQL.
    pub fn execution(sql: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Execution {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create a ParseFailure naming the offending fragment.
    pub fn parse(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        BridgeError::ParseFailure {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    /// Create a FormatFailure for a semantic-type/value mismatch.
    pub fn format(semantic: impl Into<String>, value: impl Into<String>) -> Self {
        BridgeError::FormatFailure {
            semantic: semantic.into(),
            value: value.into(),
        }
    }

    /// Create an Unsupported error for a catalog operation.
    pub fn unsupported(dialect: impl Into<String>, operation: impl Into<String>) -> Self {
        BridgeError::Unsupported {
            dialect: dialect.into(),
            operation: operation.into(),
        }
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_names_tables() {
        let err = BridgeError::CircularDependency {
            remaining: vec!["a".to_string(), "b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("a, b"));
    }

    #[test]
    fn test_execution_carries_sql() {
        let err = BridgeError::execution("SELECT 1", "connection reset");
        let msg = err.to_string();
        assert!(msg.contains("SELECT 1"));
        assert!(msg.contains("connection reset"));
    }
}
