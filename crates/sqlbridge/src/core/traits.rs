//! Core traits: the executor contract and the two dialect plugin halves.
//!
//! - [`Executor`]: the injected wire driver, consumed but never implemented
//!   here. It runs parameterized SQL and exposes physical transaction control.
//! - [`Transformer`]: renders a finalized [`AbstractQuery`] into dialect SQL.
//! - [`Catalog`]: dialect metadata operations (introspection, DDL dump,
//!   dependency-sorted DDL, script ingestion).
//!
//! A dialect may supply either plugin half or both; the two capabilities are
//! independent.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::core::query::AbstractQuery;
use crate::core::schema::{ColumnDescriptor, SqlContent};
use crate::core::value::SqlValue;
use crate::error::Result;
use crate::script::ScriptRules;

/// Arguments accompanying one SQL statement.
#[derive(Debug, Clone)]
pub enum ExecArgs {
    None,
    Positional(Vec<SqlValue>),
    Named(BTreeMap<String, SqlValue>),
}

impl ExecArgs {
    pub fn is_empty(&self) -> bool {
        match self {
            ExecArgs::None => true,
            ExecArgs::Positional(v) => v.is_empty(),
            ExecArgs::Named(m) => m.is_empty(),
        }
    }
}

/// One raw row from the driver: column names paired positionally with values.
#[derive(Debug, Clone)]
pub struct DriverRow {
    pub columns: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl DriverRow {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Look up a value by case-insensitive column name.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .map(|i| &self.values[i])
    }
}

/// The injected wire-protocol driver for one logical connection.
///
/// Implementations live outside this crate. Cancellation and timeouts are
/// the executor's responsibility; this core performs no blocking of its own.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a mutation and return the affected-row count.
    async fn execute(&self, sql: &str, args: &ExecArgs) -> Result<u64>;

    /// Run a query and return its rows.
    async fn query(&self, sql: &str, args: &ExecArgs) -> Result<Vec<DriverRow>>;

    /// Open a physical transaction.
    async fn begin(&self) -> Result<()>;

    /// Commit the physical transaction.
    async fn commit(&self) -> Result<()>;

    /// Roll back the physical transaction. Called on an autocommit
    /// connection this must be a no-op, not an error.
    async fn rollback(&self) -> Result<()>;
}

/// Dialect plugin half: renders an [`AbstractQuery`] into executable SQL.
///
/// `render` is pure; all I/O happens in the client through the executor.
pub trait Transformer: Send + Sync {
    /// Dialect identifier (e.g. "mysql", "postgres").
    fn dialect(&self) -> &str;

    /// Render the query into dialect SQL.
    ///
    /// Write operations use named `:field` placeholders for field values;
    /// predicates are rendered as literals via the shared formatting rules.
    fn render(&self, query: &AbstractQuery) -> Result<SqlContent>;
}

/// Schema-object kind for DDL dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    Table,
    Index,
}

/// Dialect plugin half: metadata operations over the injected executor.
///
/// Each operation is independent and may fail with
/// [`BridgeError::Unsupported`](crate::error::BridgeError::Unsupported)
/// for dialects that lack it.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Dialect identifier (e.g. "mysql", "postgres").
    fn dialect(&self) -> &str;

    /// Whether the table exists in the database.
    async fn table_exists(&self, exec: &dyn Executor, database: &str, table: &str)
        -> Result<bool>;

    /// Column descriptors ordered by ordinal position.
    async fn get_columns(
        &self,
        exec: &dyn Executor,
        database: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>>;

    /// DDL text for the named schema objects.
    async fn get_ddl(
        &self,
        exec: &dyn Executor,
        kind: DdlKind,
        database: &str,
        names: &[String],
    ) -> Result<Vec<SqlContent>>;

    /// Table DDL ordered so every table appears after the tables it
    /// references, for safe replay.
    async fn sorted_table_sql(
        &self,
        exec: &dyn Executor,
        database: &str,
        tables: &[String],
    ) -> Result<Vec<SqlContent>>;

    /// Create the database if it does not exist.
    async fn ensure_database(&self, exec: &dyn Executor, database: &str) -> Result<()>;

    /// Statement-splitting conventions for script ingestion under this
    /// dialect (delimiter directives, comment styles).
    fn script_rules(&self) -> ScriptRules {
        ScriptRules::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_row_lookup() {
        let row = DriverRow::new(
            vec!["Id".to_string(), "Name".to_string()],
            vec![SqlValue::I64(1), SqlValue::from("a")],
        );
        assert_eq!(row.get("id"), Some(&SqlValue::I64(1)));
        assert_eq!(row.get("NAME"), Some(&SqlValue::from("a")));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_exec_args_is_empty() {
        assert!(ExecArgs::None.is_empty());
        assert!(ExecArgs::Positional(vec![]).is_empty());
        assert!(!ExecArgs::Positional(vec![SqlValue::I64(1)]).is_empty());
    }
}
