//! PostgreSQL catalog: introspection over `information_schema`.
//!
//! DDL dumps are not available server-side on PostgreSQL (pg_dump is a
//! client tool), so the DDL operations report themselves unsupported.

use async_trait::async_trait;
use tracing::debug;

use crate::core::schema::{ColumnDescriptor, SemanticType, SqlContent};
use crate::core::traits::{Catalog, DdlKind, DriverRow, ExecArgs, Executor};
use crate::core::value::SqlValue;
use crate::dialects::quote_pg;
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Default)]
pub struct PostgresCatalog;

impl PostgresCatalog {
    pub fn new() -> Self {
        Self
    }

    fn text_of(row: &DriverRow, column: &str, sql: &str) -> Result<String> {
        match row.get(column) {
            Some(SqlValue::Text(s)) => Ok(s.clone()),
            Some(other) => Ok(other.describe()),
            None => Err(BridgeError::execution(
                sql,
                format!("missing column {:?} in result", column),
            )),
        }
    }
}

#[async_trait]
impl Catalog for PostgresCatalog {
    fn dialect(&self) -> &str {
        "postgres"
    }

    async fn table_exists(
        &self,
        exec: &dyn Executor,
        database: &str,
        table: &str,
    ) -> Result<bool> {
        let sql = "SELECT COUNT(1) AS cnt FROM information_schema.tables \
                   WHERE table_schema = $1 AND table_name = $2";
        let args = ExecArgs::Positional(vec![
            SqlValue::from(database),
            SqlValue::from(table),
        ]);
        let rows = exec.query(sql, &args).await?;
        let count = rows
            .first()
            .and_then(|r| r.values.first())
            .and_then(SqlValue::as_i64)
            .unwrap_or(0);
        Ok(count > 0)
    }

    async fn get_columns(
        &self,
        exec: &dyn Executor,
        database: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>> {
        // Key columns are resolved through constraint join tables; a column
        // in a PRIMARY KEY constraint also counts as unique.
        let sql = "SELECT c.column_name, c.data_type, c.is_nullable, c.ordinal_position, \
                          COALESCE(tc.constraint_type, '') AS constraint_type \
                   FROM information_schema.columns c \
                   LEFT JOIN information_schema.key_column_usage kcu \
                     ON kcu.table_schema = c.table_schema \
                    AND kcu.table_name = c.table_name \
                    AND kcu.column_name = c.column_name \
                   LEFT JOIN information_schema.table_constraints tc \
                     ON tc.constraint_name = kcu.constraint_name \
                    AND tc.table_schema = kcu.table_schema \
                    AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE') \
                   WHERE c.table_schema = $1 AND c.table_name = $2 \
                   ORDER BY c.ordinal_position";
        let args = ExecArgs::Positional(vec![
            SqlValue::from(database),
            SqlValue::from(table),
        ]);
        let rows = exec.query(sql, &args).await?;
        if rows.is_empty() {
            return Err(BridgeError::ColumnNotFound {
                table: format!("{}.{}", database, table),
                column: "*".to_string(),
            });
        }
        debug!(database, table, columns = rows.len(), "introspected table");
        let mut out: Vec<ColumnDescriptor> = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = Self::text_of(row, "column_name", sql)?;
            let origin_type = Self::text_of(row, "data_type", sql)?;
            let nullable = Self::text_of(row, "is_nullable", sql)?.eq_ignore_ascii_case("YES");
            let constraint = Self::text_of(row, "constraint_type", sql).unwrap_or_default();
            let is_primary_key = constraint.eq_ignore_ascii_case("PRIMARY KEY");
            let is_unique = is_primary_key || constraint.eq_ignore_ascii_case("UNIQUE");
            let ordinal_pos = row
                .get("ordinal_position")
                .and_then(SqlValue::as_i64)
                .unwrap_or(0) as i32;
            // The join can duplicate a column that sits in several
            // constraints; merge the key flags into the first occurrence.
            if let Some(existing) = out.iter_mut().find(|c| c.matches(&name)) {
                existing.is_primary_key |= is_primary_key;
                existing.is_unique |= is_unique;
                continue;
            }
            out.push(ColumnDescriptor {
                semantic_type: SemanticType::from_origin(&origin_type),
                origin_type,
                nullable,
                is_primary_key,
                is_unique,
                ordinal_pos,
                name,
            });
        }
        Ok(out)
    }

    async fn get_ddl(
        &self,
        _exec: &dyn Executor,
        _kind: DdlKind,
        _database: &str,
        _names: &[String],
    ) -> Result<Vec<SqlContent>> {
        Err(BridgeError::unsupported("postgres", "DDL dump"))
    }

    async fn sorted_table_sql(
        &self,
        _exec: &dyn Executor,
        _database: &str,
        _tables: &[String],
    ) -> Result<Vec<SqlContent>> {
        Err(BridgeError::unsupported("postgres", "dependency-sorted DDL dump"))
    }

    async fn ensure_database(&self, exec: &dyn Executor, database: &str) -> Result<()> {
        // The database component maps to a schema on Postgres, and CREATE
        // SCHEMA supports IF NOT EXISTS directly.
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_pg(database)?);
        exec.execute(&sql, &ExecArgs::None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptRules;

    #[test]
    fn test_script_rules_are_defaults() {
        let rules = PostgresCatalog::new().script_rules();
        assert_eq!(rules.delimiter, ScriptRules::default().delimiter);
        assert!(!rules.hash_comments);
        assert!(!rules.delimiter_directive);
    }
}
