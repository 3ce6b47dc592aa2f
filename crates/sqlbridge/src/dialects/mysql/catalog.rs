//! MySQL catalog: introspection, DDL dumps, and script conventions.

use async_trait::async_trait;
use tracing::debug;

use crate::core::schema::{ColumnDescriptor, SemanticType, SqlContent};
use crate::core::traits::{Catalog, DdlKind, DriverRow, ExecArgs, Executor};
use crate::core::value::SqlValue;
use crate::dialects::quote_mysql;
use crate::error::{BridgeError, Result};
use crate::script::ScriptRules;
use crate::topo;

/// MySQL/MariaDB catalog built on `information_schema` and `SHOW CREATE`.
#[derive(Debug, Clone, Default)]
pub struct MysqlCatalog;

impl MysqlCatalog {
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

    fn descriptor_from_row(row: &DriverRow, sql: &str) -> Result<ColumnDescriptor> {
        let name = Self::text_of(row, "COLUMN_NAME", sql)?;
        let origin_type = Self::text_of(row, "DATA_TYPE", sql)?;
        let nullable = Self::text_of(row, "IS_NULLABLE", sql)?.eq_ignore_ascii_case("YES");
        let key = Self::text_of(row, "COLUMN_KEY", sql).unwrap_or_default();
        let ordinal_pos = row
            .get("ORDINAL_POSITION")
            .and_then(SqlValue::as_i64)
            .unwrap_or(0) as i32;
        Ok(ColumnDescriptor {
            semantic_type: SemanticType::from_origin(&origin_type),
            origin_type,
            nullable,
            is_primary_key: key.eq_ignore_ascii_case("PRI"),
            is_unique: key.eq_ignore_ascii_case("PRI") || key.eq_ignore_ascii_case("UNI"),
            ordinal_pos,
            name,
        })
    }
}

#[async_trait]
impl Catalog for MysqlCatalog {
    fn dialect(&self) -> &str {
        "mysql"
    }

    async fn table_exists(
        &self,
        exec: &dyn Executor,
        database: &str,
        table: &str,
    ) -> Result<bool> {
        let sql = "SELECT COUNT(1) AS cnt FROM information_schema.TABLES \
                   WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";
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
        let sql = "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, COLUMN_KEY, ORDINAL_POSITION \
                   FROM information_schema.COLUMNS \
                   WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
                   ORDER BY ORDINAL_POSITION";
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
        rows.iter()
            .map(|row| Self::descriptor_from_row(row, sql))
            .collect()
    }

    async fn get_ddl(
        &self,
        exec: &dyn Executor,
        kind: DdlKind,
        database: &str,
        names: &[String],
    ) -> Result<Vec<SqlContent>> {
        if kind != DdlKind::Table {
            // MySQL folds index definitions into the table DDL.
            return Err(BridgeError::unsupported("mysql", "index DDL dump"));
        }
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let sql = format!(
                "SHOW CREATE TABLE {}.{}",
                quote_mysql(database)?,
                quote_mysql(name)?
            );
            let rows = exec.query(&sql, &ExecArgs::None).await?;
            let row = rows
                .first()
                .ok_or_else(|| BridgeError::execution(&sql, "empty SHOW CREATE TABLE result"))?;
            // Second column when the driver does not preserve column names.
            let ddl = match row.get("Create Table") {
                Some(SqlValue::Text(s)) => s.clone(),
                _ => row
                    .values
                    .get(1)
                    .and_then(|v| v.as_text().map(str::to_string))
                    .ok_or_else(|| {
                        BridgeError::execution(&sql, "no DDL column in SHOW CREATE TABLE result")
                    })?,
            };
            out.push(SqlContent::new(name, ddl));
        }
        Ok(out)
    }

    async fn sorted_table_sql(
        &self,
        exec: &dyn Executor,
        database: &str,
        tables: &[String],
    ) -> Result<Vec<SqlContent>> {
        let ddl = self.get_ddl(exec, DdlKind::Table, database, tables).await?;
        topo::sort_tables(&ddl)
    }

    async fn ensure_database(&self, exec: &dyn Executor, database: &str) -> Result<()> {
        let sql = format!("CREATE DATABASE IF NOT EXISTS {}", quote_mysql(database)?);
        exec.execute(&sql, &ExecArgs::None).await?;
        Ok(())
    }

    fn script_rules(&self) -> ScriptRules {
        ScriptRules::mysql()
    }
}
