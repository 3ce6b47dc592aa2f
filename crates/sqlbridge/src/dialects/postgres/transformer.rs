//! PostgreSQL SQL generation from abstract queries.

use crate::core::query::{AbstractQuery, OpKind};
use crate::core::schema::SqlContent;
use crate::core::traits::Transformer;
use crate::core::value::format_value;
use crate::dialects::quote_pg;
use crate::error::{BridgeError, Result};

/// PostgreSQL transformer.
///
/// Upserts and replaces both render as `INSERT ... ON CONFLICT (pk) DO
/// UPDATE`, overwriting every non-key field; PostgreSQL has no REPLACE
/// statement, and the conflict form preserves the uniform affected-row
/// contract. Identifiers are double-quoted.
#[derive(Debug, Clone, Default)]
pub struct PostgresTransformer;

impl PostgresTransformer {
    pub fn new() -> Self {
        Self
    }

    fn qualified_table(&self, query: &AbstractQuery) -> Result<String> {
        let table = quote_pg(&query.table)?;
        if query.database.is_empty() {
            Ok(table)
        } else {
            // The database component maps to a schema qualifier on Postgres.
            Ok(format!("{}.{}", quote_pg(&query.database)?, table))
        }
    }

    fn where_clause(&self, query: &AbstractQuery) -> Result<String> {
        if query.predicates.is_empty() {
            return Ok(String::new());
        }
        let mut conditions = Vec::with_capacity(query.predicates.len());
        for p in &query.predicates {
            conditions.push(format!(
                "{} {} {}",
                quote_pg(&p.column)?,
                p.op.as_sql(),
                format_value(p.semantic, &p.value)?
            ));
        }
        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }

    fn tail_clause(&self, query: &AbstractQuery) -> Result<String> {
        let mut sql = String::new();
        if !query.order_by.is_empty() {
            let mut parts = Vec::with_capacity(query.order_by.len());
            for o in &query.order_by {
                parts.push(format!(
                    "{}{}",
                    quote_pg(&o.column)?,
                    if o.descending { " DESC" } else { "" }
                ));
            }
            sql.push_str(&format!(" ORDER BY {}", parts.join(", ")));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        Ok(sql)
    }

    fn insert_core(&self, query: &AbstractQuery) -> Result<String> {
        let cols = query
            .fields
            .iter()
            .map(|f| quote_pg(&f.column.name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let placeholders = query
            .fields
            .iter()
            .map(|f| format!(":{}", f.column.name))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_table(query)?,
            cols,
            placeholders
        ))
    }

    fn conflict_upsert(&self, query: &AbstractQuery) -> Result<String> {
        if query.primary_keys.is_empty() {
            return Err(BridgeError::MissingPrimaryKey(query.table.clone()));
        }
        let insert = self.insert_core(query)?;
        let conflict_cols = query
            .primary_keys
            .iter()
            .map(|k| quote_pg(k))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let non_pk: Vec<_> = query
            .fields
            .iter()
            .filter(|f| {
                !query
                    .primary_keys
                    .iter()
                    .any(|k| k.eq_ignore_ascii_case(&f.column.name))
            })
            .collect();
        if non_pk.is_empty() {
            Ok(format!(
                "{} ON CONFLICT ({}) DO NOTHING",
                insert, conflict_cols
            ))
        } else {
            let updates = non_pk
                .iter()
                .map(|f| {
                    let q = quote_pg(&f.column.name)?;
                    Ok(format!("{} = EXCLUDED.{}", q, q))
                })
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            Ok(format!(
                "{} ON CONFLICT ({}) DO UPDATE SET {}",
                insert, conflict_cols, updates
            ))
        }
    }
}

impl Transformer for PostgresTransformer {
    fn dialect(&self) -> &str {
        "postgres"
    }

    fn render(&self, query: &AbstractQuery) -> Result<SqlContent> {
        let sql = match query.op {
            OpKind::Insert => self.insert_core(query)?,

            OpKind::Upsert | OpKind::Replace => self.conflict_upsert(query)?,

            OpKind::Update => {
                let sets = query
                    .fields
                    .iter()
                    .map(|f| Ok(format!("{} = :{}", quote_pg(&f.column.name)?, f.column.name)))
                    .collect::<Result<Vec<_>>>()?
                    .join(", ");
                format!(
                    "UPDATE {} SET {}{}",
                    self.qualified_table(query)?,
                    sets,
                    self.where_clause(query)?
                )
            }

            OpKind::Delete => format!(
                "DELETE FROM {}{}",
                self.qualified_table(query)?,
                self.where_clause(query)?
            ),

            OpKind::Select => {
                let projection = match &query.projection {
                    Some(p) => p.clone(),
                    None if query.fields.is_empty() => "*".to_string(),
                    None => query
                        .fields
                        .iter()
                        .map(|f| quote_pg(&f.column.name))
                        .collect::<Result<Vec<_>>>()?
                        .join(", "),
                };
                format!(
                    "SELECT {} FROM {}{}{}",
                    projection,
                    self.qualified_table(query)?,
                    self.where_clause(query)?,
                    self.tail_clause(query)?
                )
            }

            OpKind::Count => {
                let projection = query
                    .projection
                    .clone()
                    .unwrap_or_else(|| "COUNT(1)".to_string());
                format!(
                    "SELECT {} FROM {}{}",
                    projection,
                    self.qualified_table(query)?,
                    self.where_clause(query)?
                )
            }
        };

        Ok(SqlContent::new(&query.table, sql))
    }
}
