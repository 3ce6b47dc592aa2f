//! MySQL SQL generation from abstract queries.

use crate::core::query::{AbstractQuery, OpKind};
use crate::core::schema::SqlContent;
use crate::core::traits::Transformer;
use crate::core::value::format_value;
use crate::dialects::quote_mysql;
use crate::error::{BridgeError, Result};

/// MySQL/MariaDB transformer.
///
/// Upserts use `INSERT ... ON DUPLICATE KEY UPDATE`; replaces use
/// `REPLACE INTO`. Field values are emitted as named `:field` placeholders;
/// predicate values are rendered as literals.
#[derive(Debug, Clone, Default)]
pub struct MysqlTransformer;

impl MysqlTransformer {
    pub fn new() -> Self {
        Self
    }

    fn qualified_table(&self, query: &AbstractQuery) -> Result<String> {
        let table = quote_mysql(&query.table)?;
        if query.database.is_empty() {
            Ok(table)
        } else {
            Ok(format!("{}.{}", quote_mysql(&query.database)?, table))
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
                quote_mysql(&p.column)?,
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
                    quote_mysql(&o.column)?,
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

    fn insert_core(&self, query: &AbstractQuery, verb: &str) -> Result<String> {
        let cols = query
            .fields
            .iter()
            .map(|f| quote_mysql(&f.column.name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let placeholders = query
            .fields
            .iter()
            .map(|f| format!(":{}", f.column.name))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "{} {} ({}) VALUES ({})",
            verb,
            self.qualified_table(query)?,
            cols,
            placeholders
        ))
    }
}

impl Transformer for MysqlTransformer {
    fn dialect(&self) -> &str {
        "mysql"
    }

    fn render(&self, query: &AbstractQuery) -> Result<SqlContent> {
        // Builder validation catches this first; keep the invariant here
        // for queries constructed by other front ends.
        if query.op.requires_primary_key() && query.primary_keys.is_empty() {
            return Err(BridgeError::MissingPrimaryKey(query.table.clone()));
        }

        let sql = match query.op {
            OpKind::Insert => self.insert_core(query, "INSERT INTO")?,

            OpKind::Replace => self.insert_core(query, "REPLACE INTO")?,

            OpKind::Upsert => {
                let insert = self.insert_core(query, "INSERT INTO")?;
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
                    // Nothing to update on conflict; skip duplicates instead.
                    self.insert_core(query, "INSERT IGNORE INTO")?
                } else {
                    let updates = non_pk
                        .iter()
                        .map(|f| {
                            let q = quote_mysql(&f.column.name)?;
                            Ok(format!("{} = VALUES({})", q, q))
                        })
                        .collect::<Result<Vec<_>>>()?
                        .join(", ");
                    format!("{} ON DUPLICATE KEY UPDATE {}", insert, updates)
                }
            }

            OpKind::Update => {
                let sets = query
                    .fields
                    .iter()
                    .map(|f| {
                        Ok(format!(
                            "{} = :{}",
                            quote_mysql(&f.column.name)?,
                            f.column.name
                        ))
                    })
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
                        .map(|f| quote_mysql(&f.column.name))
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
