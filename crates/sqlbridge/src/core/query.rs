//! Dialect-agnostic description of one SQL operation.
//!
//! A [`QueryBuilder`] accumulates target, fields, predicates and modifiers,
//! then [`QueryBuilder::build`] finalizes them into an immutable
//! [`AbstractQuery`]. Building is pure: no I/O, same inputs always produce
//! the same query.

use std::collections::BTreeMap;

use crate::core::schema::{find_column, ColumnDescriptor, SemanticType};
use crate::core::value::SqlValue;
use crate::error::{BridgeError, Result};

/// Operation kind of an abstract query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Update,
    Upsert,
    Replace,
    Delete,
    Select,
    Count,
}

impl OpKind {
    /// Whether the operation writes field values.
    pub fn writes_fields(&self) -> bool {
        matches!(
            self,
            OpKind::Insert | OpKind::Update | OpKind::Upsert | OpKind::Replace
        )
    }

    /// Whether the operation requires a declared primary key.
    pub fn requires_primary_key(&self) -> bool {
        matches!(self, OpKind::Upsert | OpKind::Replace)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OpKind::Insert => "insert",
            OpKind::Update => "update",
            OpKind::Upsert => "upsert",
            OpKind::Replace => "replace",
            OpKind::Delete => "delete",
            OpKind::Select => "select",
            OpKind::Count => "count",
        };
        f.write_str(s)
    }
}

/// Comparison operator in a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl CmpOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "<>",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
            CmpOp::Like => "LIKE",
        }
    }
}

/// One filter condition; conditions are AND-joined by transformers.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub column: String,
    pub op: CmpOp,
    pub value: SqlValue,
    pub semantic: SemanticType,
}

/// Ordering directive.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// A field value bound to its resolved column descriptor.
#[derive(Debug, Clone)]
pub struct BoundField {
    pub column: ColumnDescriptor,
    pub value: SqlValue,
}

/// Finalized, immutable description of one SQL operation.
#[derive(Debug, Clone)]
pub struct AbstractQuery {
    pub op: OpKind,
    pub database: String,
    pub table: String,
    /// Ordinal-ordered fields, already filtered to known columns.
    pub fields: Vec<BoundField>,
    pub primary_keys: Vec<String>,
    /// Custom projection (e.g. an aggregate expression) for Select/Count.
    pub projection: Option<String>,
    pub predicates: Vec<Predicate>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Fluent, dialect-agnostic builder for one SQL operation.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    op: Option<OpKind>,
    database: String,
    table: String,
    columns: Vec<ColumnDescriptor>,
    fields: BTreeMap<String, SqlValue>,
    primary_keys: Vec<String>,
    projection: Option<String>,
    predicates: Vec<Predicate>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryBuilder {
    pub fn new(op: OpKind) -> Self {
        Self {
            op: Some(op),
            ..Self::default()
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Supply the table's current column descriptors. When present, field
    /// maps are filtered against this set and adopt its ordinals and
    /// semantic types.
    pub fn columns(mut self, columns: Vec<ColumnDescriptor>) -> Self {
        self.columns = columns;
        self
    }

    /// Supply the field map for a write operation. Keys that do not match a
    /// known column are silently dropped at build time.
    pub fn fields(mut self, fields: BTreeMap<String, SqlValue>) -> Self {
        self.fields = fields;
        self
    }

    /// Add one field value.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Declare the primary-key columns (required for Replace/Upsert).
    pub fn primary_keys(mut self, keys: Vec<String>) -> Self {
        self.primary_keys = keys;
        self
    }

    /// Custom projection for Select/Count (e.g. `COUNT(DISTINCT user_id)`).
    pub fn projection(mut self, expr: impl Into<String>) -> Self {
        self.projection = Some(expr.into());
        self
    }

    /// Add an AND-joined filter condition.
    pub fn filter(mut self, column: impl Into<String>, op: CmpOp, value: impl Into<SqlValue>) -> Self {
        let column = column.into();
        let value = value.into();
        let semantic = find_column(&self.columns, &column)
            .map(|c| c.semantic_type)
            .unwrap_or_else(|| SemanticType::of_value(&value));
        self.predicates.push(Predicate {
            column,
            op,
            value,
            semantic,
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Finalize into an immutable [`AbstractQuery`].
    ///
    /// Field filtering, ordinal ordering and primary-key validation happen
    /// here; the builder performs no I/O.
    pub fn build(self) -> Result<AbstractQuery> {
        let op = self
            .op
            .ok_or_else(|| BridgeError::Config("query builder has no operation kind".to_string()))?;
        if self.table.is_empty() {
            return Err(BridgeError::Config("query builder has no table".to_string()));
        }

        if op.requires_primary_key() && self.primary_keys.is_empty() {
            return Err(BridgeError::MissingPrimaryKey(self.table));
        }

        let mut fields: Vec<BoundField> = Vec::with_capacity(self.fields.len());
        if self.columns.is_empty() {
            // No schema available (e.g. parser-produced queries): keep the
            // map order and infer semantic types from the values.
            for (idx, (name, value)) in self.fields.into_iter().enumerate() {
                let semantic = SemanticType::of_value(&value);
                fields.push(BoundField {
                    column: ColumnDescriptor {
                        name,
                        semantic_type: semantic,
                        origin_type: String::new(),
                        nullable: true,
                        is_primary_key: false,
                        is_unique: false,
                        ordinal_pos: idx as i32 + 1,
                    },
                    value,
                });
            }
        } else {
            // Keep only keys that exist in the table snapshot; stray keys in
            // a loosely-typed input map never reach SQL generation.
            for (name, value) in self.fields {
                if let Some(column) = find_column(&self.columns, &name) {
                    fields.push(BoundField {
                        column: column.clone(),
                        value,
                    });
                }
            }
            fields.sort_by_key(|f| f.column.ordinal_pos);
        }

        if op.writes_fields() && fields.is_empty() {
            return Err(BridgeError::NoFields(self.table));
        }

        Ok(AbstractQuery {
            op,
            database: self.database,
            table: self.table,
            fields,
            primary_keys: self.primary_keys,
            projection: self.projection,
            predicates: self.predicates,
            order_by: self.order_by,
            limit: self.limit,
            offset: self.offset,
        })
    }
}
