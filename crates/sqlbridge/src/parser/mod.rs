//! Reference-SQL parsing into abstract queries.
//!
//! Raw SQL accepted by the access layer is written against one reference
//! dialect (MySQL). Clients of that dialect execute the text verbatim; every
//! other dialect parses it here into an [`AbstractQuery`] and re-renders it
//! through its own transformer. Anything the abstract query model cannot
//! represent (joins, subqueries, multi-row inserts, expressions in
//! predicates) fails with a `ParseFailure` naming the offending fragment.

use sqlparser::ast as sp;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser as SqlParser;

use crate::core::query::{
    AbstractQuery, BoundField, CmpOp, OpKind, OrderBy, Predicate,
};
use crate::core::schema::{ColumnDescriptor, SemanticType};
use crate::core::value::SqlValue;
use crate::error::{BridgeError, Result};

/// The dialect raw SQL is written against.
pub const REFERENCE_DIALECT: &str = "mysql";

/// Parse one reference-dialect statement into an abstract query.
pub fn parse(sql: &str) -> Result<AbstractQuery> {
    let mut statements = SqlParser::parse_sql(&MySqlDialect {}, sql)
        .map_err(|e| BridgeError::parse(e.to_string(), sql))?;
    if statements.len() != 1 {
        return Err(BridgeError::parse(
            format!("expected 1 statement, found {}", statements.len()),
            sql,
        ));
    }
    match statements.remove(0) {
        sp::Statement::Insert(insert) => convert_insert(insert),
        sp::Statement::Update {
            table,
            assignments,
            selection,
            returning,
            ..
        } => convert_update(table, assignments, selection, returning),
        sp::Statement::Delete(delete) => convert_delete(delete),
        sp::Statement::Query(query) => convert_query(*query),
        other => Err(BridgeError::parse(
            "statement kind not representable",
            other.to_string(),
        )),
    }
}

/// Split an object name into (database, table).
fn table_parts(name: &sp::ObjectName) -> Result<(String, String)> {
    let parts: Vec<&str> = name.0.iter().map(|p| p.value.as_str()).collect();
    match parts.len() {
        1 => Ok((String::new(), parts[0].to_string())),
        2 => Ok((parts[0].to_string(), parts[1].to_string())),
        _ => Err(BridgeError::parse(
            "table name has too many qualifiers",
            name.to_string(),
        )),
    }
}

fn table_from_factor(tf: &sp::TableFactor) -> Result<(String, String)> {
    match tf {
        sp::TableFactor::Table { name, .. } => table_parts(name),
        other => Err(BridgeError::parse(
            "table reference not representable",
            other.to_string(),
        )),
    }
}

/// Literal expression to a value. Negative numbers arrive as a unary minus
/// over a number literal.
fn expr_to_value(expr: &sp::Expr) -> Result<SqlValue> {
    match expr {
        sp::Expr::Value(v) => literal_to_value(v, expr),
        sp::Expr::UnaryOp {
            op: sp::UnaryOperator::Minus,
            expr: inner,
        } => match expr_to_value(inner)? {
            SqlValue::I64(n) => Ok(SqlValue::I64(-n)),
            SqlValue::F64(n) => Ok(SqlValue::F64(-n)),
            _ => Err(BridgeError::parse(
                "unary minus over non-numeric literal",
                expr.to_string(),
            )),
        },
        other => Err(BridgeError::parse(
            "expression is not a literal",
            other.to_string(),
        )),
    }
}

fn literal_to_value(value: &sp::Value, expr: &sp::Expr) -> Result<SqlValue> {
    match value {
        sp::Value::Null => Ok(SqlValue::Null),
        sp::Value::Boolean(b) => Ok(SqlValue::Bool(*b)),
        sp::Value::Number(n, _) => {
            if n.contains('.') || n.contains('e') || n.contains('E') {
                n.parse::<f64>()
                    .map(SqlValue::F64)
                    .map_err(|_| BridgeError::parse("invalid numeric literal", n.clone()))
            } else {
                n.parse::<i64>()
                    .map(SqlValue::I64)
                    .map_err(|_| BridgeError::parse("invalid integer literal", n.clone()))
            }
        }
        sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => {
            Ok(SqlValue::Text(s.clone()))
        }
        _ => Err(BridgeError::parse(
            "literal kind not representable",
            expr.to_string(),
        )),
    }
}

fn column_name(expr: &sp::Expr) -> Result<String> {
    match expr {
        sp::Expr::Identifier(ident) => Ok(ident.value.clone()),
        sp::Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|p| p.value.clone())
            .ok_or_else(|| BridgeError::parse("empty compound identifier", expr.to_string())),
        other => Err(BridgeError::parse(
            "expected a column reference",
            other.to_string(),
        )),
    }
}

/// Flatten an AND-joined predicate tree into column/op/literal conditions.
fn collect_predicates(expr: &sp::Expr, out: &mut Vec<Predicate>) -> Result<()> {
    match expr {
        sp::Expr::BinaryOp {
            left,
            op: sp::BinaryOperator::And,
            right,
        } => {
            collect_predicates(left, out)?;
            collect_predicates(right, out)
        }
        sp::Expr::BinaryOp { left, op, right } => {
            let cmp = match op {
                sp::BinaryOperator::Eq => CmpOp::Eq,
                sp::BinaryOperator::NotEq => CmpOp::NotEq,
                sp::BinaryOperator::Lt => CmpOp::Lt,
                sp::BinaryOperator::LtEq => CmpOp::LtEq,
                sp::BinaryOperator::Gt => CmpOp::Gt,
                sp::BinaryOperator::GtEq => CmpOp::GtEq,
                other => {
                    return Err(BridgeError::parse(
                        format!("operator {} not representable", other),
                        expr.to_string(),
                    ))
                }
            };
            let value = expr_to_value(right)?;
            out.push(Predicate {
                column: column_name(left)?,
                op: cmp,
                semantic: SemanticType::of_value(&value),
                value,
            });
            Ok(())
        }
        sp::Expr::Like {
            negated: false,
            expr: target,
            pattern,
            ..
        } => {
            let value = expr_to_value(pattern)?;
            out.push(Predicate {
                column: column_name(target)?,
                op: CmpOp::Like,
                semantic: SemanticType::of_value(&value),
                value,
            });
            Ok(())
        }
        sp::Expr::Nested(inner) => collect_predicates(inner, out),
        other => Err(BridgeError::parse(
            "predicate not representable",
            other.to_string(),
        )),
    }
}

fn bound_field(name: String, ordinal: i32, value: SqlValue) -> BoundField {
    BoundField {
        column: ColumnDescriptor {
            semantic_type: SemanticType::of_value(&value),
            origin_type: String::new(),
            nullable: true,
            is_primary_key: false,
            is_unique: false,
            ordinal_pos: ordinal,
            name,
        },
        value,
    }
}

fn convert_insert(insert: sp::Insert) -> Result<AbstractQuery> {
    let (database, table) = table_parts(&insert.table_name)?;
    if insert.returning.is_some() {
        return Err(BridgeError::parse("RETURNING not representable", &table));
    }
    if insert.ignore {
        return Err(BridgeError::parse("INSERT IGNORE not representable", &table));
    }
    if let Some(or) = insert.or {
        return Err(BridgeError::parse(
            "conflict clause not representable",
            or.to_string(),
        ));
    }

    let op = if insert.replace_into {
        OpKind::Replace
    } else {
        match insert.on {
            Some(sp::OnInsert::DuplicateKeyUpdate(_)) => OpKind::Upsert,
            Some(ref other) => {
                return Err(BridgeError::parse(
                    "ON clause not representable",
                    format!("{:?}", other),
                ))
            }
            None => OpKind::Insert,
        }
    };

    let source = insert
        .source
        .ok_or_else(|| BridgeError::parse("INSERT without VALUES", &table))?;
    let rows = match *source.body {
        sp::SetExpr::Values(values) => values.rows,
        other => {
            return Err(BridgeError::parse(
                "INSERT source must be a VALUES list",
                other.to_string(),
            ))
        }
    };
    if rows.len() != 1 {
        return Err(BridgeError::parse(
            format!("expected 1 VALUES row, found {}", rows.len()),
            &table,
        ));
    }
    let row = rows.into_iter().next().unwrap_or_default();
    if insert.columns.len() != row.len() {
        return Err(BridgeError::parse(
            format!(
                "column/value count mismatch: {} columns, {} values",
                insert.columns.len(),
                row.len()
            ),
            &table,
        ));
    }
    if insert.columns.is_empty() {
        return Err(BridgeError::parse(
            "INSERT without an explicit column list",
            &table,
        ));
    }

    let mut fields = Vec::with_capacity(row.len());
    for (idx, (ident, expr)) in insert.columns.iter().zip(row).enumerate() {
        fields.push(bound_field(
            ident.value.clone(),
            idx as i32 + 1,
            expr_to_value(&expr)?,
        ));
    }

    Ok(AbstractQuery {
        op,
        database,
        table,
        fields,
        // Unknown from raw SQL; the client fills them from the schema cache
        // before re-rendering an upsert or replace.
        primary_keys: Vec::new(),
        projection: None,
        predicates: Vec::new(),
        order_by: Vec::new(),
        limit: None,
        offset: None,
    })
}

fn convert_update(
    table: sp::TableWithJoins,
    assignments: Vec<sp::Assignment>,
    selection: Option<sp::Expr>,
    returning: Option<Vec<sp::SelectItem>>,
) -> Result<AbstractQuery> {
    if returning.is_some() {
        return Err(BridgeError::parse("RETURNING not representable", "UPDATE"));
    }
    if !table.joins.is_empty() {
        return Err(BridgeError::parse(
            "joined UPDATE not representable",
            table.relation.to_string(),
        ));
    }
    let (database, table_name) = table_from_factor(&table.relation)?;

    let mut fields = Vec::with_capacity(assignments.len());
    for (idx, a) in assignments.into_iter().enumerate() {
        fields.push(bound_field(
            a.target.to_string(),
            idx as i32 + 1,
            expr_to_value(&a.value)?,
        ));
    }

    let mut predicates = Vec::new();
    if let Some(expr) = selection {
        collect_predicates(&expr, &mut predicates)?;
    }

    Ok(AbstractQuery {
        op: OpKind::Update,
        database,
        table: table_name,
        fields,
        primary_keys: Vec::new(),
        projection: None,
        predicates,
        order_by: Vec::new(),
        limit: None,
        offset: None,
    })
}

fn convert_delete(delete: sp::Delete) -> Result<AbstractQuery> {
    if delete.returning.is_some() {
        return Err(BridgeError::parse("RETURNING not representable", "DELETE"));
    }
    let from_tables = match delete.from {
        sp::FromTable::WithFromKeyword(tables) => tables,
        sp::FromTable::WithoutKeyword(tables) => tables,
    };
    if from_tables.len() != 1 || !from_tables[0].joins.is_empty() {
        return Err(BridgeError::parse(
            "DELETE must target exactly one table",
            "DELETE",
        ));
    }
    let (database, table) = table_from_factor(&from_tables[0].relation)?;

    let mut predicates = Vec::new();
    if let Some(expr) = delete.selection {
        collect_predicates(&expr, &mut predicates)?;
    }

    Ok(AbstractQuery {
        op: OpKind::Delete,
        database,
        table,
        fields: Vec::new(),
        primary_keys: Vec::new(),
        projection: None,
        predicates,
        order_by: Vec::new(),
        limit: None,
        offset: None,
    })
}

fn convert_query(query: sp::Query) -> Result<AbstractQuery> {
    if let Some(with) = &query.with {
        return Err(BridgeError::parse(
            "WITH clause not representable",
            with.to_string(),
        ));
    }
    if let Some(lock) = query.locks.first() {
        return Err(BridgeError::parse(
            "locking clause not representable",
            lock.to_string(),
        ));
    }
    let select = match *query.body {
        sp::SetExpr::Select(select) => *select,
        other => {
            return Err(BridgeError::parse(
                "query body not representable",
                other.to_string(),
            ))
        }
    };
    if let Some(distinct) = &select.distinct {
        return Err(BridgeError::parse(
            "DISTINCT not representable",
            distinct.to_string(),
        ));
    }
    let grouped = match &select.group_by {
        sp::GroupByExpr::Expressions(exprs, _) => !exprs.is_empty(),
        _ => true,
    };
    if grouped {
        return Err(BridgeError::parse(
            "GROUP BY not representable",
            select.group_by.to_string(),
        ));
    }
    if let Some(having) = &select.having {
        return Err(BridgeError::parse(
            "HAVING not representable",
            having.to_string(),
        ));
    }
    if select.from.len() != 1 || !select.from[0].joins.is_empty() {
        return Err(BridgeError::parse(
            "SELECT must target exactly one table",
            select.to_string(),
        ));
    }
    let (database, table) = table_from_factor(&select.from[0].relation)?;

    // A single aggregate projection item turns the query into a Count.
    let (op, projection) = classify_projection(&select.projection)?;

    let mut predicates = Vec::new();
    if let Some(expr) = select.selection {
        collect_predicates(&expr, &mut predicates)?;
    }

    let mut order_by = Vec::new();
    for item in query.order_by.map(|ob| ob.exprs).unwrap_or_default() {
        order_by.push(OrderBy {
            column: column_name(&item.expr)?,
            descending: item.asc == Some(false),
        });
    }

    let limit = query.limit.as_ref().map(number_as_u64).transpose()?;
    let offset = query
        .offset
        .as_ref()
        .map(|o| number_as_u64(&o.value))
        .transpose()?;

    Ok(AbstractQuery {
        op,
        database,
        table,
        fields: Vec::new(),
        primary_keys: Vec::new(),
        projection,
        predicates,
        order_by,
        limit,
        offset,
    })
}

fn classify_projection(items: &[sp::SelectItem]) -> Result<(OpKind, Option<String>)> {
    if items.len() == 1 {
        match &items[0] {
            sp::SelectItem::Wildcard(_) => return Ok((OpKind::Select, None)),
            sp::SelectItem::UnnamedExpr(sp::Expr::Function(func))
                if func
                    .name
                    .0
                    .last()
                    .map(|i| i.value.eq_ignore_ascii_case("count"))
                    .unwrap_or(false) =>
            {
                return Ok((OpKind::Count, Some(func.to_string())));
            }
            _ => {}
        }
    }
    // Plain column list; identifiers are kept unquoted so the target
    // transformer stays dialect-neutral.
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        match item {
            sp::SelectItem::UnnamedExpr(expr) => names.push(column_name(expr)?),
            other => {
                return Err(BridgeError::parse(
                    "projection item not representable",
                    other.to_string(),
                ))
            }
        }
    }
    Ok((OpKind::Select, Some(names.join(", "))))
}

fn number_as_u64(expr: &sp::Expr) -> Result<u64> {
    match expr_to_value(expr)? {
        SqlValue::I64(n) if n >= 0 => Ok(n as u64),
        other => Err(BridgeError::parse(
            "expected a non-negative integer",
            other.describe(),
        )),
    }
}
