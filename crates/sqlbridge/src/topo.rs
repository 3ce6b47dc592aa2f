//! Foreign-key dependency ordering for table DDL replay.
//!
//! Given a set of `CREATE TABLE` statements, orders them so that every table
//! appears after the tables it references. Only references to tables inside
//! the input set matter; external references and self-references are ignored.

use std::collections::{HashMap, HashSet};

use sqlparser::ast::{ColumnOption, Statement, TableConstraint};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::core::schema::SqlContent;
use crate::error::{BridgeError, Result};

/// Tables a CREATE TABLE statement references through foreign keys.
fn referenced_tables(ddl: &SqlContent) -> Result<Vec<String>> {
    let statements = Parser::parse_sql(&MySqlDialect {}, &ddl.sql)
        .map_err(|e| BridgeError::parse(e.to_string(), ddl.name.clone()))?;

    let mut refs = Vec::new();
    for statement in statements {
        let create = match statement {
            Statement::CreateTable(create) => create,
            _ => continue,
        };
        for constraint in &create.constraints {
            if let TableConstraint::ForeignKey { foreign_table, .. } = constraint {
                if let Some(ident) = foreign_table.0.last() {
                    refs.push(ident.value.clone());
                }
            }
        }
        for column in &create.columns {
            for option in &column.options {
                if let ColumnOption::ForeignKey { foreign_table, .. } = &option.option {
                    if let Some(ident) = foreign_table.0.last() {
                        refs.push(ident.value.clone());
                    }
                }
            }
        }
    }
    Ok(refs)
}

/// Order table DDL so referenced tables come first.
///
/// Input order is preserved among tables with no dependency between them.
/// A cycle among the inputs fails with
/// [`BridgeError::CircularDependency`] naming the tables left unplaced.
pub fn sort_tables(ddl: &[SqlContent]) -> Result<Vec<SqlContent>> {
    // Dependencies restricted to the input set, matched case-insensitively.
    let known: HashMap<String, usize> = ddl
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.to_lowercase(), i))
        .collect();

    let mut deps: Vec<HashSet<usize>> = Vec::with_capacity(ddl.len());
    for (i, content) in ddl.iter().enumerate() {
        let mut set = HashSet::new();
        for name in referenced_tables(content)? {
            if let Some(&j) = known.get(&name.to_lowercase()) {
                if j != i {
                    set.insert(j);
                }
            }
        }
        deps.push(set);
    }

    let mut sorted: Vec<SqlContent> = Vec::with_capacity(ddl.len());
    let mut placed: HashSet<usize> = HashSet::new();
    while placed.len() < ddl.len() {
        let mut progressed = false;
        for i in 0..ddl.len() {
            if placed.contains(&i) {
                continue;
            }
            if deps[i].iter().all(|j| placed.contains(j)) {
                sorted.push(ddl[i].clone());
                placed.insert(i);
                progressed = true;
            }
        }
        if !progressed {
            let remaining: Vec<String> = ddl
                .iter()
                .enumerate()
                .filter(|(i, _)| !placed.contains(i))
                .map(|(_, c)| c.name.clone())
                .collect();
            return Err(BridgeError::CircularDependency { remaining });
        }
    }

    debug!(tables = sorted.len(), "ordered table DDL by foreign keys");
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(name: &str, sql: &str) -> SqlContent {
        SqlContent::new(name, sql.to_string())
    }

    #[test]
    fn test_sort_respects_foreign_keys() {
        let ddl = vec![
            content(
                "orders",
                "CREATE TABLE orders (id INT PRIMARY KEY, user_id INT, \
                 FOREIGN KEY (user_id) REFERENCES users(id))",
            ),
            content("users", "CREATE TABLE users (id INT PRIMARY KEY)"),
        ];
        let sorted = sort_tables(&ddl).unwrap();
        assert_eq!(sorted[0].name, "users");
        assert_eq!(sorted[1].name, "orders");
    }

    #[test]
    fn test_sort_chain_of_three() {
        let ddl = vec![
            content("a", "CREATE TABLE a (id INT PRIMARY KEY)"),
            content(
                "b",
                "CREATE TABLE b (id INT PRIMARY KEY, a_id INT, \
                 FOREIGN KEY (a_id) REFERENCES a(id))",
            ),
            content(
                "c",
                "CREATE TABLE c (id INT PRIMARY KEY, b_id INT, \
                 FOREIGN KEY (b_id) REFERENCES b(id))",
            ),
        ];
        let sorted = sort_tables(&ddl).unwrap();
        let names: Vec<&str> = sorted.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_sort_preserves_input_order_without_dependencies() {
        let ddl = vec![
            content("z", "CREATE TABLE z (id INT)"),
            content("a", "CREATE TABLE a (id INT)"),
        ];
        let sorted = sort_tables(&ddl).unwrap();
        let names: Vec<&str> = sorted.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["z", "a"]);
    }

    #[test]
    fn test_self_reference_is_ignored() {
        let ddl = vec![content(
            "employees",
            "CREATE TABLE employees (id INT PRIMARY KEY, manager_id INT, \
             FOREIGN KEY (manager_id) REFERENCES employees(id))",
        )];
        let sorted = sort_tables(&ddl).unwrap();
        assert_eq!(sorted.len(), 1);
    }

    #[test]
    fn test_external_reference_is_ignored() {
        let ddl = vec![content(
            "orders",
            "CREATE TABLE orders (id INT PRIMARY KEY, user_id INT, \
             FOREIGN KEY (user_id) REFERENCES users(id))",
        )];
        let sorted = sort_tables(&ddl).unwrap();
        assert_eq!(sorted.len(), 1);
    }

    #[test]
    fn test_cycle_names_remaining_tables() {
        let ddl = vec![
            content(
                "a",
                "CREATE TABLE a (id INT PRIMARY KEY, b_id INT, \
                 FOREIGN KEY (b_id) REFERENCES b(id))",
            ),
            content(
                "b",
                "CREATE TABLE b (id INT PRIMARY KEY, a_id INT, \
                 FOREIGN KEY (a_id) REFERENCES a(id))",
            ),
        ];
        let err = sort_tables(&ddl).unwrap_err();
        match err {
            BridgeError::CircularDependency { remaining } => {
                assert!(remaining.contains(&"a".to_string()));
                assert!(remaining.contains(&"b".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_case_insensitive_reference_match() {
        let ddl = vec![
            content(
                "Orders",
                "CREATE TABLE Orders (id INT PRIMARY KEY, user_id INT, \
                 FOREIGN KEY (user_id) REFERENCES USERS(id))",
            ),
            content("users", "CREATE TABLE users (id INT PRIMARY KEY)"),
        ];
        let sorted = sort_tables(&ddl).unwrap();
        assert_eq!(sorted[0].name, "users");
    }
}
