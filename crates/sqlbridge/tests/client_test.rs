//! Client integration tests over a mock executor.
//!
//! These tests verify end-to-end behavior of the client layer: SQL routed
//! through the dialect transformers, schema introspection answered from the
//! cache, nested transaction accounting, and raw-SQL re-rendering across
//! dialects.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlbridge::{
    BridgeError, Client, CmpOp, DialectRegistry, DriverRow, ExecArgs, Executor, Result, SqlValue,
};

/// Scriptable executor: logs every statement, counts transaction calls, and
/// hands back queued query results in FIFO order.
struct MockExecutor {
    executed: Mutex<Vec<String>>,
    queried: Mutex<Vec<String>>,
    results: Mutex<VecDeque<Vec<DriverRow>>>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    fail_on: Mutex<Option<String>>,
}

impl MockExecutor {
    fn new() -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            queried: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            begins: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
            fail_on: Mutex::new(None),
        }
    }

    fn queue_result(&self, rows: Vec<DriverRow>) {
        self.results.lock().unwrap().push_back(rows);
    }

    /// Make `execute` fail for any statement containing the given text.
    fn fail_on(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn queue_users_schema(&self) {
        // information_schema answer for a two-column table with an int PK.
        self.queue_result(vec![
            DriverRow::new(
                vec![
                    "COLUMN_NAME".to_string(),
                    "DATA_TYPE".to_string(),
                    "IS_NULLABLE".to_string(),
                    "COLUMN_KEY".to_string(),
                    "ORDINAL_POSITION".to_string(),
                ],
                vec![
                    SqlValue::from("id"),
                    SqlValue::from("bigint"),
                    SqlValue::from("NO"),
                    SqlValue::from("PRI"),
                    SqlValue::I64(1),
                ],
            ),
            DriverRow::new(
                vec![
                    "COLUMN_NAME".to_string(),
                    "DATA_TYPE".to_string(),
                    "IS_NULLABLE".to_string(),
                    "COLUMN_KEY".to_string(),
                    "ORDINAL_POSITION".to_string(),
                ],
                vec![
                    SqlValue::from("name"),
                    SqlValue::from("varchar"),
                    SqlValue::from("YES"),
                    SqlValue::from(""),
                    SqlValue::I64(2),
                ],
            ),
        ]);
    }

    fn queue_users_schema_pg(&self) {
        // Same table shape as answered by the postgres catalog's
        // information_schema join.
        self.queue_result(vec![
            DriverRow::new(
                vec![
                    "column_name".to_string(),
                    "data_type".to_string(),
                    "is_nullable".to_string(),
                    "ordinal_position".to_string(),
                    "constraint_type".to_string(),
                ],
                vec![
                    SqlValue::from("id"),
                    SqlValue::from("bigint"),
                    SqlValue::from("NO"),
                    SqlValue::I64(1),
                    SqlValue::from("PRIMARY KEY"),
                ],
            ),
            DriverRow::new(
                vec![
                    "column_name".to_string(),
                    "data_type".to_string(),
                    "is_nullable".to_string(),
                    "ordinal_position".to_string(),
                    "constraint_type".to_string(),
                ],
                vec![
                    SqlValue::from("name"),
                    SqlValue::from("character varying"),
                    SqlValue::from("YES"),
                    SqlValue::I64(2),
                    SqlValue::from(""),
                ],
            ),
        ]);
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, sql: &str, _args: &ExecArgs) -> Result<u64> {
        if let Some(needle) = self.fail_on.lock().unwrap().as_deref() {
            if sql.contains(needle) {
                return Err(BridgeError::execution(sql, "injected failure"));
            }
        }
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(1)
    }

    async fn query(&self, sql: &str, _args: &ExecArgs) -> Result<Vec<DriverRow>> {
        self.queried.lock().unwrap().push(sql.to_string());
        Ok(self.results.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn begin(&self) -> Result<()> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn client(dialect: &str, exec: Arc<MockExecutor>) -> Client {
    let registry = Arc::new(DialectRegistry::with_builtins());
    Client::new(dialect, "app", "conn-1", registry, exec)
}

// =============================================================================
// Write Path Tests
// =============================================================================

#[tokio::test]
async fn test_insert_renders_mysql_and_executes() {
    let exec = Arc::new(MockExecutor::new());
    exec.queue_users_schema();
    let c = client("mysql", exec.clone());

    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), SqlValue::I64(1));
    fields.insert("name".to_string(), SqlValue::from("a"));
    fields.insert("bogus".to_string(), SqlValue::from("dropped"));

    let affected = c.insert("users", fields).await.unwrap();
    assert_eq!(affected, 1);

    let executed = exec.executed();
    assert_eq!(
        executed[0],
        "INSERT INTO `app`.`users` (`id`, `name`) VALUES (:id, :name)"
    );
}

#[tokio::test]
async fn test_upsert_uses_cached_primary_keys() {
    let exec = Arc::new(MockExecutor::new());
    exec.queue_users_schema();
    let c = client("mysql", exec.clone());

    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), SqlValue::I64(1));
    fields.insert("name".to_string(), SqlValue::from("a"));

    c.upsert("users", fields).await.unwrap();
    let executed = exec.executed();
    assert!(executed[0].contains("ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"));
}

#[tokio::test]
async fn test_replace_without_primary_key_fails_before_sql() {
    let exec = Arc::new(MockExecutor::new());
    // Table with no PRI column.
    exec.queue_result(vec![DriverRow::new(
        vec![
            "COLUMN_NAME".to_string(),
            "DATA_TYPE".to_string(),
            "IS_NULLABLE".to_string(),
            "COLUMN_KEY".to_string(),
            "ORDINAL_POSITION".to_string(),
        ],
        vec![
            SqlValue::from("note"),
            SqlValue::from("varchar"),
            SqlValue::from("YES"),
            SqlValue::from(""),
            SqlValue::I64(1),
        ],
    )]);
    let c = client("mysql", exec.clone());

    let mut fields = BTreeMap::new();
    fields.insert("note".to_string(), SqlValue::from("x"));

    let err = c.replace("logs", fields).await.unwrap_err();
    assert!(matches!(err, BridgeError::MissingPrimaryKey(t) if t == "logs"));
    assert!(exec.executed().is_empty());
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[tokio::test]
async fn test_nested_transactions_commit_once() {
    let exec = Arc::new(MockExecutor::new());
    let c = client("mysql", exec.clone());

    let outer = c.begin().await.unwrap();
    let mid = c.begin().await.unwrap();
    let inner = c.begin().await.unwrap();

    inner.commit().await.unwrap();
    mid.commit().await.unwrap();
    assert_eq!(exec.commits.load(Ordering::SeqCst), 0);

    outer.commit().await.unwrap();
    assert_eq!(exec.begins.load(Ordering::SeqCst), 1);
    assert_eq!(exec.commits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_inner_rollback_defeats_outer_commit() {
    let exec = Arc::new(MockExecutor::new());
    let c = client("mysql", exec.clone());

    let outer = c.begin().await.unwrap();
    let inner = c.begin().await.unwrap();

    inner.rollback().await.unwrap();
    assert_eq!(exec.rollbacks.load(Ordering::SeqCst), 1);

    // The outer commit finds no open transaction and stays logical.
    outer.commit().await.unwrap();
    assert_eq!(exec.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_with_transaction_commits_on_ok() {
    let exec = Arc::new(MockExecutor::new());
    let c = client("mysql", exec.clone());

    let value = c.with_transaction(|| async { Ok(42) }).await.unwrap();
    assert_eq!(value, 42);
    assert_eq!(exec.commits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_with_transaction_rolls_back_on_err() {
    let exec = Arc::new(MockExecutor::new());
    let c = client("mysql", exec.clone());

    let err = c
        .with_transaction(|| async {
            Err::<(), _>(BridgeError::Config("boom".to_string()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Config(_)));
    assert_eq!(exec.rollbacks.load(Ordering::SeqCst), 1);
    assert_eq!(exec.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_with_transaction_converts_panic() {
    let exec = Arc::new(MockExecutor::new());
    let c = client("mysql", exec.clone());

    let err = c
        .with_transaction(|| async { panic!("kaboom") })
        .await
        .map(|_: ()| ())
        .unwrap_err();
    assert!(matches!(err, BridgeError::TransactionAborted(m) if m.contains("kaboom")));
    assert_eq!(exec.rollbacks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_batch_insert_rolls_back_on_bad_row() {
    let exec = Arc::new(MockExecutor::new());
    exec.queue_users_schema();
    let c = client("mysql", exec.clone());

    let mut good = BTreeMap::new();
    good.insert("id".to_string(), SqlValue::I64(1));
    good.insert("name".to_string(), SqlValue::from("a"));

    // Only unknown keys: every field is dropped, so the row has nothing to
    // write and the whole batch must roll back.
    let mut bad = BTreeMap::new();
    bad.insert("bogus".to_string(), SqlValue::from("x"));

    let err = c
        .batch_insert("users", vec![good, bad])
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::NoFields(_)));
    assert_eq!(exec.executed().len(), 1);
    assert_eq!(exec.rollbacks.load(Ordering::SeqCst), 1);
    assert_eq!(exec.commits.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Read Path Tests
// =============================================================================

#[tokio::test]
async fn test_select_resolves_rows_against_schema() {
    let exec = Arc::new(MockExecutor::new());
    exec.queue_users_schema();
    exec.queue_result(vec![DriverRow::new(
        vec!["name".to_string(), "id".to_string()],
        vec![SqlValue::from("a"), SqlValue::I64(7)],
    )]);
    let c = client("mysql", exec.clone());

    let rows = c
        .select("users", &[("id".to_string(), CmpOp::Eq, SqlValue::I64(7))])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    // Fields come back sorted by ordinal, with key flags attached.
    assert_eq!(rows[0].fields[0].name, "id");
    assert!(rows[0].fields[0].is_pk);
    assert_eq!(rows[0].get("name").unwrap().value, SqlValue::from("a"));
}

#[tokio::test]
async fn test_select_unknown_column_is_schema_drift() {
    let exec = Arc::new(MockExecutor::new());
    exec.queue_users_schema();
    exec.queue_result(vec![DriverRow::new(
        vec!["ghost".to_string()],
        vec![SqlValue::I64(0)],
    )]);
    let c = client("mysql", exec);

    let err = c.select("users", &[]).await.unwrap_err();
    assert!(matches!(err, BridgeError::SchemaDrift { column, .. } if column == "ghost"));
}

#[tokio::test]
async fn test_count_reads_first_value() {
    let exec = Arc::new(MockExecutor::new());
    exec.queue_users_schema();
    exec.queue_result(vec![DriverRow::new(
        vec!["COUNT(1)".to_string()],
        vec![SqlValue::I64(42)],
    )]);
    let c = client("mysql", exec);

    let n = c.count("users", &[]).await.unwrap();
    assert_eq!(n, 42);
}

// =============================================================================
// Raw SQL Tests
// =============================================================================

#[tokio::test]
async fn test_exec_raw_passthrough_on_reference_dialect() {
    let exec = Arc::new(MockExecutor::new());
    let c = client("mysql", exec.clone());

    let raw = "INSERT INTO users (id, name) VALUES (1, 'a')";
    c.exec_raw(raw).await.unwrap();
    assert_eq!(exec.executed()[0], raw);
}

#[tokio::test]
async fn test_exec_raw_rerenders_for_postgres() {
    let exec = Arc::new(MockExecutor::new());
    exec.queue_users_schema_pg();
    let c = client("postgres", exec.clone());

    c.exec_raw("INSERT INTO users (id, name) VALUES (1, 'a')")
        .await
        .unwrap();
    assert_eq!(
        exec.executed()[0],
        "INSERT INTO \"app\".\"users\" (\"id\", \"name\") VALUES (:id, :name)"
    );
}

#[tokio::test]
async fn test_exec_raw_replace_on_postgres_uses_conflict_clause() {
    let exec = Arc::new(MockExecutor::new());
    exec.queue_users_schema_pg();
    let c = client("postgres", exec.clone());

    c.exec_raw("REPLACE INTO users (id, name) VALUES (1, 'a')")
        .await
        .unwrap();
    assert!(exec.executed()[0]
        .contains("ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""));
}

#[tokio::test]
async fn test_exec_raw_surfaces_introspection_failure() {
    let exec = Arc::new(MockExecutor::new());
    // No schema rows queued: introspection comes back empty, which the
    // catalog reports as an error instead of silently rendering blind.
    let c = client("postgres", exec.clone());

    let err = c
        .exec_raw("INSERT INTO users (id) VALUES (1)")
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::ColumnNotFound { .. }));
    assert!(exec.executed().is_empty());
}

#[tokio::test]
async fn test_exec_raw_unparseable_names_fragment() {
    let exec = Arc::new(MockExecutor::new());
    let c = client("postgres", exec);

    let err = c
        .exec_raw("INSERT INTO users (id) VALUES (1), (2)")
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::ParseFailure { .. }));
}

// =============================================================================
// Script Ingestion Tests
// =============================================================================

#[tokio::test]
async fn test_run_script_splits_and_executes() {
    let exec = Arc::new(MockExecutor::new());
    let c = client("mysql", exec.clone());

    let script = "CREATE TABLE a (id INT); # comment line\nINSERT INTO a VALUES (1);";
    let executed = c.run_script(script).await.unwrap();
    assert_eq!(executed, 2);
    assert_eq!(exec.executed().len(), 2);
}

#[tokio::test]
async fn test_run_script_stops_at_first_failure() {
    let exec = Arc::new(MockExecutor::new());
    exec.fail_on("bad_table");
    let c = client("mysql", exec.clone());

    let script = "INSERT INTO a VALUES (1); INSERT INTO bad_table VALUES (2); INSERT INTO c VALUES (3);";
    let err = c.run_script(script).await.unwrap_err();
    assert!(matches!(err, BridgeError::Execution { .. }));
    assert_eq!(exec.executed().len(), 1);
}
