//! Dialect-aware database client.
//!
//! A [`Client`] binds one logical connection (an [`Executor`] plus a
//! connection key) to a dialect's plugins from the registry. All SQL
//! generation flows through the dialect transformer; raw SQL is accepted in
//! the reference dialect and re-rendered for everything else. Nested
//! transactions are reference-counted per connection key, so layered
//! application code can open transactions without coordinating.

mod txn;

pub use txn::TxnManager;

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;
use uuid::Uuid;

use crate::cache::SchemaCache;
use crate::core::query::{AbstractQuery, CmpOp, OpKind, QueryBuilder};
use crate::core::registry::DialectRegistry;
use crate::core::schema::{find_column, ColumnDescriptor, FieldData, RowData, SqlContent};
use crate::core::traits::{Catalog, DdlKind, DriverRow, ExecArgs, Executor, Transformer};
use crate::core::value::{normalize_value, SqlValue};
use crate::error::{BridgeError, Result};
use crate::parser::{self, REFERENCE_DIALECT};
use crate::script::split_statements;

/// Filter triple accepted by the convenience read/write methods.
pub type Filter = (String, CmpOp, SqlValue);

/// One dialect-bound logical connection.
pub struct Client {
    dialect: String,
    database: String,
    key: String,
    registry: Arc<DialectRegistry>,
    executor: Arc<dyn Executor>,
    cache: Arc<SchemaCache>,
    txns: Arc<TxnManager>,
}

impl Client {
    /// Bind an executor to a dialect with private cache and transaction
    /// state. Use [`Client::with_shared`] when several clients represent
    /// the same server.
    pub fn new(
        dialect: impl Into<String>,
        database: impl Into<String>,
        key: impl Into<String>,
        registry: Arc<DialectRegistry>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self::with_shared(
            dialect,
            database,
            key,
            registry,
            executor,
            Arc::new(SchemaCache::new()),
            Arc::new(TxnManager::new()),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_shared(
        dialect: impl Into<String>,
        database: impl Into<String>,
        key: impl Into<String>,
        registry: Arc<DialectRegistry>,
        executor: Arc<dyn Executor>,
        cache: Arc<SchemaCache>,
        txns: Arc<TxnManager>,
    ) -> Self {
        Self {
            dialect: dialect.into(),
            database: database.into(),
            key: key.into(),
            registry,
            executor,
            cache,
            txns,
        }
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn catalog(&self) -> Result<Arc<dyn Catalog>> {
        self.registry.require_catalog(&self.dialect)
    }

    fn transformer(&self) -> Result<Arc<dyn Transformer>> {
        self.registry.require_transformer(&self.dialect)
    }

    // ---- schema ----

    /// Column descriptors for a table (cached).
    pub async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let catalog = self.catalog()?;
        self.cache
            .get_columns(
                catalog.as_ref(),
                self.executor.as_ref(),
                &self.dialect,
                &self.database,
                table,
            )
            .await
    }

    /// Primary-key column names for a table (cached).
    pub async fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let catalog = self.catalog()?;
        self.cache
            .get_primary_keys(
                catalog.as_ref(),
                self.executor.as_ref(),
                &self.dialect,
                &self.database,
                table,
            )
            .await
    }

    /// Drop a table's cached descriptors, forcing re-introspection.
    pub async fn invalidate_schema(&self, table: &str) {
        self.cache
            .invalidate(&self.dialect, &self.database, table)
            .await;
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        self.catalog()?
            .table_exists(self.executor.as_ref(), &self.database, table)
            .await
    }

    pub async fn ensure_database(&self) -> Result<()> {
        self.catalog()?
            .ensure_database(self.executor.as_ref(), &self.database)
            .await
    }

    /// DDL text for the named tables.
    pub async fn table_ddl(&self, tables: &[String]) -> Result<Vec<SqlContent>> {
        self.catalog()?
            .get_ddl(self.executor.as_ref(), DdlKind::Table, &self.database, tables)
            .await
    }

    /// Table DDL ordered so referenced tables come first.
    pub async fn sorted_table_ddl(&self, tables: &[String]) -> Result<Vec<SqlContent>> {
        self.catalog()?
            .sorted_table_sql(self.executor.as_ref(), &self.database, tables)
            .await
    }

    // ---- query building ----

    /// Start a builder for a table, pre-filled with the current schema
    /// snapshot (descriptors and primary keys).
    pub async fn query(&self, op: OpKind, table: &str) -> Result<QueryBuilder> {
        let columns = self.columns(table).await?;
        let pks = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
        Ok(QueryBuilder::new(op)
            .database(self.database.clone())
            .table(table)
            .columns(columns)
            .primary_keys(pks))
    }

    fn named_args(query: &AbstractQuery) -> ExecArgs {
        if query.fields.is_empty() {
            ExecArgs::None
        } else {
            ExecArgs::Named(
                query
                    .fields
                    .iter()
                    .map(|f| (f.column.name.clone(), f.value.clone()))
                    .collect::<BTreeMap<_, _>>(),
            )
        }
    }

    /// Render and execute a finalized write query.
    pub async fn run(&self, query: &AbstractQuery) -> Result<u64> {
        let sql = self.transformer()?.render(query)?;
        debug!(dialect = %self.dialect, op = %query.op, table = %query.table, "execute");
        self.executor
            .execute(&sql.sql, &Self::named_args(query))
            .await
    }

    /// Render and execute a read query, resolving rows against the table's
    /// schema snapshot.
    pub async fn fetch(&self, query: &AbstractQuery) -> Result<Vec<RowData>> {
        let sql = self.transformer()?.render(query)?;
        debug!(dialect = %self.dialect, op = %query.op, table = %query.table, "query");
        let rows = self
            .executor
            .query(&sql.sql, &Self::named_args(query))
            .await?;
        self.resolve_rows(&query.table, rows).await
    }

    async fn resolve_rows(&self, table: &str, rows: Vec<DriverRow>) -> Result<Vec<RowData>> {
        let columns = self.columns(table).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(resolve_row(table, &columns, row)?);
        }
        Ok(out)
    }

    fn apply_filters(mut builder: QueryBuilder, filters: &[Filter]) -> QueryBuilder {
        for (column, op, value) in filters {
            builder = builder.filter(column.clone(), *op, value.clone());
        }
        builder
    }

    // ---- writes ----

    pub async fn insert(&self, table: &str, fields: BTreeMap<String, SqlValue>) -> Result<u64> {
        let q = self.query(OpKind::Insert, table).await?.fields(fields).build()?;
        self.run(&q).await
    }

    pub async fn upsert(&self, table: &str, fields: BTreeMap<String, SqlValue>) -> Result<u64> {
        let q = self.query(OpKind::Upsert, table).await?.fields(fields).build()?;
        self.run(&q).await
    }

    pub async fn replace(&self, table: &str, fields: BTreeMap<String, SqlValue>) -> Result<u64> {
        let q = self.query(OpKind::Replace, table).await?.fields(fields).build()?;
        self.run(&q).await
    }

    pub async fn update(
        &self,
        table: &str,
        fields: BTreeMap<String, SqlValue>,
        filters: &[Filter],
    ) -> Result<u64> {
        let builder = self.query(OpKind::Update, table).await?.fields(fields);
        let q = Self::apply_filters(builder, filters).build()?;
        self.run(&q).await
    }

    pub async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let builder = self.query(OpKind::Delete, table).await?;
        let q = Self::apply_filters(builder, filters).build()?;
        self.run(&q).await
    }

    /// Insert many rows inside one transaction. The first failing row rolls
    /// the whole batch back.
    pub async fn batch_insert(
        &self,
        table: &str,
        rows: Vec<BTreeMap<String, SqlValue>>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let txn = self.begin().await?;
        let mut affected = 0;
        for fields in rows {
            match self.insert(table, fields).await {
                Ok(n) => affected += n,
                Err(e) => {
                    txn.rollback().await?;
                    return Err(e);
                }
            }
        }
        txn.commit().await?;
        Ok(affected)
    }

    // ---- reads ----

    pub async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<RowData>> {
        let builder = self.query(OpKind::Select, table).await?;
        let q = Self::apply_filters(builder, filters).build()?;
        self.fetch(&q).await
    }

    pub async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let builder = self.query(OpKind::Count, table).await?;
        let q = Self::apply_filters(builder, filters).build()?;
        let sql = self.transformer()?.render(&q)?;
        let rows = self.executor.query(&sql.sql, &ExecArgs::None).await?;
        let count = rows
            .first()
            .and_then(|r| r.values.first())
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| BridgeError::execution(&sql.sql, "count query returned no value"))?;
        Ok(count.max(0) as u64)
    }

    /// One page of rows plus the unpaged total, for pagination UIs.
    pub async fn list(
        &self,
        table: &str,
        filters: &[Filter],
        order_by: &[(String, bool)],
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<RowData>, u64)> {
        let total = self.count(table, filters).await?;
        let mut builder = Self::apply_filters(self.query(OpKind::Select, table).await?, filters);
        for (column, descending) in order_by {
            builder = builder.order_by(column.clone(), *descending);
        }
        let q = builder
            .limit(page_size)
            .offset(page.saturating_sub(1) * page_size)
            .build()?;
        let rows = self.fetch(&q).await?;
        Ok((rows, total))
    }

    /// Stream rows one at a time through a callback. A row that no longer
    /// matches the schema snapshot aborts the walk with `SchemaDrift`.
    pub async fn travel_data<F>(&self, table: &str, filters: &[Filter], mut f: F) -> Result<u64>
    where
        F: FnMut(RowData) -> Result<()>,
    {
        let rows = self.select(table, filters).await?;
        let mut seen = 0;
        for row in rows {
            f(row)?;
            seen += 1;
        }
        Ok(seen)
    }

    // ---- raw SQL (reference dialect) ----

    /// Fill primary keys from the schema snapshot for parsed queries that
    /// need them for rendering.
    async fn enrich_parsed(&self, mut query: AbstractQuery) -> Result<AbstractQuery> {
        if query.database.is_empty() {
            query.database = self.database.clone();
        }
        if query.op.requires_primary_key() && query.primary_keys.is_empty() {
            query.primary_keys = self.primary_keys(&query.table).await?;
            if query.primary_keys.is_empty() {
                return Err(BridgeError::MissingPrimaryKey(query.table));
            }
        }
        // Adopt descriptor semantics where the table snapshot knows the
        // column. Dialects registered without a catalog half keep the
        // parser's inferred semantics; with a catalog, introspection
        // failures propagate.
        if self.registry.catalog(&self.dialect).is_some() {
            let columns = self.columns(&query.table).await?;
            for field in &mut query.fields {
                if let Some(col) = find_column(&columns, &field.column.name) {
                    field.column = col.clone();
                }
            }
            for predicate in &mut query.predicates {
                if let Some(col) = find_column(&columns, &predicate.column) {
                    predicate.semantic = col.semantic_type;
                }
            }
            query.fields.sort_by_key(|f| f.column.ordinal_pos);
        }
        Ok(query)
    }

    /// Execute a reference-dialect mutation. On a reference-dialect client
    /// the text runs verbatim; elsewhere it is parsed and re-rendered.
    pub async fn exec_raw(&self, sql: &str) -> Result<u64> {
        if self.dialect == REFERENCE_DIALECT {
            return self.executor.execute(sql, &ExecArgs::None).await;
        }
        let query = self.enrich_parsed(parser::parse(sql)?).await?;
        self.run(&query).await
    }

    /// Run a reference-dialect read. On a reference-dialect client the text
    /// runs verbatim; elsewhere it is parsed and re-rendered.
    pub async fn query_raw(&self, sql: &str) -> Result<Vec<RowData>> {
        if self.dialect == REFERENCE_DIALECT {
            let query = parser::parse(sql)?;
            let rows = self.executor.query(sql, &ExecArgs::None).await?;
            return self.resolve_rows(&query.table, rows).await;
        }
        let query = self.enrich_parsed(parser::parse(sql)?).await?;
        self.fetch(&query).await
    }

    /// Stream a reference-dialect read through a callback.
    pub async fn travel_query<F>(&self, sql: &str, mut f: F) -> Result<u64>
    where
        F: FnMut(RowData) -> Result<()>,
    {
        let rows = self.query_raw(sql).await?;
        let mut seen = 0;
        for row in rows {
            f(row)?;
            seen += 1;
        }
        Ok(seen)
    }

    // ---- scripts ----

    /// Split a SQL script by the dialect's conventions and execute each
    /// statement in order. Stops at the first failure and returns the count
    /// of statements executed.
    pub async fn run_script(&self, text: &str) -> Result<usize> {
        let rules = self.catalog()?.script_rules();
        let statements = split_statements(text, &rules);
        let mut executed = 0;
        for statement in statements {
            self.executor.execute(&statement, &ExecArgs::None).await?;
            executed += 1;
        }
        debug!(dialect = %self.dialect, executed, "script ingested");
        Ok(executed)
    }

    /// Read a script file and run it via [`Client::run_script`].
    pub async fn run_script_file(&self, path: &std::path::Path) -> Result<usize> {
        let text = tokio::fs::read_to_string(path).await?;
        self.run_script(&text).await
    }

    // ---- transactions ----

    /// Open (or nest into) a transaction on this connection key.
    pub async fn begin(&self) -> Result<Txn<'_>> {
        let depth = self.txns.begin(&self.key).await;
        if depth == 1 {
            if let Err(e) = self.executor.begin().await {
                self.txns.rollback(&self.key).await;
                return Err(e);
            }
        }
        let id = Uuid::new_v4();
        debug!(key = %self.key, depth, %id, "transaction scope opened");
        Ok(Txn { client: self, id })
    }

    /// Run a closure inside a transaction: commit on `Ok`, roll back on
    /// `Err`, and roll back with `TransactionAborted` if the future panics.
    pub async fn with_transaction<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let txn = self.begin().await?;
        match AssertUnwindSafe(f()).catch_unwind().await {
            Ok(Ok(value)) => {
                txn.commit().await?;
                Ok(value)
            }
            Ok(Err(e)) => {
                txn.rollback().await?;
                Err(e)
            }
            Err(panic) => {
                txn.rollback().await?;
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic in transaction scope".to_string());
                Err(BridgeError::TransactionAborted(message))
            }
        }
    }
}

/// Resolve a raw driver row against a table's schema snapshot.
fn resolve_row(table: &str, columns: &[ColumnDescriptor], row: DriverRow) -> Result<RowData> {
    let mut fields = Vec::with_capacity(row.columns.len());
    for (name, value) in row.columns.into_iter().zip(row.values) {
        let column = find_column(columns, &name).ok_or_else(|| BridgeError::SchemaDrift {
            table: table.to_string(),
            column: name.clone(),
        })?;
        fields.push(FieldData::new(column, normalize_value(value, false)));
    }
    Ok(RowData::new(table, fields))
}

/// One transaction scope. Consumed by [`Txn::commit`] or [`Txn::rollback`];
/// dropping it without either leaves the depth counter to the enclosing
/// scope (use [`Client::with_transaction`] for guard semantics).
pub struct Txn<'a> {
    client: &'a Client,
    id: Uuid,
}

impl Txn<'_> {
    /// Commit this scope; the physical commit happens when the outermost
    /// scope commits.
    pub async fn commit(self) -> Result<()> {
        if self.client.txns.commit(&self.client.key).await {
            self.client.executor.commit().await?;
        }
        debug!(key = %self.client.key, id = %self.id, "transaction scope committed");
        Ok(())
    }

    /// Roll back the whole transaction immediately, regardless of depth.
    pub async fn rollback(self) -> Result<()> {
        if self.client.txns.rollback(&self.client.key).await {
            self.client.executor.rollback().await?;
        }
        debug!(key = %self.client.key, id = %self.id, "transaction rolled back");
        Ok(())
    }
}
