//! TTL cache for table column descriptors.
//!
//! Introspection queries are expensive relative to how rarely schemas
//! change, so descriptors are cached per (dialect, database, table) with a
//! time-to-live. Concurrent misses for the same table may each hit the
//! catalog; last write wins and both see equivalent data. Expired entries
//! are dropped lazily during a periodic sweep piggybacked on lookups.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::core::schema::ColumnDescriptor;
use crate::core::traits::{Catalog, Executor};
use crate::error::Result;

const DEFAULT_TTL: Duration = Duration::from_secs(120);
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

struct Entry {
    columns: Vec<ColumnDescriptor>,
    inserted: Instant,
}

struct CacheState {
    entries: HashMap<(String, String, String), Entry>,
    last_sweep: Instant,
}

/// Schema descriptor cache shared by all clients of a registry.
pub struct SchemaCache {
    state: RwLock<CacheState>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL, SWEEP_INTERVAL)
    }

    pub fn with_ttl(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            ttl,
            sweep_interval,
        }
    }

    fn key(dialect: &str, database: &str, table: &str) -> (String, String, String) {
        (
            dialect.to_lowercase(),
            database.to_lowercase(),
            table.to_lowercase(),
        )
    }

    /// Column descriptors for a table, from cache or the catalog.
    pub async fn get_columns(
        &self,
        catalog: &dyn Catalog,
        exec: &dyn Executor,
        dialect: &str,
        database: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>> {
        let key = Self::key(dialect, database, table);
        {
            let state = self.state.read().await;
            if let Some(entry) = state.entries.get(&key) {
                if entry.inserted.elapsed() < self.ttl {
                    return Ok(entry.columns.clone());
                }
            }
        }

        let columns = catalog.get_columns(exec, database, table).await?;
        debug!(dialect, database, table, "cached column descriptors");

        let mut state = self.state.write().await;
        if state.last_sweep.elapsed() >= self.sweep_interval {
            let ttl = self.ttl;
            state.entries.retain(|_, e| e.inserted.elapsed() < ttl);
            state.last_sweep = Instant::now();
        }
        state.entries.insert(
            key,
            Entry {
                columns: columns.clone(),
                inserted: Instant::now(),
            },
        );
        Ok(columns)
    }

    /// Primary-key column names for a table.
    pub async fn get_primary_keys(
        &self,
        catalog: &dyn Catalog,
        exec: &dyn Executor,
        dialect: &str,
        database: &str,
        table: &str,
    ) -> Result<Vec<String>> {
        let columns = self
            .get_columns(catalog, exec, dialect, database, table)
            .await?;
        Ok(columns
            .into_iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name)
            .collect())
    }

    /// Drop one table's entry, forcing re-introspection on next access.
    pub async fn invalidate(&self, dialect: &str, database: &str, table: &str) {
        let key = Self::key(dialect, database, table);
        let mut state = self.state.write().await;
        state.entries.remove(&key);
    }
}
