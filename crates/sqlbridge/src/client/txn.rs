//! Reference-counted nested transaction bookkeeping.
//!
//! Application layers open transactions without knowing whether an outer
//! scope already did. Each logical connection key carries a depth counter:
//! the first begin opens a physical transaction, inner begins only bump the
//! counter, and only the commit that brings the counter back to zero
//! commits physically. A rollback at any depth rolls back physically and
//! clears the counter, so later commits in outer scopes become no-ops.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

/// Depth counters per logical connection key.
#[derive(Debug, Default)]
pub struct TxnManager {
    counts: Mutex<HashMap<String, usize>>,
}

impl TxnManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one begin and return the new depth. Depth 1 means the
    /// caller must open a physical transaction.
    pub async fn begin(&self, key: &str) -> usize {
        let mut counts = self.counts.lock().await;
        let depth = counts.entry(key.to_string()).or_insert(0);
        *depth += 1;
        debug!(key, depth = *depth, "transaction begin");
        *depth
    }

    /// Register one commit. Returns true when the counter reached zero and
    /// the caller must commit physically.
    pub async fn commit(&self, key: &str) -> bool {
        let mut counts = self.counts.lock().await;
        match counts.get_mut(key) {
            Some(depth) if *depth > 1 => {
                *depth -= 1;
                debug!(key, depth = *depth, "transaction commit deferred");
                false
            }
            Some(_) => {
                counts.remove(key);
                debug!(key, "transaction commit physical");
                true
            }
            // Commit without begin: autocommit, nothing to do.
            None => false,
        }
    }

    /// Register a rollback: the counter is cleared regardless of depth.
    /// Returns true when a physical rollback must be issued; false when no
    /// transaction was open (autocommit rollback is a no-op).
    pub async fn rollback(&self, key: &str) -> bool {
        let mut counts = self.counts.lock().await;
        let open = counts.remove(key).is_some();
        debug!(key, physical = open, "transaction rollback");
        open
    }

    /// Current depth for a key (0 when no transaction is open).
    pub async fn depth(&self, key: &str) -> usize {
        let counts = self.counts.lock().await;
        counts.get(key).copied().unwrap_or(0)
    }
}
