//! # sqlbridge
//!
//! Dialect-independent database access layer.
//!
//! Applications describe operations against an abstract query model and
//! write raw SQL in one reference dialect (MySQL); per-dialect plugins turn
//! both into the SQL each engine actually runs. Wire drivers are injected
//! behind the [`Executor`] trait, so the crate itself never opens sockets.
//!
//! - **Abstract queries** built fluently and rendered per dialect
//! - **Reference-SQL parsing** so one SQL text serves every backend
//! - **Schema introspection** with a TTL descriptor cache
//! - **Nested transactions** reference-counted per connection key
//! - **DDL dependency ordering** for safe schema replay
//! - **Script ingestion** honoring per-dialect statement conventions
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sqlbridge::{Client, DialectRegistry, OpKind};
//!
//! # async fn example(executor: Arc<dyn sqlbridge::Executor>) -> sqlbridge::Result<()> {
//! let registry = Arc::new(DialectRegistry::with_builtins());
//! let client = Client::new("postgres", "app", "primary", registry, executor);
//!
//! let q = client
//!     .query(OpKind::Select, "users")
//!     .await?
//!     .filter("active", sqlbridge::CmpOp::Eq, true)
//!     .limit(50)
//!     .build()?;
//! let rows = client.fetch(&q).await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod core;
pub mod dialects;
pub mod error;
pub mod parser;
pub mod script;
pub mod topo;

// Re-exports for convenient access
pub use cache::SchemaCache;
pub use client::{Client, Filter, Txn, TxnManager};
pub use config::ConnectionInfo;
pub use core::query::{AbstractQuery, CmpOp, OpKind, QueryBuilder};
pub use core::registry::{DialectPlugin, DialectRegistry};
pub use core::schema::{ColumnDescriptor, FieldData, RowData, SemanticType, SqlContent};
pub use core::traits::{Catalog, DdlKind, DriverRow, ExecArgs, Executor, Transformer};
pub use core::value::SqlValue;
pub use error::{BridgeError, Result};
pub use parser::REFERENCE_DIALECT;
pub use script::ScriptRules;
