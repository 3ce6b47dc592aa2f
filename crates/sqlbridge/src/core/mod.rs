//! Core abstractions of the access layer.
//!
//! - [`schema`]: column descriptors, field/row containers, generated-SQL units
//! - [`value`]: SQL value representation and literal formatting
//! - [`query`]: the dialect-agnostic abstract query and its builder
//! - [`traits`]: executor contract and the two dialect plugin halves
//! - [`registry`]: explicit dialect plugin registry
//!
//! Everything here is dialect-agnostic; dialect modules implement the traits
//! and the client wires them together over an injected executor.

pub mod query;
pub mod registry;
pub mod schema;
pub mod traits;
pub mod value;

pub use query::{AbstractQuery, BoundField, CmpOp, OpKind, OrderBy, Predicate, QueryBuilder};
pub use registry::{DialectPlugin, DialectRegistry};
pub use schema::{ColumnDescriptor, FieldData, RowData, SemanticType, SqlContent};
pub use traits::{Catalog, DdlKind, DriverRow, ExecArgs, Executor, Transformer};
pub use value::{escape_string, format_value, normalize_value, SqlValue};
