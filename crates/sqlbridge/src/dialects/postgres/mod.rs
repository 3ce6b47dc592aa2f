//! PostgreSQL dialect plugins.

mod catalog;
mod transformer;

pub use catalog::PostgresCatalog;
pub use transformer::PostgresTransformer;
