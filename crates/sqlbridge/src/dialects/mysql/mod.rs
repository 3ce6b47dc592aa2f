//! MySQL dialect plugins: the reference dialect of the access layer.
//!
//! Raw SQL written against MySQL is executed verbatim on MySQL clients and
//! parsed/re-rendered for every other dialect.

mod catalog;
mod transformer;

pub use catalog::MysqlCatalog;
pub use transformer::MysqlTransformer;
