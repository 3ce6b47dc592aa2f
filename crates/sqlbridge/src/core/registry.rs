//! Dialect plugin registry for explicit dependency injection.
//!
//! The [`DialectRegistry`] maps a dialect name to its two independently
//! registrable plugin halves: a [`Catalog`] and a [`Transformer`]. It is an
//! explicitly constructed object passed into clients, not an ambient
//! process-wide singleton. Lifecycle: populated at startup, read-many
//! afterwards; registration is last-write-wins per half and there is no
//! unregistration path.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::traits::{Catalog, Transformer};
use crate::error::{BridgeError, Result};

/// The two optional capability halves registered under one dialect name.
#[derive(Clone, Default)]
pub struct DialectPlugin {
    pub catalog: Option<Arc<dyn Catalog>>,
    pub transformer: Option<Arc<dyn Transformer>>,
}

impl DialectPlugin {
    pub fn with_catalog(catalog: impl Catalog + 'static) -> Self {
        Self {
            catalog: Some(Arc::new(catalog)),
            transformer: None,
        }
    }

    pub fn with_transformer(transformer: impl Transformer + 'static) -> Self {
        Self {
            catalog: None,
            transformer: Some(Arc::new(transformer)),
        }
    }

    pub fn new(
        catalog: impl Catalog + 'static,
        transformer: impl Transformer + 'static,
    ) -> Self {
        Self {
            catalog: Some(Arc::new(catalog)),
            transformer: Some(Arc::new(transformer)),
        }
    }
}

/// Registry of dialect plugins, keyed by dialect name.
#[derive(Default)]
pub struct DialectRegistry {
    plugins: HashMap<String, DialectPlugin>,
}

impl DialectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in dialects registered:
    /// MySQL (catalog + transformer) and PostgreSQL (catalog + transformer).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::dialects::register_builtins(&mut registry);
        registry
    }

    /// Register a plugin under a dialect name.
    ///
    /// A plugin may supply either half or both. Each supplied half replaces
    /// the previously registered one (last-write-wins); an absent half
    /// leaves the existing registration untouched.
    pub fn register(&mut self, name: impl Into<String>, plugin: DialectPlugin) {
        let entry = self.plugins.entry(name.into()).or_default();
        if let Some(catalog) = plugin.catalog {
            entry.catalog = Some(catalog);
        }
        if let Some(transformer) = plugin.transformer {
            entry.transformer = Some(transformer);
        }
    }

    /// Get the catalog half for a dialect.
    pub fn catalog(&self, name: &str) -> Option<Arc<dyn Catalog>> {
        self.plugins.get(name).and_then(|p| p.catalog.clone())
    }

    /// Get the transformer half for a dialect.
    pub fn transformer(&self, name: &str) -> Option<Arc<dyn Transformer>> {
        self.plugins.get(name).and_then(|p| p.transformer.clone())
    }

    /// Get the catalog half, erroring if the dialect has none.
    pub fn require_catalog(&self, name: &str) -> Result<Arc<dyn Catalog>> {
        self.catalog(name)
            .ok_or_else(|| BridgeError::UnsupportedDialect(name.to_string()))
    }

    /// Get the transformer half, erroring if the dialect has none.
    pub fn require_transformer(&self, name: &str) -> Result<Arc<dyn Transformer>> {
        self.transformer(name)
            .ok_or_else(|| BridgeError::UnsupportedDialect(name.to_string()))
    }

    /// Registered dialect names.
    pub fn dialect_names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialectRegistry")
            .field("dialects", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::AbstractQuery;
    use crate::core::schema::{ColumnDescriptor, SqlContent};
    use crate::core::traits::{DdlKind, Executor};
    use async_trait::async_trait;

    struct MockTransformer(&'static str);

    impl Transformer for MockTransformer {
        fn dialect(&self) -> &str {
            self.0
        }
        fn render(&self, query: &AbstractQuery) -> Result<SqlContent> {
            Ok(SqlContent::new(&query.table, format!("-- {}", self.0)))
        }
    }

    struct MockCatalog(&'static str);

    #[async_trait]
    impl Catalog for MockCatalog {
        fn dialect(&self) -> &str {
            self.0
        }
        async fn table_exists(&self, _: &dyn Executor, _: &str, _: &str) -> Result<bool> {
            Ok(true)
        }
        async fn get_columns(
            &self,
            _: &dyn Executor,
            _: &str,
            _: &str,
        ) -> Result<Vec<ColumnDescriptor>> {
            Ok(vec![])
        }
        async fn get_ddl(
            &self,
            _: &dyn Executor,
            _: DdlKind,
            _: &str,
            _: &[String],
        ) -> Result<Vec<SqlContent>> {
            Ok(vec![])
        }
        async fn sorted_table_sql(
            &self,
            _: &dyn Executor,
            _: &str,
            _: &[String],
        ) -> Result<Vec<SqlContent>> {
            Ok(vec![])
        }
        async fn ensure_database(&self, _: &dyn Executor, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_halves_independently() {
        let mut registry = DialectRegistry::new();
        registry.register("x", DialectPlugin::with_transformer(MockTransformer("x")));
        assert!(registry.transformer("x").is_some());
        assert!(registry.catalog("x").is_none());

        // Registering the other half keeps the first one.
        registry.register("x", DialectPlugin::with_catalog(MockCatalog("x")));
        assert!(registry.transformer("x").is_some());
        assert!(registry.catalog("x").is_some());
    }

    #[test]
    fn test_last_write_wins_per_half() {
        let mut registry = DialectRegistry::new();
        registry.register("x", DialectPlugin::with_transformer(MockTransformer("old")));
        registry.register("x", DialectPlugin::with_transformer(MockTransformer("new")));
        assert_eq!(registry.transformer("x").unwrap().dialect(), "new");
    }

    #[test]
    fn test_require_unknown_dialect_errors() {
        let registry = DialectRegistry::new();
        let err = registry.require_transformer("nope").err();
        assert!(matches!(
            err,
            Some(BridgeError::UnsupportedDialect(name)) if name == "nope"
        ));
        assert!(registry.require_catalog("nope").is_err());
    }

    #[test]
    fn test_builtins_registered() {
        let registry = DialectRegistry::with_builtins();
        assert!(registry.transformer("mysql").is_some());
        assert!(registry.catalog("mysql").is_some());
        assert!(registry.transformer("postgres").is_some());
        assert!(registry.catalog("postgres").is_some());
    }
}
