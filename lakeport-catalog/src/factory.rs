use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::{CatalogError, Result},
    memory::MemoryCatalog,
    options::{self, Options},
    Catalog,
};

/// Options a catalog is created from.
#[derive(Debug, Clone, Default)]
pub struct CatalogContext {
    options: Options,
}

impl CatalogContext {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn warehouse(&self) -> Result<&str> {
        self.options
            .get(options::WAREHOUSE)
            .map(String::as_str)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| CatalogError::MissingOption(options::WAREHOUSE.to_string()))
    }

    pub fn metastore(&self) -> &str {
        self.options
            .get(options::METASTORE)
            .map(String::as_str)
            .unwrap_or(options::DEFAULT_METASTORE)
    }
}

/// Creates catalogs for one metastore kind. Implementations register
/// themselves with `inventory::submit!`.
pub trait CatalogFactory: Send + Sync {
    fn identifier(&self) -> &'static str;
    fn create(&self, context: &CatalogContext) -> Result<Arc<dyn Catalog>>;
}

inventory::collect!(&'static dyn CatalogFactory);

pub struct MemoryCatalogFactory;

impl CatalogFactory for MemoryCatalogFactory {
    fn identifier(&self) -> &'static str {
        options::DEFAULT_METASTORE
    }

    fn create(&self, context: &CatalogContext) -> Result<Arc<dyn Catalog>> {
        let warehouse = context.warehouse()?;
        Ok(Arc::new(MemoryCatalog::new(
            warehouse,
            context.options().clone(),
        )))
    }
}

inventory::submit!(&MemoryCatalogFactory as &'static dyn CatalogFactory);

pub fn find_factory(metastore: &str) -> Option<&'static dyn CatalogFactory> {
    inventory::iter::<&'static dyn CatalogFactory>
        .into_iter()
        .copied()
        .find(|factory| factory.identifier() == metastore)
}

/// Creates a new catalog through the factory registered for the context's metastore.
pub fn create_catalog(context: &CatalogContext) -> Result<Arc<dyn Catalog>> {
    let metastore = context.metastore();
    let factory = find_factory(metastore)
        .ok_or_else(|| CatalogError::UnknownMetastore(metastore.to_string()))?;
    tracing::debug!(
        "Creating {} catalog for warehouse {:?}",
        metastore,
        context.options().get(options::WAREHOUSE)
    );
    factory.create(context)
}

/// Hands out one catalog per `(metastore, warehouse)` pair.
///
/// Whoever runs actions or builds sessions owns the loader, so two users of
/// the same warehouse observe the same catalog.
#[derive(Debug, Default)]
pub struct CatalogLoader {
    catalogs: Mutex<HashMap<(String, String), Arc<dyn Catalog>>>,
}

impl CatalogLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, context: &CatalogContext) -> Result<Arc<dyn Catalog>> {
        let key = (
            context.metastore().to_string(),
            context.warehouse()?.to_string(),
        );
        let mut catalogs = self.catalogs.lock();
        if let Some(catalog) = catalogs.get(&key) {
            return Ok(Arc::clone(catalog));
        }
        let catalog = create_catalog(context)?;
        catalogs.insert(key, Arc::clone(&catalog));
        Ok(catalog)
    }

    /// Installs an already built catalog for the context's warehouse,
    /// replacing any loaded one.
    pub fn register(&self, context: &CatalogContext, catalog: Arc<dyn Catalog>) -> Result<()> {
        let key = (
            context.metastore().to_string(),
            context.warehouse()?.to_string(),
        );
        self.catalogs.lock().insert(key, catalog);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(warehouse: &str) -> CatalogContext {
        CatalogContext::new(Options::from([(
            options::WAREHOUSE.to_string(),
            warehouse.to_string(),
        )]))
    }

    #[test]
    fn test_memory_factory_is_registered() {
        assert!(find_factory("memory").is_some());
        assert!(find_factory("hive").is_none());
    }

    #[test]
    fn test_create_catalog_requires_warehouse() {
        assert!(matches!(
            create_catalog(&CatalogContext::default()),
            Err(CatalogError::MissingOption(_))
        ));
        let unknown = CatalogContext::new(Options::from([
            (options::WAREHOUSE.to_string(), "memory://w".to_string()),
            (options::METASTORE.to_string(), "hive".to_string()),
        ]));
        assert!(matches!(
            create_catalog(&unknown),
            Err(CatalogError::UnknownMetastore(_))
        ));
    }

    #[test]
    fn test_loader_reuses_catalogs() {
        let loader = CatalogLoader::new();
        let first = loader.load(&context("memory://a")).unwrap();
        first.create_database("db", false).unwrap();
        let again = loader.load(&context("memory://a")).unwrap();
        assert!(again.database_exists("db"));
        let other = loader.load(&context("memory://b")).unwrap();
        assert!(!other.database_exists("db"));
        assert_eq!(other.warehouse(), "memory://b");
    }
}
