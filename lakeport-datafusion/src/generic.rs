//! A catalog that serves lake tables next to the tables of an existing host
//! catalog sharing the same metastore.

use std::{any::Any, sync::Arc};

use datafusion::{
    catalog::{CatalogProvider, SchemaProvider, TableProvider},
    error::DataFusionError,
};
use indexmap::IndexSet;
use lakeport_catalog::{
    factory::create_catalog,
    options::{self, Options},
    CatalogContext,
};
use lakeport_procedures::{Procedure, ProcedureCatalog, ProcedureIdentifier};

use crate::{catalog_provider::LakeCatalogProvider, error::Result};

pub const IDENTIFIER: &str = "lakeport-generic";

/// The catalog being extended, plus where its metastore keeps data.
#[derive(Debug, Clone)]
pub struct HostCatalog {
    pub provider: Arc<dyn CatalogProvider>,
    pub warehouse: String,
    pub metastore: String,
}

pub struct GenericCatalogFactory;

impl GenericCatalogFactory {
    pub fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    /// Creates the lake side on the host's metastore and warehouse; both
    /// override anything given in `options`.
    pub fn create(
        &self,
        name: &str,
        mut options: Options,
        host: HostCatalog,
    ) -> Result<GenericCatalogProvider> {
        options.insert(options::WAREHOUSE.to_string(), host.warehouse.clone());
        options.insert(options::METASTORE.to_string(), host.metastore.clone());
        let catalog = create_catalog(&CatalogContext::new(options))?;
        let lake = LakeCatalogProvider::new(name, catalog)?;
        Ok(GenericCatalogProvider {
            lake,
            host: host.provider,
        })
    }
}

#[derive(Debug)]
pub struct GenericCatalogProvider {
    lake: LakeCatalogProvider,
    host: Arc<dyn CatalogProvider>,
}

impl GenericCatalogProvider {
    pub fn lake(&self) -> &LakeCatalogProvider {
        &self.lake
    }

    pub fn host(&self) -> &Arc<dyn CatalogProvider> {
        &self.host
    }
}

impl CatalogProvider for GenericCatalogProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema_names(&self) -> Vec<String> {
        self.lake
            .schema_names()
            .into_iter()
            .chain(self.host.schema_names())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    fn schema(&self, name: &str) -> Option<Arc<dyn SchemaProvider>> {
        match (self.lake.schema(name), self.host.schema(name)) {
            (Some(lake), Some(host)) => Some(Arc::new(GenericSchemaProvider { lake, host })),
            (lake, host) => lake.or(host),
        }
    }

    /// Registers on the host and creates the matching lake database.
    fn register_schema(
        &self,
        name: &str,
        schema: Arc<dyn SchemaProvider>,
    ) -> datafusion::error::Result<Option<Arc<dyn SchemaProvider>>> {
        let previous = self.schema(name);
        self.lake.register_schema(name, schema.clone())?;
        self.host.register_schema(name, schema)?;
        Ok(previous)
    }

    fn deregister_schema(
        &self,
        name: &str,
        cascade: bool,
    ) -> datafusion::error::Result<Option<Arc<dyn SchemaProvider>>> {
        let previous = self.schema(name);
        self.lake.deregister_schema(name, cascade)?;
        self.host.deregister_schema(name, cascade)?;
        Ok(previous)
    }
}

impl ProcedureCatalog for GenericCatalogProvider {
    fn load_procedure(
        &self,
        identifier: &ProcedureIdentifier,
    ) -> lakeport_procedures::error::Result<Arc<dyn Procedure>> {
        self.lake.load_procedure(identifier)
    }
}

/// Lake tables first, host tables for everything else.
#[derive(Debug)]
pub struct GenericSchemaProvider {
    lake: Arc<dyn SchemaProvider>,
    host: Arc<dyn SchemaProvider>,
}

#[async_trait::async_trait]
impl SchemaProvider for GenericSchemaProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn table_names(&self) -> Vec<String> {
        self.lake
            .table_names()
            .into_iter()
            .chain(self.host.table_names())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    async fn table(&self, name: &str) -> Result<Option<Arc<dyn TableProvider>>, DataFusionError> {
        match self.lake.table(name).await? {
            Some(table) => Ok(Some(table)),
            None => self.host.table(name).await,
        }
    }

    fn register_table(
        &self,
        name: String,
        table: Arc<dyn TableProvider>,
    ) -> datafusion::error::Result<Option<Arc<dyn TableProvider>>> {
        self.host.register_table(name, table)
    }

    fn deregister_table(
        &self,
        name: &str,
    ) -> datafusion::error::Result<Option<Arc<dyn TableProvider>>> {
        if self.lake.table_exist(name) {
            self.lake.deregister_table(name)
        } else {
            self.host.deregister_table(name)
        }
    }

    fn table_exist(&self, name: &str) -> bool {
        self.lake.table_exist(name) || self.host.table_exist(name)
    }
}
