use std::{any::Any, collections::HashMap, sync::Arc};

use arrow::array::RecordBatch;
use datafusion::{
    catalog::{SchemaProvider, TableProvider},
    common::not_impl_err,
    datasource::MemTable,
    error::DataFusionError,
    execution::session_state::SessionStateBuilder,
};
use futures::TryStreamExt;
use lakeport_catalog::{Catalog, CatalogError, Identifier};

use crate::{
    error::BridgeError, table_change::to_table_schema, table_provider::LakeTableProvider,
};

/// One lake database seen as a DataFusion schema.
#[derive(Debug)]
pub struct LakeSchemaProvider {
    catalog: Arc<dyn Catalog>,
    database: String,
}

impl LakeSchemaProvider {
    pub fn new(catalog: Arc<dyn Catalog>, database: impl Into<String>) -> Self {
        Self {
            catalog,
            database: database.into(),
        }
    }

    fn identifier(&self, name: &str) -> Identifier {
        Identifier::new(self.database.clone(), name)
    }

    fn provider(&self, table: lakeport_catalog::Table) -> Arc<dyn TableProvider> {
        Arc::new(LakeTableProvider::new(self.catalog.clone(), table))
    }
}

#[async_trait::async_trait]
impl SchemaProvider for LakeSchemaProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn table_names(&self) -> Vec<String> {
        self.catalog
            .list_tables(&self.database)
            .unwrap_or_default()
    }

    async fn table(&self, name: &str) -> Result<Option<Arc<dyn TableProvider>>, DataFusionError> {
        match self.catalog.get_table(&self.identifier(name)) {
            Ok(table) => Ok(Some(self.provider(table))),
            Err(CatalogError::TableNotExist(_)) => Ok(None),
            Err(e) => Err(DataFusionError::External(Box::new(e))),
        }
    }

    /// Creates a lake table with the schema of `table` and commits its rows,
    /// which is how `CREATE TABLE [AS SELECT]` reaches the lake.
    fn register_table(
        &self,
        name: String,
        table: Arc<dyn TableProvider>,
    ) -> datafusion::error::Result<Option<Arc<dyn TableProvider>>> {
        let Some(mem_table) = table.as_any().downcast_ref::<MemTable>() else {
            return not_impl_err!(
                "Only in-memory tables can be registered into lake database {}",
                self.database
            );
        };
        let identifier = self.identifier(&name);
        let schema = to_table_schema(&table.schema(), &[], &HashMap::new())?;
        self.catalog
            .create_table(&identifier, schema, false)
            .map_err(|e| match e {
                CatalogError::TableAlreadyExists(_) => {
                    BridgeError::TableAlreadyExists(identifier.to_string())
                }
                e => e.into(),
            })?;
        tracing::debug!("Created table {}", identifier);

        let batches = materialized_batches(mem_table)?;
        if batches.iter().any(|b| b.num_rows() > 0) {
            if let Err(e) = self.catalog.write(&identifier, batches) {
                self.catalog
                    .drop_table(&identifier, true)
                    .map_err(|e| DataFusionError::External(Box::new(e)))?;
                return Err(DataFusionError::External(Box::new(e)));
            }
        }
        Ok(None)
    }

    /// Drops the table from the lake.
    fn deregister_table(
        &self,
        name: &str,
    ) -> datafusion::error::Result<Option<Arc<dyn TableProvider>>> {
        let identifier = self.identifier(name);
        let table = match self.catalog.get_table(&identifier) {
            Ok(table) => table,
            Err(CatalogError::TableNotExist(_)) => return Ok(None),
            Err(e) => return Err(DataFusionError::External(Box::new(e))),
        };
        self.catalog
            .drop_table(&identifier, false)
            .map_err(|e| DataFusionError::External(Box::new(e)))?;
        tracing::debug!("Dropped table {}", identifier);
        Ok(Some(self.provider(table)))
    }

    fn table_exist(&self, name: &str) -> bool {
        self.catalog.table_exists(&self.identifier(name))
    }
}

/// Reads back the rows a `MemTable` holds.
fn materialized_batches(table: &MemTable) -> datafusion::error::Result<Vec<RecordBatch>> {
    let state = SessionStateBuilder::new().build();
    // The data is already in memory, so these futures complete without a runtime.
    futures::executor::block_on(async {
        let plan = table.scan(&state, None, &[], None).await?;
        let partitions = plan.properties().output_partitioning().partition_count();
        let mut batches = vec![];
        for partition in 0..partitions {
            let stream = plan.execute(partition, state.task_ctx())?;
            batches.extend(stream.try_collect::<Vec<_>>().await?);
        }
        Ok(batches)
    })
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::Int32Array,
        datatypes::{DataType, Field, Schema},
    };
    use lakeport_catalog::{MemoryCatalog, Options};

    use super::*;

    fn provider() -> (Arc<MemoryCatalog>, LakeSchemaProvider) {
        let catalog = Arc::new(MemoryCatalog::new("memory://schema", Options::new()));
        catalog.create_database("db", false).unwrap();
        let provider = LakeSchemaProvider::new(catalog.clone(), "db");
        (catalog, provider)
    }

    fn mem_table(values: Vec<i32>) -> Arc<MemTable> {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, true)]));
        let partitions = if values.is_empty() {
            vec![vec![]]
        } else {
            let batch =
                RecordBatch::try_new(schema.clone(), vec![Arc::new(Int32Array::from(values))])
                    .unwrap();
            vec![vec![batch]]
        };
        Arc::new(MemTable::try_new(schema, partitions).unwrap())
    }

    #[test]
    fn test_register_table_creates_lake_table() {
        let (catalog, provider) = provider();
        provider
            .register_table("empty".to_string(), mem_table(vec![]))
            .unwrap();
        let table = catalog.get_table(&Identifier::new("db", "empty")).unwrap();
        assert!(table.latest_snapshot().is_none());
        assert_eq!(table.schema().arrow_schema().field(0).name(), "a");

        provider
            .register_table("filled".to_string(), mem_table(vec![1, 2, 3]))
            .unwrap();
        let table = catalog.get_table(&Identifier::new("db", "filled")).unwrap();
        assert_eq!(table.latest_snapshot().unwrap().record_count(), 3);
        assert!(provider.table_exist("filled"));

        let error = provider
            .register_table("filled".to_string(), mem_table(vec![]))
            .unwrap_err();
        assert!(matches!(error, DataFusionError::Plan(_)));
    }

    #[tokio::test]
    async fn test_deregister_table_drops() {
        let (catalog, provider) = provider();
        provider
            .register_table("t".to_string(), mem_table(vec![1]))
            .unwrap();
        assert!(provider.table("t").await.unwrap().is_some());
        assert!(provider.deregister_table("t").unwrap().is_some());
        assert!(!catalog.table_exists(&Identifier::new("db", "t")));
        assert!(provider.table("t").await.unwrap().is_none());
        assert!(provider.deregister_table("t").unwrap().is_none());
    }
}
