use std::{any::Any, sync::Arc};

use arrow::{array::RecordBatch, datatypes::SchemaRef};
use datafusion::{
    catalog::{Session, TableProvider},
    common::{not_impl_err, plan_err, SchemaExt},
    datasource::{MemTable, TableType},
    error::DataFusionError,
    execution::{SendableRecordBatchStream, TaskContext},
    logical_expr::{dml::InsertOp, TableProviderFilterPushDown},
    physical_plan::{
        insert::{DataSink, DataSinkExec},
        metrics::MetricsSet,
        DisplayAs, DisplayFormatType, ExecutionPlan,
    },
    prelude::Expr,
};
use futures::TryStreamExt;
use lakeport_catalog::{Catalog, Identifier, Table};

/// Exposes a lake table to DataFusion. Scans read the snapshot selected by the
/// table's time travel options; inserts append a new snapshot.
#[derive(Debug)]
pub struct LakeTableProvider {
    catalog: Arc<dyn Catalog>,
    table: Table,
    schema: SchemaRef,
}

impl LakeTableProvider {
    pub fn new(catalog: Arc<dyn Catalog>, table: Table) -> Self {
        let schema = table.schema().arrow_schema();
        Self {
            catalog,
            table,
            schema,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

#[async_trait::async_trait]
impl TableProvider for LakeTableProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    async fn scan(
        &self,
        state: &dyn Session,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> datafusion::error::Result<Arc<dyn ExecutionPlan>> {
        let batches = self
            .table
            .read()
            .map_err(|e| DataFusionError::External(Box::new(e)))?;
        tracing::debug!(
            "Scanning {} ({} batches)",
            self.table.identifier(),
            batches.len()
        );
        let mem_table = MemTable::try_new(self.schema.clone(), vec![batches])?;
        mem_table.scan(state, projection, filters, limit).await
    }

    fn supports_filters_pushdown(
        &self,
        filters: &[&Expr],
    ) -> datafusion::error::Result<Vec<TableProviderFilterPushDown>> {
        Ok(vec![TableProviderFilterPushDown::Unsupported; filters.len()])
    }

    async fn insert_into(
        &self,
        _state: &dyn Session,
        input: Arc<dyn ExecutionPlan>,
        insert_op: InsertOp,
    ) -> datafusion::error::Result<Arc<dyn ExecutionPlan>> {
        if insert_op != InsertOp::Append {
            return not_impl_err!("{insert_op} is not supported for lake tables");
        }
        if !self
            .schema
            .logically_equivalent_names_and_types(&input.schema())
        {
            return plan_err!(
                "Inserted data does not match the schema of {}",
                self.table.identifier()
            );
        }
        let sink = Arc::new(LakeSink {
            catalog: self.catalog.clone(),
            identifier: self.table.identifier().clone(),
        });
        Ok(Arc::new(DataSinkExec::new(
            input,
            sink,
            self.schema.clone(),
            None,
        )))
    }
}

/// Commits everything written in one statement as a single append snapshot.
#[derive(Debug)]
struct LakeSink {
    catalog: Arc<dyn Catalog>,
    identifier: Identifier,
}

impl DisplayAs for LakeSink {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LakeSink({})", self.identifier)
    }
}

#[async_trait::async_trait]
impl DataSink for LakeSink {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics(&self) -> Option<MetricsSet> {
        None
    }

    async fn write_all(
        &self,
        data: SendableRecordBatchStream,
        _context: &Arc<TaskContext>,
    ) -> datafusion::error::Result<u64> {
        let batches = data.try_collect::<Vec<RecordBatch>>().await?;
        let row_count = batches.iter().map(|b| b.num_rows()).sum::<usize>();
        if row_count == 0 {
            return Ok(0);
        }
        let snapshot = self
            .catalog
            .write(&self.identifier, batches)
            .map_err(|e| DataFusionError::External(Box::new(e)))?;
        tracing::info!(
            "Inserted {} rows into {} as snapshot {}",
            row_count,
            self.identifier,
            snapshot.id()
        );
        Ok(row_count as u64)
    }
}
