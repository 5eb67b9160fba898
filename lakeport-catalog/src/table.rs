use std::sync::Arc;

use arrow::{
    array::{new_null_array, ArrayRef, RecordBatch},
    compute::cast,
};
use indexmap::IndexMap;

use crate::{
    error::{CatalogError, Result},
    options::{self, Options},
    schema::TableSchema,
    snapshot::Snapshot,
    Identifier,
};

/// A point-in-time view of a table handed out by a [`crate::Catalog`].
///
/// Dynamic options set through [`Table::copy`] select which snapshot is read
/// without touching the catalog.
#[derive(Debug, Clone)]
pub struct Table {
    identifier: Identifier,
    schema: TableSchema,
    snapshots: Vec<Snapshot>,
    tags: IndexMap<String, u64>,
    dynamic_options: Options,
}

impl Table {
    pub fn new(
        identifier: Identifier,
        schema: TableSchema,
        snapshots: Vec<Snapshot>,
        tags: IndexMap<String, u64>,
    ) -> Self {
        Self {
            identifier,
            schema,
            snapshots,
            tags,
            dynamic_options: Options::new(),
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn tags(&self) -> &IndexMap<String, u64> {
        &self.tags
    }

    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn snapshot(&self, snapshot_id: u64) -> Result<&Snapshot> {
        self.snapshots
            .iter()
            .find(|s| s.id() == snapshot_id)
            .ok_or_else(|| CatalogError::SnapshotNotExist {
                table: self.identifier.clone(),
                snapshot_id,
            })
    }

    pub fn tag(&self, tag: &str) -> Result<&Snapshot> {
        let snapshot_id = self
            .tags
            .get(tag)
            .ok_or_else(|| CatalogError::TagNotExist {
                table: self.identifier.clone(),
                tag: tag.to_string(),
            })?;
        self.snapshot(*snapshot_id)
    }

    /// Table options with dynamic options layered on top.
    pub fn options(&self) -> Options {
        let mut options = self.schema.options().clone();
        options.extend(self.dynamic_options.clone());
        options
    }

    /// Returns a copy of this table with extra dynamic options applied.
    pub fn copy(&self, dynamic_options: Options) -> Self {
        let mut table = self.clone();
        table.dynamic_options.extend(dynamic_options);
        table
    }

    /// The snapshot a scan would read, honoring the `scan.*` time travel options.
    pub fn scan_snapshot(&self) -> Result<Option<&Snapshot>> {
        let options = self.options();
        if let Some(snapshot_id) = options.get(options::SCAN_SNAPSHOT_ID) {
            let snapshot_id = snapshot_id
                .parse::<u64>()
                .map_err(|e| CatalogError::InvalidOption {
                    key: options::SCAN_SNAPSHOT_ID.to_string(),
                    message: e.to_string(),
                })?;
            return self.snapshot(snapshot_id).map(Some);
        }
        if let Some(tag) = options.get(options::SCAN_TAG_NAME) {
            return self.tag(tag).map(Some);
        }
        if let Some(timestamp) = options.get(options::SCAN_TIMESTAMP_MILLIS) {
            let timestamp_millis =
                timestamp
                    .parse::<i64>()
                    .map_err(|e| CatalogError::InvalidOption {
                        key: options::SCAN_TIMESTAMP_MILLIS.to_string(),
                        message: e.to_string(),
                    })?;
            return self
                .snapshots
                .iter()
                .rev()
                .find(|s| s.time_millis() <= timestamp_millis)
                .map(Some)
                .ok_or_else(|| CatalogError::NoSnapshotBefore {
                    table: self.identifier.clone(),
                    timestamp_millis,
                });
        }
        Ok(self.latest_snapshot())
    }

    /// Reads the batches of the scanned snapshot, aligned to the current schema
    /// by column name. Columns added after a batch was written read as nulls.
    pub fn read(&self) -> Result<Vec<RecordBatch>> {
        let Some(snapshot) = self.scan_snapshot()? else {
            return Ok(vec![]);
        };
        let schema = self.schema.arrow_schema();
        snapshot
            .batches()
            .iter()
            .map(|batch| {
                if batch.schema() == schema {
                    return Ok(batch.clone());
                }
                let columns = schema
                    .fields()
                    .iter()
                    .map(|field| match batch.column_by_name(field.name()) {
                        Some(column) if column.data_type() == field.data_type() => {
                            Ok(column.clone())
                        }
                        Some(column) => Ok(cast(column, field.data_type())?),
                        None => Ok(new_null_array(field.data_type(), batch.num_rows())),
                    })
                    .collect::<Result<Vec<ArrayRef>>>()?;
                Ok(RecordBatch::try_new(Arc::clone(&schema), columns)?)
            })
            .collect()
    }
}
