use std::sync::Arc;

use arrow::array::RecordBatch;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::{
    catalog::{Catalog, CompactRequest},
    error::{CatalogError, Result},
    options::Options,
    schema::{SchemaChange, TableSchema},
    snapshot::{CommitKind, Snapshot, Version},
    table::Table,
    Identifier,
};

#[derive(Debug, Clone)]
struct TableEntry {
    schema: TableSchema,
    snapshots: Vec<Snapshot>,
    tags: IndexMap<String, u64>,
}

impl TableEntry {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            snapshots: vec![],
            tags: IndexMap::new(),
        }
    }

    fn next_snapshot_id(&self) -> u64 {
        self.snapshots.last().map(|s| s.id() + 1).unwrap_or(1)
    }

    fn commit(&mut self, kind: CommitKind, batches: Arc<Vec<RecordBatch>>) -> Snapshot {
        let now = chrono::Utc::now().timestamp_millis();
        // Commit times never go backwards, even if the wall clock does.
        let time_millis = self
            .snapshots
            .last()
            .map(|s| s.time_millis().max(now))
            .unwrap_or(now);
        let snapshot = Snapshot::new(
            self.next_snapshot_id(),
            self.schema.id(),
            kind,
            time_millis,
            batches,
        );
        self.snapshots.push(snapshot.clone());
        snapshot
    }
}

type Databases = IndexMap<String, IndexMap<String, TableEntry>>;

/// A catalog that keeps all metadata and data in process memory.
#[derive(Debug)]
pub struct MemoryCatalog {
    warehouse: String,
    options: Options,
    databases: RwLock<Databases>,
}

impl MemoryCatalog {
    pub fn new(warehouse: impl Into<String>, options: Options) -> Self {
        Self {
            warehouse: warehouse.into(),
            options,
            databases: RwLock::new(IndexMap::new()),
        }
    }

    /// Tags a snapshot, or the latest snapshot when `snapshot_id` is `None`.
    pub fn create_tag(
        &self,
        identifier: &Identifier,
        tag: &str,
        snapshot_id: Option<u64>,
    ) -> Result<()> {
        self.with_table_mut(identifier, |entry| {
            if entry.tags.contains_key(tag) {
                return Err(CatalogError::TagAlreadyExists {
                    table: identifier.clone(),
                    tag: tag.to_string(),
                });
            }
            let snapshot_id = match snapshot_id {
                Some(id) if entry.snapshots.iter().any(|s| s.id() == id) => id,
                Some(id) => {
                    return Err(CatalogError::SnapshotNotExist {
                        table: identifier.clone(),
                        snapshot_id: id,
                    })
                }
                None => entry
                    .snapshots
                    .last()
                    .map(|s| s.id())
                    .ok_or_else(|| CatalogError::SnapshotNotExist {
                        table: identifier.clone(),
                        snapshot_id: 0,
                    })?,
            };
            entry.tags.insert(tag.to_string(), snapshot_id);
            Ok(())
        })
    }

    fn with_table_mut<T>(
        &self,
        identifier: &Identifier,
        f: impl FnOnce(&mut TableEntry) -> Result<T>,
    ) -> Result<T> {
        let mut databases = self.databases.write();
        let entry = databases
            .get_mut(identifier.database_name())
            .and_then(|tables| tables.get_mut(identifier.object_name()))
            .ok_or_else(|| CatalogError::TableNotExist(identifier.clone()))?;
        f(entry)
    }
}

impl Catalog for MemoryCatalog {
    fn warehouse(&self) -> &str {
        &self.warehouse
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn list_databases(&self) -> Vec<String> {
        self.databases.read().keys().cloned().collect()
    }

    fn database_exists(&self, database: &str) -> bool {
        self.databases.read().contains_key(database)
    }

    fn create_database(&self, database: &str, ignore_if_exists: bool) -> Result<()> {
        let mut databases = self.databases.write();
        if databases.contains_key(database) {
            if ignore_if_exists {
                return Ok(());
            }
            return Err(CatalogError::DatabaseAlreadyExists(database.to_string()));
        }
        tracing::debug!("Creating database {}", database);
        databases.insert(database.to_string(), IndexMap::new());
        Ok(())
    }

    fn drop_database(
        &self,
        database: &str,
        ignore_if_not_exists: bool,
        cascade: bool,
    ) -> Result<()> {
        let mut databases = self.databases.write();
        let is_empty = databases.get(database).map(|tables| tables.is_empty());
        match is_empty {
            None if ignore_if_not_exists => Ok(()),
            None => Err(CatalogError::DatabaseNotExist(database.to_string())),
            Some(false) if !cascade => Err(CatalogError::DatabaseNotEmpty(database.to_string())),
            Some(_) => {
                tracing::debug!("Dropping database {}", database);
                databases.shift_remove(database);
                Ok(())
            }
        }
    }

    fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        self.databases
            .read()
            .get(database)
            .map(|tables| tables.keys().cloned().collect())
            .ok_or_else(|| CatalogError::DatabaseNotExist(database.to_string()))
    }

    fn get_table(&self, identifier: &Identifier) -> Result<Table> {
        let databases = self.databases.read();
        let entry = databases
            .get(identifier.database_name())
            .and_then(|tables| tables.get(identifier.object_name()))
            .ok_or_else(|| CatalogError::TableNotExist(identifier.clone()))?;
        Ok(Table::new(
            identifier.clone(),
            entry.schema.clone(),
            entry.snapshots.clone(),
            entry.tags.clone(),
        ))
    }

    fn create_table(
        &self,
        identifier: &Identifier,
        schema: TableSchema,
        ignore_if_exists: bool,
    ) -> Result<()> {
        let mut databases = self.databases.write();
        let tables = databases
            .get_mut(identifier.database_name())
            .ok_or_else(|| {
                CatalogError::DatabaseNotExist(identifier.database_name().to_string())
            })?;
        if tables.contains_key(identifier.object_name()) {
            if ignore_if_exists {
                return Ok(());
            }
            return Err(CatalogError::TableAlreadyExists(identifier.clone()));
        }
        tracing::debug!("Creating table {}", identifier);
        tables.insert(identifier.object_name().to_string(), TableEntry::new(schema));
        Ok(())
    }

    fn drop_table(&self, identifier: &Identifier, ignore_if_not_exists: bool) -> Result<()> {
        let mut databases = self.databases.write();
        let removed = databases
            .get_mut(identifier.database_name())
            .and_then(|tables| tables.shift_remove(identifier.object_name()));
        match removed {
            Some(_) => {
                tracing::debug!("Dropped table {}", identifier);
                Ok(())
            }
            None if ignore_if_not_exists => Ok(()),
            None => Err(CatalogError::TableNotExist(identifier.clone())),
        }
    }

    fn rename_table(
        &self,
        from: &Identifier,
        to: &Identifier,
        ignore_if_not_exists: bool,
    ) -> Result<()> {
        let mut databases = self.databases.write();
        let exists = databases
            .get(from.database_name())
            .is_some_and(|tables| tables.contains_key(from.object_name()));
        if !exists {
            if ignore_if_not_exists {
                return Ok(());
            }
            return Err(CatalogError::TableNotExist(from.clone()));
        }
        match databases.get(to.database_name()) {
            None => {
                return Err(CatalogError::DatabaseNotExist(
                    to.database_name().to_string(),
                ))
            }
            Some(tables) if tables.contains_key(to.object_name()) => {
                return Err(CatalogError::TableAlreadyExists(to.clone()))
            }
            Some(_) => {}
        }
        let entry = databases
            .get_mut(from.database_name())
            .and_then(|tables| tables.shift_remove(from.object_name()))
            .ok_or_else(|| CatalogError::TableNotExist(from.clone()))?;
        databases
            .get_mut(to.database_name())
            .ok_or_else(|| CatalogError::DatabaseNotExist(to.database_name().to_string()))?
            .insert(to.object_name().to_string(), entry);
        tracing::debug!("Renamed table {} to {}", from, to);
        Ok(())
    }

    fn alter_table(
        &self,
        identifier: &Identifier,
        changes: &[SchemaChange],
        ignore_if_not_exists: bool,
    ) -> Result<()> {
        let result = self.with_table_mut(identifier, |entry| {
            entry.schema = entry.schema.apply_changes(identifier, changes)?;
            tracing::debug!(
                "Altered table {} to schema {} with {} change(s)",
                identifier,
                entry.schema.id(),
                changes.len()
            );
            Ok(())
        });
        match result {
            Err(CatalogError::TableNotExist(_)) if ignore_if_not_exists => Ok(()),
            other => other,
        }
    }

    fn compact(
        &self,
        identifier: &Identifier,
        request: &CompactRequest,
    ) -> Result<Option<Snapshot>> {
        self.with_table_mut(identifier, |entry| {
            for partition in &request.partitions {
                if let Some(key) = partition
                    .keys()
                    .find(|k| !entry.schema.partition_keys().contains(k))
                {
                    return Err(CatalogError::InvalidOption {
                        key: key.clone(),
                        message: format!("{} is not a partition key of {}", key, identifier),
                    });
                }
            }
            if let Some(order) = &request.order {
                if let Some(column) = order
                    .columns
                    .iter()
                    .find(|c| entry.schema.field(c).is_none())
                {
                    return Err(CatalogError::ColumnNotExist {
                        table: identifier.clone(),
                        column: column.clone(),
                    });
                }
            }
            // Data files are not rewritten here; the job only produces a new
            // snapshot over the same data.
            let Some(latest) = entry.snapshots.last() else {
                tracing::info!("Nothing to compact for empty table {}", identifier);
                return Ok(None);
            };
            let batches = Arc::clone(latest.batches());
            let snapshot = entry.commit(CommitKind::Compact, batches);
            tracing::info!(
                "{} committed snapshot {} for {}",
                request.job_name(),
                snapshot.id(),
                identifier
            );
            Ok(Some(snapshot))
        })
    }

    fn write(&self, identifier: &Identifier, batches: Vec<RecordBatch>) -> Result<Snapshot> {
        self.with_table_mut(identifier, |entry| {
            let schema = entry.schema.arrow_schema();
            let mut data = entry
                .snapshots
                .last()
                .map(|s| s.batches().as_ref().clone())
                .unwrap_or_default();
            for batch in batches {
                data.push(RecordBatch::try_new(
                    Arc::clone(&schema),
                    batch.columns().to_vec(),
                )?);
            }
            let snapshot = entry.commit(CommitKind::Append, Arc::new(data));
            tracing::debug!(
                "Committed snapshot {} to {} with {} records",
                snapshot.id(),
                identifier,
                snapshot.record_count()
            );
            Ok(snapshot)
        })
    }

    fn rollback_to(&self, identifier: &Identifier, version: &Version) -> Result<()> {
        self.with_table_mut(identifier, |entry| {
            let snapshot_id = match version {
                Version::Snapshot(id) => *id,
                Version::Tag(tag) => {
                    *entry
                        .tags
                        .get(tag)
                        .ok_or_else(|| CatalogError::TagNotExist {
                            table: identifier.clone(),
                            tag: tag.clone(),
                        })?
                }
            };
            if !entry.snapshots.iter().any(|s| s.id() == snapshot_id) {
                return Err(CatalogError::SnapshotNotExist {
                    table: identifier.clone(),
                    snapshot_id,
                });
            }
            entry.snapshots.retain(|s| s.id() <= snapshot_id);
            entry.tags.retain(|_, id| *id <= snapshot_id);
            tracing::info!("Rolled back {} to {}", identifier, version);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Int64Array, StringArray},
        datatypes::DataType,
    };

    use super::*;
    use crate::catalog::PartitionSpec;

    fn catalog_with_orders() -> (MemoryCatalog, Identifier) {
        let catalog = MemoryCatalog::new("memory://test", Options::new());
        catalog.create_database("db", false).unwrap();
        let identifier = Identifier::new("db", "orders");
        let schema = TableSchema::builder()
            .column("id", DataType::Int64, false, None)
            .column("dt", DataType::Utf8, true, None)
            .partition_keys(vec!["dt".to_string()])
            .build()
            .unwrap();
        catalog.create_table(&identifier, schema, false).unwrap();
        (catalog, identifier)
    }

    fn batch(catalog: &MemoryCatalog, identifier: &Identifier, ids: Vec<i64>) -> RecordBatch {
        let schema = catalog.get_table(identifier).unwrap().schema().arrow_schema();
        let dt = StringArray::from(vec!["2024-01-01"; ids.len()]);
        RecordBatch::try_new(
            schema,
            vec![Arc::new(Int64Array::from(ids)), Arc::new(dt)],
        )
        .unwrap()
    }

    fn row_count(table: &Table) -> usize {
        table.read().unwrap().iter().map(|b| b.num_rows()).sum()
    }

    #[test]
    fn test_database_lifecycle() {
        let (catalog, _) = catalog_with_orders();
        assert!(catalog.database_exists("db"));
        assert!(matches!(
            catalog.create_database("db", false),
            Err(CatalogError::DatabaseAlreadyExists(_))
        ));
        catalog.create_database("db", true).unwrap();
        assert!(matches!(
            catalog.drop_database("db", false, false),
            Err(CatalogError::DatabaseNotEmpty(_))
        ));
        catalog.drop_database("db", false, true).unwrap();
        assert!(catalog.list_databases().is_empty());
        catalog.drop_database("db", true, false).unwrap();
    }

    #[test]
    fn test_write_and_time_travel() {
        let (catalog, identifier) = catalog_with_orders();
        let first = catalog
            .write(&identifier, vec![batch(&catalog, &identifier, vec![1, 2])])
            .unwrap();
        catalog
            .write(&identifier, vec![batch(&catalog, &identifier, vec![3])])
            .unwrap();

        let table = catalog.get_table(&identifier).unwrap();
        assert_eq!(table.snapshots().len(), 2);
        assert_eq!(row_count(&table), 3);

        let travelled = table.copy(Options::from([(
            crate::options::SCAN_SNAPSHOT_ID.to_string(),
            first.id().to_string(),
        )]));
        assert_eq!(row_count(&travelled), 2);

        let too_early = table.copy(Options::from([(
            crate::options::SCAN_TIMESTAMP_MILLIS.to_string(),
            (first.time_millis() - 1).to_string(),
        )]));
        assert!(matches!(
            too_early.read(),
            Err(CatalogError::NoSnapshotBefore { .. })
        ));
    }

    #[test]
    fn test_rollback_to_snapshot_and_tag() {
        let (catalog, identifier) = catalog_with_orders();
        for id in 0..3 {
            catalog
                .write(&identifier, vec![batch(&catalog, &identifier, vec![id])])
                .unwrap();
            if id == 0 {
                catalog.create_tag(&identifier, "first", None).unwrap();
            }
        }
        catalog.create_tag(&identifier, "last", None).unwrap();

        catalog
            .rollback_to(&identifier, &Version::Snapshot(2))
            .unwrap();
        let table = catalog.get_table(&identifier).unwrap();
        assert_eq!(table.latest_snapshot().unwrap().id(), 2);
        assert!(!table.tags().contains_key("last"));

        catalog
            .rollback_to(&identifier, &Version::Tag("first".to_string()))
            .unwrap();
        let table = catalog.get_table(&identifier).unwrap();
        assert_eq!(row_count(&table), 1);

        assert!(matches!(
            catalog.rollback_to(&identifier, &Version::Snapshot(7)),
            Err(CatalogError::SnapshotNotExist { .. })
        ));
        assert!(matches!(
            catalog.rollback_to(&identifier, &Version::Tag("last".to_string())),
            Err(CatalogError::TagNotExist { .. })
        ));
    }

    #[test]
    fn test_compact_validates_request() {
        let (catalog, identifier) = catalog_with_orders();
        assert!(catalog
            .compact(&identifier, &CompactRequest::default())
            .unwrap()
            .is_none());

        catalog
            .write(&identifier, vec![batch(&catalog, &identifier, vec![1])])
            .unwrap();
        let snapshot = catalog
            .compact(&identifier, &CompactRequest::default())
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.commit_kind(), CommitKind::Compact);
        assert_eq!(snapshot.record_count(), 1);

        let bad_partition = CompactRequest {
            partitions: vec![PartitionSpec::from([("id".to_string(), "1".to_string())])],
            ..Default::default()
        };
        assert!(matches!(
            catalog.compact(&identifier, &bad_partition),
            Err(CatalogError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_rename_and_alter() {
        let (catalog, identifier) = catalog_with_orders();
        let renamed = Identifier::new("db", "orders_v2");
        catalog.rename_table(&identifier, &renamed, false).unwrap();
        assert!(!catalog.table_exists(&identifier));
        assert!(matches!(
            catalog.rename_table(&identifier, &renamed, false),
            Err(CatalogError::TableNotExist(_))
        ));

        catalog
            .alter_table(
                &renamed,
                &[SchemaChange::add_column("note", DataType::Utf8, true, None, None)],
                false,
            )
            .unwrap();
        catalog
            .alter_table(&identifier, &[SchemaChange::drop_column("note")], true)
            .unwrap();
        let table = catalog.get_table(&renamed).unwrap();
        assert_eq!(table.schema().arrow_schema().fields().len(), 3);
        assert_eq!(table.schema().id(), 1);
    }

    #[test]
    fn test_read_after_add_column_fills_nulls() {
        let (catalog, identifier) = catalog_with_orders();
        catalog
            .write(&identifier, vec![batch(&catalog, &identifier, vec![1, 2])])
            .unwrap();
        catalog
            .alter_table(
                &identifier,
                &[SchemaChange::add_column("note", DataType::Utf8, true, None, None)],
                false,
            )
            .unwrap();
        let batches = catalog.get_table(&identifier).unwrap().read().unwrap();
        assert_eq!(batches[0].num_columns(), 3);
        assert_eq!(batches[0].column(2).null_count(), 2);
    }
}
