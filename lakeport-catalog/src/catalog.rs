use std::fmt::{Debug, Display};

use arrow::array::RecordBatch;

use crate::{
    error::{CatalogError, Result},
    options::Options,
    schema::{SchemaChange, TableSchema},
    snapshot::{Snapshot, Version},
    table::Table,
    Identifier,
};

/// The storage engine's metadata registry.
///
/// Query engine integrations only ever talk to the storage engine through this
/// trait, so every method is synchronous and returns owned values.
pub trait Catalog: Debug + Send + Sync {
    /// Location all tables of this catalog live under.
    fn warehouse(&self) -> &str;

    /// Options the catalog was created with.
    fn options(&self) -> &Options;

    fn list_databases(&self) -> Vec<String>;

    fn database_exists(&self, database: &str) -> bool {
        self.list_databases().iter().any(|d| d == database)
    }

    fn create_database(&self, database: &str, ignore_if_exists: bool) -> Result<()>;

    fn drop_database(&self, database: &str, ignore_if_not_exists: bool, cascade: bool)
        -> Result<()>;

    fn list_tables(&self, database: &str) -> Result<Vec<String>>;

    fn table_exists(&self, identifier: &Identifier) -> bool {
        self.get_table(identifier).is_ok()
    }

    fn get_table(&self, identifier: &Identifier) -> Result<Table>;

    fn create_table(
        &self,
        identifier: &Identifier,
        schema: TableSchema,
        ignore_if_exists: bool,
    ) -> Result<()>;

    fn drop_table(&self, identifier: &Identifier, ignore_if_not_exists: bool) -> Result<()>;

    fn rename_table(
        &self,
        from: &Identifier,
        to: &Identifier,
        ignore_if_not_exists: bool,
    ) -> Result<()>;

    fn alter_table(
        &self,
        identifier: &Identifier,
        changes: &[SchemaChange],
        ignore_if_not_exists: bool,
    ) -> Result<()>;

    /// Appends `batches` to the table as a new snapshot.
    fn write(&self, identifier: &Identifier, batches: Vec<RecordBatch>) -> Result<Snapshot>;

    /// Commits a compaction of the requested partitions and returns the new
    /// snapshot, or `None` when the table has no data to compact.
    fn compact(&self, identifier: &Identifier, request: &CompactRequest)
        -> Result<Option<Snapshot>>;

    /// Moves the table's latest snapshot back to `version`, discarding newer snapshots.
    fn rollback_to(&self, identifier: &Identifier, version: &Version) -> Result<()>;
}

/// Partition spec: column name to value.
pub type PartitionSpec = indexmap::IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStrategy {
    Order,
    ZOrder,
    Hilbert,
}

impl OrderStrategy {
    pub fn parse(strategy: &str) -> Result<Self> {
        match strategy.trim().to_ascii_lowercase().as_str() {
            "order" => Ok(OrderStrategy::Order),
            "zorder" => Ok(OrderStrategy::ZOrder),
            "hilbert" => Ok(OrderStrategy::Hilbert),
            other => Err(CatalogError::InvalidOption {
                key: "order-strategy".to_string(),
                message: format!(
                    "unknown sort strategy '{}', expected one of order, zorder, hilbert",
                    other
                ),
            }),
        }
    }
}

impl Display for OrderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStrategy::Order => write!(f, "order"),
            OrderStrategy::ZOrder => write!(f, "zorder"),
            OrderStrategy::Hilbert => write!(f, "hilbert"),
        }
    }
}

/// Sort compaction: rewrite data files ordered by `columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub strategy: OrderStrategy,
    pub columns: Vec<String>,
}

/// Everything a compaction job needs to know. An empty partition list
/// compacts the whole table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactRequest {
    pub partitions: Vec<PartitionSpec>,
    pub order: Option<SortOrder>,
    pub table_options: Options,
}

impl CompactRequest {
    pub fn job_name(&self) -> &'static str {
        if self.order.is_some() {
            "Sort Compact Job"
        } else {
            "Compact Job"
        }
    }
}
