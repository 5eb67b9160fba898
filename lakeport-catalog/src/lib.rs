pub mod catalog;
pub mod error;
pub mod factory;
pub mod identifier;
pub mod memory;
pub mod options;
pub mod schema;
pub mod snapshot;
pub mod table;

pub use catalog::{Catalog, CompactRequest, OrderStrategy, PartitionSpec, SortOrder};
pub use error::CatalogError;
pub use factory::{CatalogContext, CatalogFactory, CatalogLoader};
pub use identifier::Identifier;
pub use memory::MemoryCatalog;
pub use options::Options;
pub use schema::{Move, MoveKind, SchemaChange, TableSchema};
pub use snapshot::{CommitKind, Snapshot, Version};
pub use table::Table;
