use arrow::error::ArrowError;

use crate::Identifier;

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Database {0} already exists.")]
    DatabaseAlreadyExists(String),
    #[error("Database {0} does not exist.")]
    DatabaseNotExist(String),
    #[error("Database {0} is not empty.")]
    DatabaseNotEmpty(String),
    #[error("Table {0} already exists.")]
    TableAlreadyExists(Identifier),
    #[error("Table {0} does not exist.")]
    TableNotExist(Identifier),
    #[error("Column {column} already exists in table {table}.")]
    ColumnAlreadyExists { table: Identifier, column: String },
    #[error("Column {column} does not exist in table {table}.")]
    ColumnNotExist { table: Identifier, column: String },
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("Snapshot {snapshot_id} does not exist in table {table}.")]
    SnapshotNotExist { table: Identifier, snapshot_id: u64 },
    #[error("Tag {tag} does not exist in table {table}.")]
    TagNotExist { table: Identifier, tag: String },
    #[error("Tag {tag} already exists in table {table}.")]
    TagAlreadyExists { table: Identifier, tag: String },
    #[error("No snapshot of table {table} was committed at or before {timestamp_millis} ms.")]
    NoSnapshotBefore {
        table: Identifier,
        timestamp_millis: i64,
    },
    #[error("Invalid option {key}: {message}")]
    InvalidOption { key: String, message: String },
    #[error("Missing required option: {0}")]
    MissingOption(String),
    #[error("No catalog factory registered for metastore {0}")]
    UnknownMetastore(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}
