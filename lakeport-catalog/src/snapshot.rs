use std::{fmt::Display, sync::Arc};

use arrow::array::RecordBatch;

use crate::error::{CatalogError, Result};

/// What produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommitKind {
    Append,
    Compact,
    Overwrite,
}

impl Display for CommitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitKind::Append => write!(f, "APPEND"),
            CommitKind::Compact => write!(f, "COMPACT"),
            CommitKind::Overwrite => write!(f, "OVERWRITE"),
        }
    }
}

/// An immutable version of a table's data.
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: u64,
    schema_id: u64,
    commit_kind: CommitKind,
    time_millis: i64,
    batches: Arc<Vec<RecordBatch>>,
}

impl Snapshot {
    pub fn new(
        id: u64,
        schema_id: u64,
        commit_kind: CommitKind,
        time_millis: i64,
        batches: Arc<Vec<RecordBatch>>,
    ) -> Self {
        Self {
            id,
            schema_id,
            commit_kind,
            time_millis,
            batches,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn schema_id(&self) -> u64 {
        self.schema_id
    }

    pub fn commit_kind(&self) -> CommitKind {
        self.commit_kind
    }

    pub fn time_millis(&self) -> i64 {
        self.time_millis
    }

    pub fn batches(&self) -> &Arc<Vec<RecordBatch>> {
        &self.batches
    }

    pub fn record_count(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }
}

/// A snapshot id or a tag name, as accepted by rollback and time travel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Version {
    Snapshot(u64),
    Tag(String),
}

impl Version {
    /// All-digit strings are snapshot ids, anything else is a tag name.
    pub fn parse(version: &str) -> Result<Self> {
        if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Version::Tag(version.to_string()));
        }
        version
            .parse::<u64>()
            .map(Version::Snapshot)
            .map_err(|e| CatalogError::InvalidOption {
                key: "version".to_string(),
                message: format!("snapshot id {} is out of range: {}", version, e),
            })
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::Snapshot(id) => write!(f, "snapshot {}", id),
            Version::Tag(tag) => write!(f, "tag {}", tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        assert_eq!(Version::parse("42").unwrap(), Version::Snapshot(42));
        assert_eq!(
            Version::parse("v42").unwrap(),
            Version::Tag("v42".to_string())
        );
        assert_eq!(Version::parse("").unwrap(), Version::Tag(String::new()));
    }

    #[test]
    fn test_version_parse_out_of_range() {
        let error = Version::parse("99999999999999999999999").unwrap_err();
        assert!(matches!(
            error,
            CatalogError::InvalidOption { ref key, .. } if key == "version"
        ));
        assert_eq!(
            Version::parse(&u64::MAX.to_string()).unwrap(),
            Version::Snapshot(u64::MAX)
        );
    }
}
