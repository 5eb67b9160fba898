use std::collections::HashMap;

use crate::error::{CatalogError, Result};

pub type Options = HashMap<String, String>;

pub const WAREHOUSE: &str = "warehouse";
pub const METASTORE: &str = "metastore";
pub const DEFAULT_DATABASE: &str = "default-database";

/// Time travel to a snapshot id.
pub const SCAN_SNAPSHOT_ID: &str = "scan.snapshot-id";
/// Time travel to the snapshot a tag points at.
pub const SCAN_TAG_NAME: &str = "scan.tag-name";
/// Time travel to the latest snapshot committed at or before this instant.
pub const SCAN_TIMESTAMP_MILLIS: &str = "scan.timestamp-millis";

pub const DEFAULT_DATABASE_NAME: &str = "default";
pub const DEFAULT_METASTORE: &str = "memory";

/// Parses `k1=v1,k2=v2` into a map. Blank input yields an empty map.
pub fn parse_comma_separated_key_values(input: &str) -> Result<Options> {
    let mut options = Options::new();
    for pair in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = parse_key_value(pair)?;
        options.insert(key, value);
    }
    Ok(options)
}

/// Parses a single `key=value` pair. The value may itself contain `=`.
pub fn parse_key_value(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(CatalogError::InvalidOption {
            key: pair.to_string(),
            message: "expected key=value".to_string(),
        }),
    }
}
