use std::fmt::Display;

use crate::error::{CatalogError, Result};

/// Identifies a table as `database.object`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Identifier {
    database: String,
    object: String,
}

impl Identifier {
    pub fn new(database: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            object: object.into(),
        }
    }

    /// Parses a `database.table` string. Exactly one separator is accepted.
    pub fn from_string(full_name: &str) -> Result<Self> {
        let parts = full_name.split('.').collect::<Vec<_>>();
        match parts.as_slice() {
            [database, object] if !database.is_empty() && !object.is_empty() => {
                Ok(Self::new(*database, *object))
            }
            _ => Err(CatalogError::InvalidIdentifier(format!(
                "Cannot get splits from '{}' to get database and object",
                full_name
            ))),
        }
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub fn object_name(&self) -> &str {
        &self.object
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.object)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string() {
        let identifier = Identifier::from_string("db.orders").unwrap();
        assert_eq!(identifier.database_name(), "db");
        assert_eq!(identifier.object_name(), "orders");
        assert_eq!(identifier.full_name(), "db.orders");
    }

    #[test]
    fn test_from_string_rejects_bad_names() {
        assert!(Identifier::from_string("orders").is_err());
        assert!(Identifier::from_string("a.b.c").is_err());
        assert!(Identifier::from_string(".orders").is_err());
    }
}
