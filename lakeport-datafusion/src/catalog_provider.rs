use std::{any::Any, collections::HashMap, fmt::Display, sync::Arc};

use arrow::datatypes::Schema;
use datafusion::{
    catalog::{CatalogProvider, SchemaProvider},
    error::DataFusionError,
};
use lakeport_catalog::{
    options::{self, Options},
    Catalog, CatalogError, Identifier, SchemaChange, Table, Version,
};
use lakeport_procedures::{
    load_registered_procedure, Procedure, ProcedureCatalog, ProcedureIdentifier,
};

use crate::{
    error::{display_namespace, BridgeError, Result},
    schema_provider::LakeSchemaProvider,
    table_change::{to_schema_change, to_table_schema, TableChange},
};

/// A table reference as the host engine passes it: namespace parts plus name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdent {
    pub namespace: Vec<String>,
    pub name: String,
}

impl TableIdent {
    pub fn new(namespace: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    pub fn of(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(vec![database.into()], name)
    }
}

impl Display for TableIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in &self.namespace {
            write!(f, "{}.", part)?;
        }
        write!(f, "{}", self.name)
    }
}

/// DataFusion catalog backed by a lake [`Catalog`]. Lake databases are the
/// catalog's schemas; namespaces always have exactly one part.
#[derive(Debug)]
pub struct LakeCatalogProvider {
    name: String,
    catalog: Arc<dyn Catalog>,
    default_database: String,
}

impl LakeCatalogProvider {
    /// Wraps `catalog`, creating its default database when missing.
    pub fn new(name: impl Into<String>, catalog: Arc<dyn Catalog>) -> Result<Self> {
        let default_database = catalog
            .options()
            .get(options::DEFAULT_DATABASE)
            .cloned()
            .unwrap_or_else(|| options::DEFAULT_DATABASE_NAME.to_string());
        catalog.create_database(&default_database, true)?;
        Ok(Self {
            name: name.into(),
            catalog,
            default_database,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn default_namespace(&self) -> Vec<String> {
        vec![self.default_database.clone()]
    }

    pub fn list_namespaces(&self) -> Vec<Vec<String>> {
        self.catalog
            .list_databases()
            .into_iter()
            .map(|database| vec![database])
            .collect()
    }

    /// Namespaces below `namespace`. Databases have no children, so this is
    /// empty for any existing database.
    pub fn list_sub_namespaces(&self, namespace: &[String]) -> Result<Vec<Vec<String>>> {
        if namespace.is_empty() {
            return Ok(self.list_namespaces());
        }
        match namespace {
            [database] if self.catalog.database_exists(database) => Ok(vec![]),
            _ => Err(BridgeError::NoSuchNamespace(display_namespace(namespace))),
        }
    }

    pub fn load_namespace_metadata(&self, namespace: &[String]) -> Result<HashMap<String, String>> {
        let database = validate_namespace(namespace)?;
        if self.catalog.database_exists(database) {
            Ok(HashMap::new())
        } else {
            Err(BridgeError::NoSuchNamespace(display_namespace(namespace)))
        }
    }

    pub fn create_namespace(
        &self,
        namespace: &[String],
        _metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let database = validate_namespace(namespace)?;
        self.catalog
            .create_database(database, false)
            .map_err(|e| match e {
                CatalogError::DatabaseAlreadyExists(_) => {
                    BridgeError::NamespaceAlreadyExists(display_namespace(namespace))
                }
                e => e.into(),
            })
    }

    pub fn drop_namespace(&self, namespace: &[String], cascade: bool) -> Result<bool> {
        let database = validate_namespace(namespace)?;
        match self.catalog.drop_database(database, false, cascade) {
            Ok(()) => Ok(true),
            Err(CatalogError::DatabaseNotExist(_)) => {
                Err(BridgeError::NoSuchNamespace(display_namespace(namespace)))
            }
            Err(CatalogError::DatabaseNotEmpty(_)) => Err(BridgeError::unsupported(format!(
                "Namespace {} is not empty",
                display_namespace(namespace)
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn alter_namespace(&self, _namespace: &[String], _changes: &Options) -> Result<()> {
        Err(BridgeError::unsupported("Alter namespace is not supported yet."))
    }

    pub fn list_tables(&self, namespace: &[String]) -> Result<Vec<TableIdent>> {
        let database = validate_namespace(namespace)?;
        match self.catalog.list_tables(database) {
            Ok(tables) => Ok(tables
                .into_iter()
                .map(|table| TableIdent::new(namespace.to_vec(), table))
                .collect()),
            Err(CatalogError::DatabaseNotExist(_)) => {
                Err(BridgeError::NoSuchNamespace(display_namespace(namespace)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn load_table(&self, ident: &TableIdent) -> Result<Table> {
        let identifier = to_identifier(ident)?;
        self.catalog.get_table(&identifier).map_err(|e| match e {
            CatalogError::TableNotExist(_) => BridgeError::NoSuchTable(ident.to_string()),
            e => e.into(),
        })
    }

    /// Time travel to a snapshot id (all digits) or a tag.
    pub fn load_table_at_version(&self, ident: &TableIdent, version: &str) -> Result<Table> {
        let table = self.load_table(ident)?;
        let dynamic_options = match Version::parse(version)? {
            Version::Snapshot(snapshot_id) => {
                tracing::info!("Time travel to snapshot '{}'.", snapshot_id);
                Options::from([(
                    options::SCAN_SNAPSHOT_ID.to_string(),
                    snapshot_id.to_string(),
                )])
            }
            Version::Tag(tag) => {
                tracing::info!("Time travel to tag '{}'.", tag);
                Options::from([(options::SCAN_TAG_NAME.to_string(), tag)])
            }
        };
        Ok(table.copy(dynamic_options))
    }

    /// Time travel to a point in time given in microseconds.
    pub fn load_table_at_timestamp(&self, ident: &TableIdent, timestamp_micros: i64) -> Result<Table> {
        let table = self.load_table(ident)?;
        let timestamp_millis = timestamp_micros / 1000;
        tracing::info!(
            "Time travel target timestamp is {} milliseconds.",
            timestamp_millis
        );
        Ok(table.copy(Options::from([(
            options::SCAN_TIMESTAMP_MILLIS.to_string(),
            timestamp_millis.to_string(),
        )])))
    }

    pub fn table_exists(&self, ident: &TableIdent) -> bool {
        to_identifier(ident)
            .map(|identifier| self.catalog.table_exists(&identifier))
            .unwrap_or(false)
    }

    pub fn create_table(
        &self,
        ident: &TableIdent,
        schema: &Schema,
        partition_keys: &[String],
        properties: &HashMap<String, String>,
    ) -> Result<Table> {
        let identifier = to_identifier(ident)?;
        let table_schema = to_table_schema(schema, partition_keys, properties)?;
        self.catalog
            .create_table(&identifier, table_schema, false)
            .map_err(|e| match e {
                CatalogError::TableAlreadyExists(_) => {
                    BridgeError::TableAlreadyExists(ident.to_string())
                }
                CatalogError::DatabaseNotExist(_) => {
                    BridgeError::NoSuchNamespace(display_namespace(&ident.namespace))
                }
                e => e.into(),
            })?;
        self.load_table(ident)
    }

    /// Returns false when the table does not exist.
    pub fn drop_table(&self, ident: &TableIdent) -> Result<bool> {
        let Ok(identifier) = to_identifier(ident) else {
            return Ok(false);
        };
        match self.catalog.drop_table(&identifier, false) {
            Ok(()) => Ok(true),
            Err(CatalogError::TableNotExist(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn rename_table(&self, from: &TableIdent, to: &TableIdent) -> Result<()> {
        let source = to_identifier(from)?;
        let target = to_identifier(to)?;
        self.catalog
            .rename_table(&source, &target, false)
            .map_err(|e| match e {
                CatalogError::TableNotExist(_) => BridgeError::NoSuchTable(from.to_string()),
                CatalogError::TableAlreadyExists(_) => {
                    BridgeError::TableAlreadyExists(to.to_string())
                }
                e => e.into(),
            })
    }

    pub fn alter_table(&self, ident: &TableIdent, changes: &[TableChange]) -> Result<Table> {
        let identifier = to_identifier(ident)?;
        let schema_changes = changes
            .iter()
            .map(to_schema_change)
            .collect::<Result<Vec<SchemaChange>>>()?;
        self.catalog
            .alter_table(&identifier, &schema_changes, false)
            .map_err(|e| match e {
                CatalogError::TableNotExist(_) => BridgeError::NoSuchTable(ident.to_string()),
                e => e.into(),
            })?;
        self.load_table(ident)
    }

    fn schema_provider(&self, database: &str) -> Arc<dyn SchemaProvider> {
        Arc::new(LakeSchemaProvider::new(self.catalog.clone(), database))
    }
}

fn validate_namespace(namespace: &[String]) -> Result<&str> {
    match namespace {
        [database] => Ok(database.as_str()),
        _ => Err(BridgeError::InvalidNamespace(display_namespace(namespace))),
    }
}

fn to_identifier(ident: &TableIdent) -> Result<Identifier> {
    match ident.namespace.as_slice() {
        [database] => Ok(Identifier::new(database.clone(), ident.name.clone())),
        _ => Err(BridgeError::NoSuchTable(ident.to_string())),
    }
}

impl CatalogProvider for LakeCatalogProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema_names(&self) -> Vec<String> {
        self.catalog.list_databases()
    }

    fn schema(&self, name: &str) -> Option<Arc<dyn SchemaProvider>> {
        self.catalog
            .database_exists(name)
            .then(|| self.schema_provider(name))
    }

    /// Creates the database. The passed provider only names it; tables are
    /// always served from the lake.
    fn register_schema(
        &self,
        name: &str,
        _schema: Arc<dyn SchemaProvider>,
    ) -> datafusion::error::Result<Option<Arc<dyn SchemaProvider>>> {
        let previous = self.schema(name);
        self.catalog
            .create_database(name, true)
            .map_err(|e| DataFusionError::External(Box::new(e)))?;
        Ok(previous)
    }

    fn deregister_schema(
        &self,
        name: &str,
        cascade: bool,
    ) -> datafusion::error::Result<Option<Arc<dyn SchemaProvider>>> {
        let Some(previous) = self.schema(name) else {
            return Ok(None);
        };
        self.drop_namespace(&[name.to_string()], cascade)?;
        Ok(Some(previous))
    }
}

impl ProcedureCatalog for LakeCatalogProvider {
    fn load_procedure(
        &self,
        identifier: &ProcedureIdentifier,
    ) -> lakeport_procedures::error::Result<Arc<dyn Procedure>> {
        load_registered_procedure(self.catalog.clone(), identifier)
    }
}
