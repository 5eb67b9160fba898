use datafusion::error::DataFusionError;
use lakeport_catalog::CatalogError;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Namespace {0} is not valid")]
    InvalidNamespace(String),
    #[error("Namespace {0} does not exist")]
    NoSuchNamespace(String),
    #[error("Namespace {0} already exists")]
    NamespaceAlreadyExists(String),
    #[error("Table {0} does not exist")]
    NoSuchTable(String),
    #[error("Table {0} already exists")]
    TableAlreadyExists(String),
    #[error("{0}")]
    Unsupported(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl BridgeError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        BridgeError::Unsupported(message.into())
    }
}

impl From<BridgeError> for DataFusionError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Unsupported(message) => DataFusionError::NotImplemented(message),
            BridgeError::Catalog(e) => DataFusionError::External(Box::new(e)),
            e => DataFusionError::Plan(e.to_string()),
        }
    }
}

/// Renders a namespace the way error messages show it: `[a, b]`.
pub fn display_namespace(namespace: &[String]) -> String {
    format!("[{}]", namespace.join(", "))
}
