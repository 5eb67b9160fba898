use datafusion::catalog::CatalogProvider;
use lakeport_procedures::{ProcedureCatalog, ProcedureError};

pub mod catalog_provider;
pub mod error;
pub mod generic;
pub mod schema_provider;
pub mod table_change;
pub mod table_provider;

pub use catalog_provider::{LakeCatalogProvider, TableIdent};
pub use error::BridgeError;
pub use generic::{GenericCatalogFactory, GenericCatalogProvider, HostCatalog};
pub use schema_provider::LakeSchemaProvider;
pub use table_change::{ColumnPosition, TableChange};
pub use table_provider::LakeTableProvider;

/// The procedure capability of a registered catalog, if it has one.
pub fn as_procedure_catalog(catalog: &dyn CatalogProvider) -> Option<&dyn ProcedureCatalog> {
    let any = catalog.as_any();
    if let Some(lake) = any.downcast_ref::<LakeCatalogProvider>() {
        return Some(lake);
    }
    if let Some(generic) = any.downcast_ref::<GenericCatalogProvider>() {
        return Some(generic);
    }
    None
}

/// Like [`as_procedure_catalog`], failing for catalogs without procedures.
pub fn require_procedure_catalog<'a>(
    name: &str,
    catalog: &'a dyn CatalogProvider,
) -> Result<&'a dyn ProcedureCatalog, ProcedureError> {
    as_procedure_catalog(catalog).ok_or_else(|| ProcedureError::NotProcedureCatalog(name.to_string()))
}
