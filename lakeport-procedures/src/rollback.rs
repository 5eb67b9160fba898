use std::sync::Arc;

use arrow::datatypes::DataType;
use lakeport_catalog::{Catalog, Identifier, Version};

use crate::{
    error::Result,
    parameter::ProcedureParameter,
    procedure::{Procedure, ProcedureArguments, ProcedureBuilder},
};

pub const IDENTIFIER: &str = "rollback_to";

/// Rolls a table back to a snapshot id or a tag.
///
/// ```sql
/// CALL sys.rollback_to('db.orders', '10')
/// CALL sys.rollback_to(table => 'db.orders', version => 'release-1')
/// ```
#[derive(Debug)]
pub struct RollbackToProcedure {
    catalog: Arc<dyn Catalog>,
}

impl RollbackToProcedure {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }
}

impl Procedure for RollbackToProcedure {
    fn name(&self) -> &'static str {
        IDENTIFIER
    }

    fn description(&self) -> Option<String> {
        Some("Rolls a table back to a specific snapshot id or tag.".to_string())
    }

    fn parameters(&self) -> Vec<ProcedureParameter> {
        vec![
            ProcedureParameter::required("table", DataType::Utf8)
                .with_description("Table to roll back, as database.table"),
            ProcedureParameter::required("version", DataType::Utf8)
                .with_description("Snapshot id (digits only) or tag name"),
        ]
    }

    fn call(&self, args: &ProcedureArguments) -> Result<Vec<String>> {
        let identifier = Identifier::from_string(&args.required_string("table")?)?;
        let version = Version::parse(args.required_string("version")?.trim())?;
        self.catalog.rollback_to(&identifier, &version)?;
        Ok(vec![format!("Rolled back {} to {}", identifier, version)])
    }
}

pub struct RollbackToProcedureBuilder;

impl ProcedureBuilder for RollbackToProcedureBuilder {
    fn name(&self) -> &'static str {
        IDENTIFIER
    }

    fn build(&self, catalog: Arc<dyn Catalog>) -> Arc<dyn Procedure> {
        Arc::new(RollbackToProcedure::new(catalog))
    }
}

inventory::submit!(&RollbackToProcedureBuilder as &'static dyn ProcedureBuilder);
