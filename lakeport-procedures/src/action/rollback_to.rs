use lakeport_catalog::{CatalogLoader, Options, Version};

use super::{
    check_required, optional_config_map, table_path, Action, ActionFactory, MultipleParameters,
    TablePath,
};
use crate::error::Result;

pub const IDENTIFIER: &str = "rollback-to";

#[derive(Debug)]
pub struct RollbackToAction {
    path: TablePath,
    version: String,
    catalog_config: Options,
}

impl RollbackToAction {
    pub fn new(path: TablePath, version: impl Into<String>, catalog_config: Options) -> Self {
        Self {
            path,
            version: version.into(),
            catalog_config,
        }
    }
}

impl Action for RollbackToAction {
    fn run(&self, loader: &CatalogLoader) -> Result<()> {
        let catalog = loader.load(&self.path.catalog_context(&self.catalog_config))?;
        let version = Version::parse(self.version.trim())?;
        tracing::info!("Rolling back {} to {}", self.path.identifier, version);
        catalog.rollback_to(&self.path.identifier, &version)?;
        Ok(())
    }
}

pub struct RollbackToActionFactory;

impl ActionFactory for RollbackToActionFactory {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn create(&self, params: &MultipleParameters) -> Result<Option<Box<dyn Action>>> {
        if params.has("help") {
            return Ok(None);
        }
        let path = table_path(params)?;
        let version = check_required(params, "version")?;
        let catalog_config = optional_config_map(params, "catalog-conf")?;
        Ok(Some(Box::new(RollbackToAction::new(
            path,
            version,
            catalog_config,
        ))))
    }

    fn help(&self) -> String {
        [
            "Action \"rollback-to\" roll back a table to a specific snapshot ID or tag.",
            "",
            "Syntax:",
            "  rollback-to --warehouse <warehouse-path> --database <database-name> \
             --table <table-name> --version <version-string> \
             [--catalog-conf <key>=<value> [--catalog-conf <key>=<value> ...]]",
            "  'version-string' can be a long value representing a snapshot ID or a tag name.",
            "",
        ]
        .join("\n")
    }
}

inventory::submit!(&RollbackToActionFactory as &'static dyn ActionFactory);
