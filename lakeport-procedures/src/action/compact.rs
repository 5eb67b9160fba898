use lakeport_catalog::{CatalogLoader, CompactRequest, Options, PartitionSpec, SortOrder};

use super::{optional_config_map, table_path, Action, ActionFactory, MultipleParameters, TablePath};
use crate::{
    compact::{parse_partitions, sort_order},
    error::Result,
};

pub const IDENTIFIER: &str = "compact";

#[derive(Debug)]
pub struct CompactAction {
    path: TablePath,
    partitions: Vec<PartitionSpec>,
    order: Option<SortOrder>,
    table_config: Options,
    catalog_config: Options,
}

impl Action for CompactAction {
    fn run(&self, loader: &CatalogLoader) -> Result<()> {
        let catalog = loader.load(&self.path.catalog_context(&self.catalog_config))?;
        let request = CompactRequest {
            partitions: self.partitions.clone(),
            order: self.order.clone(),
            table_options: self.table_config.clone(),
        };
        tracing::info!("Running {} on {}", request.job_name(), self.path.identifier);
        match catalog.compact(&self.path.identifier, &request)? {
            Some(snapshot) => tracing::info!("Committed snapshot {}", snapshot.id()),
            None => tracing::info!("Nothing to compact"),
        }
        Ok(())
    }
}

pub struct CompactActionFactory;

impl ActionFactory for CompactActionFactory {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn create(&self, params: &MultipleParameters) -> Result<Option<Box<dyn Action>>> {
        if params.has("help") {
            return Ok(None);
        }
        let path = table_path(params)?;
        let partitions = parse_partitions(params.get_all("partition"))?;
        let order = sort_order(
            params.get("order-strategy")?.unwrap_or_default(),
            params.get("order-by")?.unwrap_or_default(),
        )?;
        Ok(Some(Box::new(CompactAction {
            path,
            partitions,
            order,
            table_config: optional_config_map(params, "table-conf")?,
            catalog_config: optional_config_map(params, "catalog-conf")?,
        })))
    }

    fn help(&self) -> String {
        [
            "Action \"compact\" runs a dedicated job for compacting specified table.",
            "",
            "Syntax:",
            "  compact --warehouse <warehouse-path> --database <database-name> \
             --table <table-name> [--partition <partition-name>] \
             [--order-strategy <order-strategy>] [--order-by <order-columns>] \
             [--table-conf <key>=<value>] [--catalog-conf <key>=<value>]",
            "",
            "Partition name syntax:",
            "  key1=value1,key2=value2,...",
            "",
            "Order strategies: order, zorder, hilbert. --order-strategy and --order-by",
            "must be given together; --order-by takes comma separated column names.",
            "",
            "Examples:",
            "  compact --warehouse memory://warehouse --database test_db --table test_table",
            "  compact --warehouse memory://warehouse --database test_db --table test_table \
             --partition dt=20221126,hh=08 --partition dt=20221127,hh=09",
            "  compact --warehouse memory://warehouse --database test_db --table test_table \
             --order-strategy zorder --order-by a,b",
            "",
        ]
        .join("\n")
    }
}

inventory::submit!(&CompactActionFactory as &'static dyn ActionFactory);
