use std::sync::Arc;

use arrow::datatypes::DataType;
use lakeport_catalog::{
    options::{parse_comma_separated_key_values, parse_key_value},
    Catalog, CompactRequest, Identifier, OrderStrategy, PartitionSpec, SortOrder,
};

use crate::{
    error::{ProcedureError, Result},
    parameter::ProcedureParameter,
    procedure::{Procedure, ProcedureArguments, ProcedureBuilder},
};

pub const IDENTIFIER: &str = "compact";

/// Compacts a table, optionally restricted to partitions and optionally sorting.
///
/// ```sql
/// CALL sys.compact('db.orders')
/// CALL sys.compact(table => 'db.orders', partitions => 'dt=2024-01-01;dt=2024-01-02')
/// CALL sys.compact('db.orders', 'ALL', 'zorder', 'a,b', 'sink.parallelism=4')
/// ```
#[derive(Debug)]
pub struct CompactProcedure {
    catalog: Arc<dyn Catalog>,
}

impl CompactProcedure {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }
}

impl Procedure for CompactProcedure {
    fn name(&self) -> &'static str {
        IDENTIFIER
    }

    fn description(&self) -> Option<String> {
        Some("Compacts the data files of a table or of some of its partitions.".to_string())
    }

    fn parameters(&self) -> Vec<ProcedureParameter> {
        vec![
            ProcedureParameter::required("table", DataType::Utf8)
                .with_description("Table to compact, as database.table"),
            ProcedureParameter::optional("partitions", DataType::Utf8)
                .with_description("';' separated partition specs such as 'dt=1,hh=0', or ALL"),
            ProcedureParameter::optional("order_strategy", DataType::Utf8)
                .with_description("Sort strategy: order, zorder or hilbert"),
            ProcedureParameter::optional("order_by", DataType::Utf8)
                .with_description("Comma separated columns to sort by"),
            ProcedureParameter::optional("options", DataType::Utf8)
                .with_description("Comma separated key=value table options for the job"),
        ]
    }

    fn call(&self, args: &ProcedureArguments) -> Result<Vec<String>> {
        let identifier = Identifier::from_string(&args.required_string("table")?)?;
        let request = compact_request(
            &args.string_or_empty("partitions")?,
            &args.string_or_empty("order_strategy")?,
            &args.string_or_empty("order_by")?,
            &args.string_or_empty("options")?,
        )?;
        let job_name = request.job_name();
        tracing::info!("Running {} on {}", job_name, identifier);
        match self.catalog.compact(&identifier, &request)? {
            Some(snapshot) => Ok(vec![format!("{}: snapshot {}", job_name, snapshot.id())]),
            None => Ok(vec![format!("{}: nothing to compact", job_name)]),
        }
    }
}

pub struct CompactProcedureBuilder;

impl ProcedureBuilder for CompactProcedureBuilder {
    fn name(&self) -> &'static str {
        IDENTIFIER
    }

    fn build(&self, catalog: Arc<dyn Catalog>) -> Arc<dyn Procedure> {
        Arc::new(CompactProcedure::new(catalog))
    }
}

inventory::submit!(&CompactProcedureBuilder as &'static dyn ProcedureBuilder);

/// Builds a compaction request from the string forms accepted by `CALL`.
pub fn compact_request(
    partitions: &str,
    order_strategy: &str,
    order_by: &str,
    table_options: &str,
) -> Result<CompactRequest> {
    let table_options = if table_options.trim().is_empty() {
        Default::default()
    } else {
        parse_comma_separated_key_values(table_options)?
    };

    let order = sort_order(order_strategy, order_by)?;

    let partitions = if partitions.trim().is_empty() || partitions.trim() == "ALL" {
        vec![]
    } else {
        parse_partitions(partitions.split(';'))?
    };

    Ok(CompactRequest {
        partitions,
        order,
        table_options,
    })
}

/// Both or neither of strategy and columns must be given.
pub fn sort_order(order_strategy: &str, order_by: &str) -> Result<Option<SortOrder>> {
    match (order_strategy.trim().is_empty(), order_by.trim().is_empty()) {
        (true, true) => Ok(None),
        (false, false) => Ok(Some(SortOrder {
            strategy: OrderStrategy::parse(order_strategy)?,
            columns: order_by
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        })),
        _ => Err(ProcedureError::invalid_argument(
            "order_strategy",
            "You must specify 'order strategy' and 'order by columns' both.",
        )),
    }
}

/// Parses partition specs, each a comma separated list of `key=value`.
pub fn parse_partitions<'a>(specs: impl IntoIterator<Item = &'a str>) -> Result<Vec<PartitionSpec>> {
    specs
        .into_iter()
        .map(str::trim)
        .filter(|spec| !spec.is_empty())
        .map(|spec| {
            spec.split(',')
                .map(|pair| parse_key_value(pair.trim()).map_err(ProcedureError::from))
                .collect::<Result<PartitionSpec>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use datafusion::scalar::ScalarValue;
    use lakeport_catalog::{options::Options, CommitKind, MemoryCatalog, TableSchema};

    use super::*;

    #[test]
    fn test_compact_request_plain() {
        let request = compact_request("", "", "", "").unwrap();
        assert_eq!(request, CompactRequest::default());
        assert_eq!(request.job_name(), "Compact Job");
        assert!(compact_request("ALL", "", "", "").unwrap().partitions.is_empty());
    }

    #[test]
    fn test_compact_request_partitions_and_order() {
        let request = compact_request(
            "dt=2024-01-01,hh=01; dt=2024-01-02,hh=02",
            "zorder",
            "a, b",
            "sink.parallelism=4",
        )
        .unwrap();
        assert_eq!(request.partitions.len(), 2);
        assert_eq!(request.partitions[0]["hh"], "01");
        assert_eq!(request.partitions[1]["dt"], "2024-01-02");
        let order = request.order.as_ref().unwrap();
        assert_eq!(order.strategy, OrderStrategy::ZOrder);
        assert_eq!(order.columns, vec!["a", "b"]);
        assert_eq!(request.table_options["sink.parallelism"], "4");
        assert_eq!(request.job_name(), "Sort Compact Job");
    }

    #[test]
    fn test_compact_request_requires_both_order_arguments() {
        let error = compact_request("", "order", "", "").unwrap_err();
        assert!(error
            .to_string()
            .contains("You must specify 'order strategy' and 'order by columns' both."));
        assert!(compact_request("", "", "a", "").is_err());
        assert!(compact_request("", "random", "a", "").is_err());
        assert!(compact_request("dt", "", "", "").is_err());
    }

    #[test]
    fn test_compact_procedure_commits_snapshot() {
        let catalog = Arc::new(MemoryCatalog::new("memory://test", Options::new()));
        catalog.create_database("db", false).unwrap();
        let identifier = Identifier::new("db", "t");
        let schema = TableSchema::builder()
            .column("a", DataType::Int32, true, None)
            .build()
            .unwrap();
        catalog.create_table(&identifier, schema, false).unwrap();
        let batch = arrow::array::RecordBatch::try_new(
            catalog.get_table(&identifier).unwrap().schema().arrow_schema(),
            vec![Arc::new(arrow::array::Int32Array::from(vec![1, 2]))],
        )
        .unwrap();
        catalog.write(&identifier, vec![batch]).unwrap();

        let procedure = CompactProcedure::new(catalog.clone());
        let args = ProcedureArguments::new(
            procedure.parameters(),
            vec![
                ScalarValue::from("db.t"),
                ScalarValue::Utf8(None),
                ScalarValue::Utf8(None),
                ScalarValue::Utf8(None),
                ScalarValue::Utf8(None),
            ],
        );
        let result = procedure.call(&args).unwrap();
        assert_eq!(result, vec!["Compact Job: snapshot 2"]);
        let table = catalog.get_table(&identifier).unwrap();
        assert_eq!(
            table.latest_snapshot().unwrap().commit_kind(),
            CommitKind::Compact
        );
    }
}
