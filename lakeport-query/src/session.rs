use std::sync::Arc;

use datafusion::{
    catalog::CatalogProvider,
    common::plan_datafusion_err,
    dataframe::DataFrame,
    error::{DataFusionError, Result},
    prelude::{SessionConfig, SessionContext},
    sql::{
        parser::{DFParser, Statement as DFStatement},
        sqlparser::{
            ast::{Function, Statement as SQLStatement},
            dialect::dialect_from_str,
        },
    },
};
use lakeport_catalog::Catalog;
use lakeport_datafusion::LakeCatalogProvider;

use crate::{analyzer::analyze_call, call::CallStatement, util::result_batch};

/// A DataFusion session that also understands `CALL` statements against
/// registered lake catalogs.
#[derive(Clone)]
pub struct LakeSession {
    session_ctx: Arc<SessionContext>,
}

impl std::fmt::Debug for LakeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LakeSession")
            .field("session_id", &self.session_ctx.session_id())
            .finish()
    }
}

impl Default for LakeSession {
    fn default() -> Self {
        Self::new(SessionConfig::new())
    }
}

impl LakeSession {
    pub fn new(config: SessionConfig) -> Self {
        let config = config.with_information_schema(true);
        Self {
            session_ctx: Arc::new(SessionContext::new_with_config(config)),
        }
    }

    pub fn session_ctx(&self) -> &Arc<SessionContext> {
        &self.session_ctx
    }

    pub fn default_catalog(&self) -> String {
        self.session_ctx
            .state()
            .config()
            .options()
            .catalog
            .default_catalog
            .clone()
    }

    pub fn register_catalog(
        &self,
        name: &str,
        catalog: Arc<dyn CatalogProvider>,
    ) -> Option<Arc<dyn CatalogProvider>> {
        self.session_ctx.register_catalog(name, catalog)
    }

    /// Registers `catalog` under `name` as a [`LakeCatalogProvider`].
    pub fn register_lake_catalog(
        &self,
        name: &str,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Arc<LakeCatalogProvider>> {
        let provider = Arc::new(LakeCatalogProvider::new(name, catalog)?);
        self.register_catalog(name, provider.clone());
        tracing::debug!("Registered lake catalog {}", name);
        Ok(provider)
    }

    /// Splits `sql` into statements using the session's dialect.
    pub fn parse_statements(&self, sql: &str) -> Result<Vec<DFStatement>> {
        let dialect_name = self
            .session_ctx
            .state()
            .config()
            .options()
            .sql_parser
            .dialect
            .clone();
        let dialect = dialect_from_str(&dialect_name)
            .ok_or_else(|| plan_datafusion_err!("Unsupported SQL dialect: {dialect_name}"))?;
        Ok(DFParser::parse_sql_with_dialect(sql, dialect.as_ref())?
            .into_iter()
            .collect())
    }

    /// Runs a single statement.
    pub async fn sql(&self, sql: &str) -> Result<DataFrame> {
        let state = self.session_ctx.state();
        let dialect = state.config().options().sql_parser.dialect.clone();
        let statement = state.sql_to_statement(sql, &dialect)?;
        self.execute_statement(statement).await
    }

    pub async fn execute_statement(&self, statement: DFStatement) -> Result<DataFrame> {
        if let DFStatement::Statement(inner) = &statement {
            if let SQLStatement::Call(function) = inner.as_ref() {
                return self.call(function).await;
            }
        }
        let plan = self.session_ctx.state().statement_to_plan(statement).await?;
        self.session_ctx.execute_logical_plan(plan).await
    }

    async fn call(&self, function: &Function) -> Result<DataFrame> {
        let call = CallStatement::try_new(function, &self.default_catalog())?;
        let resolved = analyze_call(&self.session_ctx.state(), call)?;
        let rows = tokio::task::spawn_blocking(move || resolved.execute())
            .await
            .map_err(|e| DataFusionError::External(Box::new(e)))??;
        self.session_ctx.read_batch(result_batch(rows)?)
    }

    /// Names of the procedures `CALL` can reach.
    pub fn list_procedures(&self) -> Vec<String> {
        lakeport_procedures::procedure_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{AsArray, Int32Array, RecordBatch, StringArray},
        datatypes::{DataType, Int32Type, UInt64Type},
    };
    use lakeport_catalog::{Identifier, MemoryCatalog, Options, TableSchema};

    use super::*;

    fn lake_catalog(values: &[i32]) -> Arc<MemoryCatalog> {
        let catalog = Arc::new(MemoryCatalog::new("memory://session", Options::new()));
        let identifier = Identifier::new("db", "t");
        catalog.create_database("db", false).unwrap();
        let schema = TableSchema::builder()
            .column("a", DataType::Int32, true, None)
            .column("dt", DataType::Utf8, true, None)
            .partition_keys(vec!["dt".to_string()])
            .build()
            .unwrap();
        catalog.create_table(&identifier, schema, false).unwrap();
        for value in values {
            let batch = RecordBatch::try_new(
                catalog.get_table(&identifier).unwrap().schema().arrow_schema(),
                vec![
                    Arc::new(Int32Array::from(vec![*value])),
                    Arc::new(StringArray::from(vec!["2024-01-01"])),
                ],
            )
            .unwrap();
            catalog.write(&identifier, vec![batch]).unwrap();
        }
        catalog
    }

    /// A session whose default catalog is the built-in memory catalog, with
    /// the lake registered as `lake`.
    fn session(values: &[i32]) -> LakeSession {
        let session = LakeSession::default();
        session
            .register_lake_catalog("lake", lake_catalog(values))
            .unwrap();
        session
    }

    async fn rows(session: &LakeSession, sql: &str) -> Result<Vec<String>> {
        let batches = session.sql(sql).await?.collect().await?;
        Ok(batches
            .iter()
            .flat_map(|batch| {
                batch
                    .column(0)
                    .as_string::<i32>()
                    .iter()
                    .map(|v| v.unwrap_or_default().to_string())
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    fn plan_error(result: Result<Vec<String>>) -> String {
        match result {
            Err(DataFusionError::Plan(message)) => message,
            other => panic!("expected a plan error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_compact_positional() {
        let session = session(&[1, 2]);
        let df = session
            .sql("CALL lake.sys.compact('db.t')")
            .await
            .unwrap();
        let schema = df.schema().as_arrow().clone();
        assert_eq!(schema.field(0).name(), "result");
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert!(!schema.field(0).is_nullable());

        let batches = df.collect().await.unwrap();
        assert_eq!(
            batches[0].column(0).as_string::<i32>().value(0),
            "Compact Job: snapshot 3"
        );

        let result = rows(
            &session,
            "CALL lake.sys.compact('db.t', 'dt=2024-01-01', 'zorder', 'a', 'sink.parallelism=2')",
        )
        .await
        .unwrap();
        assert_eq!(result, vec!["Sort Compact Job: snapshot 4"]);
    }

    #[tokio::test]
    async fn test_call_named_arguments_in_any_order() {
        let session = session(&[1, 2, 3]);
        let result = rows(
            &session,
            "CALL lake.SYS.ROLLBACK_TO(Version => '1', TABLE => 'db.t')",
        )
        .await
        .unwrap();
        assert_eq!(result, vec!["Rolled back db.t to snapshot 1"]);

        let batches = session
            .sql("SELECT count(*) FROM lake.db.t")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        let count = batches[0]
            .column(0)
            .as_primitive::<arrow::datatypes::Int64Type>()
            .value(0);
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_call_uses_default_catalog() {
        let session = LakeSession::new(
            SessionConfig::new().with_default_catalog_and_schema("lake", "db"),
        );
        session
            .register_lake_catalog("lake", lake_catalog(&[1]))
            .unwrap();
        let result = rows(&session, "CALL sys.compact(table => 'db.t')")
            .await
            .unwrap();
        assert_eq!(result, vec!["Compact Job: snapshot 2"]);

        let batches = session
            .sql("SELECT a FROM t")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 1);
    }

    #[tokio::test]
    async fn test_call_argument_errors() {
        let session = session(&[1]);

        let message = plan_error(rows(&session, "CALL lake.sys.compact()").await);
        assert!(message.contains("Missing required parameter(s)"), "{message}");
        assert!(message.contains("table"), "{message}");

        let message = plan_error(
            rows(&session, "CALL lake.sys.compact('db.t', partitions => 'dt=1')").await,
        );
        assert!(message.contains("Named and positional arguments cannot be mixed"));

        let message = plan_error(
            rows(&session, "CALL lake.sys.compact(table => 'db.t', table => 'db.u')").await,
        );
        assert!(message.contains("Duplicate procedure argument(s)"));

        let message =
            plan_error(rows(&session, "CALL lake.sys.compact(table => 'db.t', foo => 1)").await);
        assert!(message.contains("Unknown argument(s)"));

        // An unknown name is reported even when its value cannot be planned.
        let message = plan_error(
            rows(
                &session,
                "CALL lake.sys.compact(table => 'db.t', foo => missing_column)",
            )
            .await,
        );
        assert!(message.contains("Unknown argument(s)"), "{message}");
        assert!(message.contains("foo"), "{message}");

        let message = plan_error(
            rows(&session, "CALL lake.sys.rollback_to('db.t', '1', 'extra')").await,
        );
        assert!(message.contains("Too many arguments"));

        let message = plan_error(
            rows(&session, "CALL lake.sys.compact('db.t', '', 'order', '')").await,
        );
        assert!(message.contains("You must specify 'order strategy' and 'order by columns' both."));
    }

    #[tokio::test]
    async fn test_call_resolution_errors() {
        let session = session(&[1]);

        let message = plan_error(rows(&session, "CALL lake.sys.nope('db.t')").await);
        assert_eq!(message, "Procedure sys.nope not found");

        let message = plan_error(rows(&session, "CALL lake.a.b.compact('db.t')").await);
        assert_eq!(message, "Procedure a.b.compact not found");

        let message = plan_error(rows(&session, "CALL sys.compact('db.t')").await);
        assert_eq!(message, "Catalog datafusion is not a ProcedureCatalog");

        let message = plan_error(rows(&session, "CALL missing.sys.compact('db.t')").await);
        assert_eq!(message, "Catalog missing not found");

        assert!(rows(&session, "CALL lake.sys.compact(a)").await.is_err());
        assert!(matches!(
            rows(&session, "CALL lake.sys.rollback_to('db.t', '42')").await,
            Err(DataFusionError::Execution(_))
        ));
    }

    async fn collect(session: &LakeSession, sql: &str) -> Vec<RecordBatch> {
        session.sql(sql).await.unwrap().collect().await.unwrap()
    }

    fn int_values(batches: &[RecordBatch]) -> Vec<i32> {
        batches
            .iter()
            .flat_map(|b| b.column(0).as_primitive::<Int32Type>().values().to_vec())
            .collect()
    }

    #[tokio::test]
    async fn test_sql_created_table_round_trip() {
        let session = session(&[]);
        collect(&session, "CREATE TABLE lake.default.events (a INT, b VARCHAR)").await;

        let inserted = collect(
            &session,
            "INSERT INTO lake.default.events VALUES (2, 'y'), (1, 'x')",
        )
        .await;
        assert_eq!(inserted[0].column(0).as_primitive::<UInt64Type>().value(0), 2);
        collect(&session, "INSERT INTO lake.default.events VALUES (3, 'z')").await;

        let result = rows(&session, "CALL lake.sys.compact('default.events')")
            .await
            .unwrap();
        assert_eq!(result, vec!["Compact Job: snapshot 3"]);

        let batches = collect(&session, "SELECT a FROM lake.default.events ORDER BY a").await;
        assert_eq!(int_values(&batches), vec![1, 2, 3]);

        collect(
            &session,
            "CREATE TABLE lake.default.copy AS SELECT a FROM lake.default.events WHERE a > 1",
        )
        .await;
        let batches = collect(&session, "SELECT a FROM lake.default.copy ORDER BY a").await;
        assert_eq!(int_values(&batches), vec![2, 3]);

        let result = rows(&session, "CALL lake.sys.rollback_to('default.events', '1')")
            .await
            .unwrap();
        assert_eq!(result, vec!["Rolled back default.events to snapshot 1"]);
        let batches = collect(&session, "SELECT a FROM lake.default.events ORDER BY a").await;
        assert_eq!(int_values(&batches), vec![1, 2]);

        assert!(session
            .sql("CREATE TABLE lake.default.events (a INT)")
            .await
            .is_err());
        collect(&session, "DROP TABLE lake.default.copy").await;
        assert!(session.sql("SELECT * FROM lake.default.copy").await.is_err());
    }

    #[tokio::test]
    async fn test_other_statements_and_helpers() {
        let session = session(&[]);
        let batches = session
            .sql("SELECT 1 AS one")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(batches[0].num_rows(), 1);

        let statements = session
            .parse_statements("SELECT 1; CALL lake.sys.compact('db.t');")
            .unwrap();
        assert_eq!(statements.len(), 2);
        let mut results = vec![];
        for statement in statements {
            results.push(session.execute_statement(statement).await.unwrap());
        }
        let batches = results.pop().unwrap().collect().await.unwrap();
        assert_eq!(
            batches[0].column(0).as_string::<i32>().value(0),
            "Compact Job: nothing to compact"
        );

        assert_eq!(session.list_procedures(), vec!["compact", "rollback_to"]);
        assert_eq!(session.default_catalog(), "datafusion");
    }
}
