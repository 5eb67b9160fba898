use std::io::Read;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use datafusion::prelude::SessionConfig;
use lakeport_catalog::{options, CatalogContext, CatalogLoader, Options};
use lakeport_config::CONFIG;
use lakeport_procedures::{
    action::{self, MultipleParameters},
    ProcedureDoc, ProcedureError,
};
use lakeport_query::LakeSession;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "lakeport", version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run SQL statements, including CALL, against the lake catalog
    Sql {
        #[arg(
            value_name = "SQL",
            short = 'e',
            long = "execute",
            help = "Statements to run, may be repeated"
        )]
        execute: Vec<String>,

        #[arg(
            value_name = "FILE",
            short,
            long,
            help = "Script file to run, may be repeated"
        )]
        file: Vec<String>,
    },
    /// Print the documentation of every registered procedure as JSON
    Procedures,
    /// Run a command line action such as rollback-to or compact. The action
    /// sees the tables created by the setup SQL when `--warehouse` names the
    /// configured warehouse.
    #[command(disable_help_flag = true)]
    Action {
        #[arg(
            value_name = "SQL",
            short = 'e',
            long = "execute",
            help = "Setup statements to run before the action, may be repeated"
        )]
        execute: Vec<String>,

        #[arg(
            value_name = "FILE",
            short,
            long,
            help = "Setup script file to run before the action, may be repeated"
        )]
        file: Vec<String>,

        #[arg(value_name = "ACTION", help = "Action to run, e.g. rollback-to")]
        name: String,

        #[arg(
            value_name = "ARGS",
            trailing_var_arg = true,
            allow_hyphen_values = true,
            help = "Action arguments as --key value pairs, --help for details"
        )]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let loader = CatalogLoader::new();
    match cli.command {
        Commands::Sql { execute, file } => {
            let session = session(&loader)?;
            let mut scripts = read_scripts(execute, &file)?;
            if scripts.is_empty() {
                let mut input = String::new();
                std::io::stdin()
                    .read_to_string(&mut input)
                    .context("Failed to read SQL from stdin")?;
                scripts.push(input);
            }
            for script in scripts {
                run_script(&session, &script).await?;
            }
        }
        Commands::Procedures => {
            let catalog = loader.load(&catalog_context())?;
            let docs = serde_json::json!({
                "namespace": CONFIG.system_namespace,
                "procedures": ProcedureDoc::registered(catalog),
            });
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
        Commands::Action {
            execute,
            file,
            name,
            args,
        } => {
            let scripts = read_scripts(execute, &file)?;
            if !scripts.is_empty() {
                let session = session(&loader)?;
                for script in scripts {
                    run_script(&session, &script).await?;
                }
            }
            run_action(&loader, &name, &args)?;
        }
    }
    Ok(())
}

fn setup_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => CONFIG.log_level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn catalog_context() -> CatalogContext {
    CatalogContext::new(Options::from([
        (options::WAREHOUSE.to_string(), CONFIG.warehouse.clone()),
        (options::METASTORE.to_string(), CONFIG.metastore.clone()),
        (
            options::DEFAULT_DATABASE.to_string(),
            CONFIG.default_database.clone(),
        ),
    ]))
}

fn session(loader: &CatalogLoader) -> anyhow::Result<LakeSession> {
    let catalog = loader.load(&catalog_context())?;
    let config = SessionConfig::new()
        .with_batch_size(CONFIG.batch_size)
        .with_default_catalog_and_schema(&CONFIG.catalog_name, &CONFIG.default_database);
    let session = LakeSession::new(config);
    session.register_lake_catalog(&CONFIG.catalog_name, catalog)?;
    tracing::info!(
        "Session ready with catalog {} over {}",
        CONFIG.catalog_name,
        CONFIG.warehouse
    );
    Ok(session)
}

/// Inline statements first, then the contents of each file.
fn read_scripts(mut scripts: Vec<String>, files: &[String]) -> anyhow::Result<Vec<String>> {
    for path in files {
        scripts.push(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read SQL file {}", path))?,
        );
    }
    Ok(scripts)
}

async fn run_script(session: &LakeSession, script: &str) -> anyhow::Result<()> {
    for statement in session.parse_statements(script)? {
        tracing::debug!("Executing {}", statement);
        let df = session.execute_statement(statement).await?;
        df.show().await?;
    }
    Ok(())
}

fn run_action(loader: &CatalogLoader, name: &str, args: &[String]) -> anyhow::Result<()> {
    let Some(factory) = action::find(name) else {
        let error = ProcedureError::NoSuchAction(name.to_string());
        anyhow::bail!("{}. Available actions: {}", error, action::identifiers().join(", "));
    };
    let params = MultipleParameters::from_args(args)?;
    match factory.create(&params)? {
        Some(action) => {
            tracing::info!("Running action {:?}", action);
            action.run(loader)?;
        }
        None => println!("{}", factory.help()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sql_command() {
        let cli = Cli::try_parse_from([
            "lakeport", "-v", "sql", "-e", "SELECT 1", "-e", "SELECT 2", "-f", "a.sql",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Sql { execute, file } => {
                assert_eq!(execute, vec!["SELECT 1", "SELECT 2"]);
                assert_eq!(file, vec!["a.sql"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_action_command() {
        let cli = Cli::try_parse_from([
            "lakeport",
            "action",
            "rollback-to",
            "--warehouse",
            "memory://w",
            "--version",
            "-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Action { name, args, .. } => {
                assert_eq!(name, "rollback-to");
                assert_eq!(args, vec!["--warehouse", "memory://w", "--version", "-1"]);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["lakeport", "action", "compact", "--help"]).unwrap();
        match cli.command {
            Commands::Action { args, .. } => assert_eq!(args, vec!["--help"]),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_action_setup() {
        let cli = Cli::try_parse_from([
            "lakeport",
            "action",
            "-e",
            "CREATE TABLE t (a INT)",
            "compact",
            "--table",
            "t",
        ])
        .unwrap();
        match cli.command {
            Commands::Action {
                execute,
                file,
                name,
                args,
            } => {
                assert_eq!(execute, vec!["CREATE TABLE t (a INT)"]);
                assert!(file.is_empty());
                assert_eq!(name, "compact");
                assert_eq!(args, vec!["--table", "t"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_action_sees_setup_tables() {
        let loader = CatalogLoader::new();
        let session = session(&loader).unwrap();
        run_script(
            &session,
            "CREATE TABLE orders (a INT); \
             INSERT INTO orders VALUES (1); \
             INSERT INTO orders VALUES (2);",
        )
        .await
        .unwrap();

        let args = [
            "--warehouse",
            CONFIG.warehouse.as_str(),
            "--database",
            CONFIG.default_database.as_str(),
            "--table",
            "orders",
            "--version",
            "1",
        ]
        .map(str::to_string);
        run_action(&loader, "rollback-to", &args).unwrap();

        let batches = session
            .sql("SELECT a FROM orders")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 1);
    }

    #[test]
    fn test_unknown_action() {
        let loader = CatalogLoader::new();
        let error = run_action(&loader, "nope", &[]).unwrap_err();
        assert!(error.to_string().starts_with("Action nope not found"));
    }

    #[tokio::test]
    async fn test_run_script() {
        let session = LakeSession::default();
        run_script(&session, "SELECT 1; SELECT 'a' AS b;").await.unwrap();
        assert!(run_script(&session, "SELEC 1").await.is_err());
    }
}
