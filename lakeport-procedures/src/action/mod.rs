//! Command line actions. An action is created from a `--key value` argument
//! list and runs against a catalog obtained through a [`CatalogLoader`].

use indexmap::IndexMap;
use lakeport_catalog::{
    options::{self, parse_key_value},
    CatalogContext, CatalogLoader, Identifier, Options,
};

use crate::error::{ProcedureError, Result};

pub mod compact;
pub mod rollback_to;

pub trait Action: std::fmt::Debug {
    fn run(&self, loader: &CatalogLoader) -> Result<()>;
}

pub trait ActionFactory: Send + Sync {
    fn identifier(&self) -> &'static str;

    /// Builds the action, or `None` when only help was requested.
    fn create(&self, params: &MultipleParameters) -> Result<Option<Box<dyn Action>>>;

    fn help(&self) -> String;
}

inventory::collect!(&'static dyn ActionFactory);

pub fn find(identifier: &str) -> Option<&'static dyn ActionFactory> {
    inventory::iter::<&'static dyn ActionFactory>
        .into_iter()
        .copied()
        .find(|factory| factory.identifier() == identifier)
}

pub fn identifiers() -> Vec<&'static str> {
    let mut identifiers = inventory::iter::<&'static dyn ActionFactory>
        .into_iter()
        .map(|factory| factory.identifier())
        .collect::<Vec<_>>();
    identifiers.sort_unstable();
    identifiers
}

/// Parsed `--key value` arguments. Keys may repeat; a key followed by another
/// key (or by nothing) is a flag without value.
#[derive(Debug, Clone, Default)]
pub struct MultipleParameters {
    values: IndexMap<String, Vec<String>>,
}

impl MultipleParameters {
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = args
            .into_iter()
            .map(|arg| arg.as_ref().to_string())
            .collect::<Vec<_>>();
        let mut values: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut i = 0;
        while i < args.len() {
            let key = parse_key(&args[i])?;
            let entry = values.entry(key.to_string()).or_default();
            match args.get(i + 1) {
                Some(value) if !is_key(value) => {
                    entry.push(value.clone());
                    i += 2;
                }
                _ => i += 1,
            }
        }
        Ok(Self { values })
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The single value of `key`. Repeated keys are an error here; use
    /// [`Self::get_all`] for those.
    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        match self.values.get(key).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([value]) => Ok(Some(value.as_str())),
            Some(_) => Err(ProcedureError::invalid_argument(
                key,
                "expected a single value but the key was given more than once",
            )),
        }
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.values
            .get(key)
            .map(|values| values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn is_key(arg: &str) -> bool {
    arg.starts_with("--") || (arg.starts_with('-') && arg.len() > 1 && arg.parse::<f64>().is_err())
}

fn parse_key(arg: &str) -> Result<&str> {
    let key = arg
        .strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ProcedureError::invalid_argument(arg, "expected a key starting with '-' or '--'")
        })?;
    Ok(key)
}

pub fn check_required(params: &MultipleParameters, key: &str) -> Result<String> {
    params
        .get(key)?
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProcedureError::MissingActionArgument(key.to_string()))
}

/// Where an action's table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePath {
    pub warehouse: String,
    pub identifier: Identifier,
}

impl TablePath {
    /// Catalog context for this warehouse, layered over the user's catalog
    /// configuration.
    pub fn catalog_context(&self, catalog_config: &Options) -> CatalogContext {
        let mut options = catalog_config.clone();
        options.insert(options::WAREHOUSE.to_string(), self.warehouse.clone());
        CatalogContext::new(options)
    }
}

pub fn table_path(params: &MultipleParameters) -> Result<TablePath> {
    let warehouse = check_required(params, "warehouse")?;
    let database = check_required(params, "database")?;
    let table = check_required(params, "table")?;
    Ok(TablePath {
        warehouse,
        identifier: Identifier::new(database, table),
    })
}

/// Collects every `key=value` given for `key`, later pairs winning.
pub fn optional_config_map(params: &MultipleParameters, key: &str) -> Result<Options> {
    params
        .get_all(key)
        .into_iter()
        .map(|pair| parse_key_value(pair).map_err(ProcedureError::from))
        .collect()
}
