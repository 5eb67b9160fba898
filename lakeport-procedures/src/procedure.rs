use std::{fmt::Display, sync::Arc};

use datafusion::scalar::ScalarValue;
use lakeport_catalog::Catalog;

use crate::{
    error::{ProcedureError, Result},
    parameter::ProcedureParameter,
};

/// A stored procedure invocable through `CALL`.
pub trait Procedure: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> Option<String> {
        None
    }

    /// Declared parameters; required parameters come first.
    fn parameters(&self) -> Vec<ProcedureParameter>;

    /// Runs the procedure on resolved, constant arguments and returns one
    /// message per result row.
    fn call(&self, args: &ProcedureArguments) -> Result<Vec<String>>;
}

/// Binds a [`Procedure`] to the catalog it operates on.
pub trait ProcedureBuilder: Send + Sync {
    fn name(&self) -> &'static str;
    fn build(&self, catalog: Arc<dyn Catalog>) -> Arc<dyn Procedure>;
}

inventory::collect!(&'static dyn ProcedureBuilder);

pub fn procedure_builder(name: &str) -> Option<&'static dyn ProcedureBuilder> {
    inventory::iter::<&'static dyn ProcedureBuilder>
        .into_iter()
        .copied()
        .find(|builder| builder.name().eq_ignore_ascii_case(name))
}

pub fn procedure_names() -> Vec<&'static str> {
    let mut names = inventory::iter::<&'static dyn ProcedureBuilder>
        .into_iter()
        .map(|builder| builder.name())
        .collect::<Vec<_>>();
    names.sort_unstable();
    names
}

/// A procedure reference: namespace parts plus the procedure name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureIdentifier {
    pub namespace: Vec<String>,
    pub name: String,
}

impl ProcedureIdentifier {
    pub fn new(namespace: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

impl Display for ProcedureIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in &self.namespace {
            write!(f, "{}.", part)?;
        }
        write!(f, "{}", self.name)
    }
}

/// Catalogs that can hand out procedures.
pub trait ProcedureCatalog: Send + Sync {
    fn load_procedure(&self, identifier: &ProcedureIdentifier) -> Result<Arc<dyn Procedure>>;
}

/// Loads a registered procedure for a catalog whose namespaces are single-part.
pub fn load_registered_procedure(
    catalog: Arc<dyn Catalog>,
    identifier: &ProcedureIdentifier,
) -> Result<Arc<dyn Procedure>> {
    if identifier.namespace.len() == 1 {
        if let Some(builder) = procedure_builder(&identifier.name) {
            return Ok(builder.build(catalog));
        }
    }
    Err(ProcedureError::NoSuchProcedure(identifier.to_string()))
}

/// Resolved constant arguments, addressable by parameter name.
#[derive(Debug, Clone)]
pub struct ProcedureArguments {
    parameters: Vec<ProcedureParameter>,
    values: Vec<ScalarValue>,
}

impl ProcedureArguments {
    pub fn new(parameters: Vec<ProcedureParameter>, values: Vec<ScalarValue>) -> Self {
        Self { parameters, values }
    }

    pub fn value(&self, name: &str) -> Option<&ScalarValue> {
        self.parameters
            .iter()
            .position(|p| p.name().eq_ignore_ascii_case(name))
            .and_then(|position| self.values.get(position))
    }

    /// The string value of an argument; null or absent reads as `None`.
    pub fn string(&self, name: &str) -> Result<Option<String>> {
        match self.value(name) {
            None => Ok(None),
            Some(
                ScalarValue::Utf8(value)
                | ScalarValue::LargeUtf8(value)
                | ScalarValue::Utf8View(value),
            ) => Ok(value.clone()),
            Some(value) if value.is_null() => Ok(None),
            Some(value) => Err(ProcedureError::invalid_argument(
                name,
                format!("expected a string, got {}", value.data_type()),
            )),
        }
    }

    /// Like [`Self::string`] but null and blank strings read as empty.
    pub fn string_or_empty(&self, name: &str) -> Result<String> {
        Ok(self.string(name)?.unwrap_or_default())
    }

    pub fn required_string(&self, name: &str) -> Result<String> {
        self.string(name)?
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ProcedureError::invalid_argument(name, "must not be null or empty"))
    }
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::DataType;

    use super::*;

    #[test]
    fn test_arguments_access() {
        let arguments = ProcedureArguments::new(
            vec![
                ProcedureParameter::required("table", DataType::Utf8),
                ProcedureParameter::optional("partitions", DataType::Utf8),
                ProcedureParameter::optional("limit", DataType::Int64),
            ],
            vec![
                ScalarValue::from("db.t"),
                ScalarValue::Utf8(None),
                ScalarValue::Int64(Some(3)),
            ],
        );
        assert_eq!(arguments.required_string("TABLE").unwrap(), "db.t");
        assert_eq!(arguments.string("partitions").unwrap(), None);
        assert_eq!(arguments.string_or_empty("partitions").unwrap(), "");
        assert!(arguments.required_string("partitions").is_err());
        assert!(arguments.string("limit").is_err());
        assert_eq!(arguments.string("missing").unwrap(), None);
    }

    #[test]
    fn test_identifier_display() {
        let identifier = ProcedureIdentifier::new(vec!["sys".to_string()], "compact");
        assert_eq!(identifier.to_string(), "sys.compact");
    }
}
