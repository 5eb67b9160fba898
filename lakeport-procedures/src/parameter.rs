use arrow::datatypes::DataType;
use datafusion::prelude::Expr;

/// A declared procedure parameter. Position is the index in the procedure's
/// parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureParameter {
    name: String,
    data_type: DataType,
    required: bool,
    description: Option<String>,
}

impl ProcedureParameter {
    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: false,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// One argument of a `CALL` site, bound by position or by name.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgument {
    Positional(Expr),
    Named { name: String, value: Expr },
}

impl CallArgument {
    pub fn positional(value: Expr) -> Self {
        CallArgument::Positional(value)
    }

    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        CallArgument::Named {
            name: name.into(),
            value,
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, CallArgument::Named { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            CallArgument::Named { name, .. } => Some(name),
            CallArgument::Positional(_) => None,
        }
    }

    pub fn into_value(self) -> Expr {
        match self {
            CallArgument::Positional(value) | CallArgument::Named { value, .. } => value,
        }
    }
}
