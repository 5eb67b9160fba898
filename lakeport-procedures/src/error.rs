use datafusion::error::DataFusionError;
use lakeport_catalog::CatalogError;

pub type Result<T, E = ProcedureError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ProcedureError {
    #[error("Parameter names {0:?} are duplicated in the procedure definition")]
    DuplicateParameterName(Vec<String>),
    #[error("Optional parameter {optional} must be declared after all required parameters, but required parameter {required} follows it")]
    ParameterOrderingViolation { optional: String, required: String },
    #[error("Named and positional arguments cannot be mixed")]
    MixedArgumentStyle,
    #[error("Duplicate procedure argument(s): {0:?}")]
    DuplicateArgument(Vec<String>),
    #[error("Unknown argument(s): {0:?}")]
    UnknownArgument(Vec<String>),
    #[error("Too many arguments for procedure: expected at most {expected}, got {actual}")]
    TooManyArguments { expected: usize, actual: usize },
    #[error("Missing required parameter(s): {0:?}")]
    MissingRequiredArgument(Vec<String>),
    #[error("Procedure {0} not found")]
    NoSuchProcedure(String),
    #[error("Catalog {0} is not a ProcedureCatalog")]
    NotProcedureCatalog(String),
    #[error("Action {0} not found")]
    NoSuchAction(String),
    #[error("Argument '{0}' is required. Run '<action> --help' for help.")]
    MissingActionArgument(String),
    #[error("Invalid value for argument {name}: {message}")]
    InvalidArgument { name: String, message: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    DataFusion(#[from] DataFusionError),
}

impl ProcedureError {
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        ProcedureError::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Errors a caller can fix by changing the `CALL` statement, as opposed to
    /// failures raised while the procedure body runs.
    pub fn is_analysis_error(&self) -> bool {
        !matches!(
            self,
            ProcedureError::Catalog(_) | ProcedureError::DataFusion(_)
        )
    }
}

impl From<ProcedureError> for DataFusionError {
    fn from(error: ProcedureError) -> Self {
        match error {
            ProcedureError::DataFusion(e) => e,
            e if e.is_analysis_error() => DataFusionError::Plan(e.to_string()),
            e => DataFusionError::Execution(e.to_string()),
        }
    }
}
