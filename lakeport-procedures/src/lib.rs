pub mod action;
pub mod compact;
pub mod doc;
pub mod error;
pub mod parameter;
pub mod procedure;
pub mod resolver;
pub mod rollback;

#[cfg(test)]
mod test_util;

pub use doc::ProcedureDoc;
pub use error::ProcedureError;
pub use parameter::{CallArgument, ProcedureParameter};
pub use procedure::{
    load_registered_procedure, procedure_builder, procedure_names, Procedure,
    ProcedureArguments, ProcedureBuilder, ProcedureCatalog, ProcedureIdentifier,
};
pub use resolver::resolve_arguments;
