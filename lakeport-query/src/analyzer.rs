use std::sync::Arc;

use datafusion::{
    common::{plan_datafusion_err, DFSchema},
    error::Result,
    execution::session_state::SessionState,
    prelude::{lit, Expr},
    scalar::ScalarValue,
};
use lakeport_datafusion::require_procedure_catalog;
use lakeport_procedures::{resolve_arguments, CallArgument, Procedure, ProcedureArguments};

use crate::{call::CallStatement, util::evaluate_constant};

/// A `CALL` ready to run: the loaded procedure and its constant arguments.
#[derive(Debug)]
pub struct ResolvedCall {
    pub procedure: Arc<dyn Procedure>,
    pub arguments: ProcedureArguments,
}

impl ResolvedCall {
    pub fn execute(&self) -> Result<Vec<String>> {
        tracing::info!("Calling procedure {}", self.procedure.name());
        Ok(self.procedure.call(&self.arguments)?)
    }
}

/// Loads the procedure a `CALL` names and binds its arguments.
pub fn analyze_call(state: &SessionState, call: CallStatement) -> Result<ResolvedCall> {
    let catalog = state
        .catalog_list()
        .catalog(&call.catalog)
        .ok_or_else(|| plan_datafusion_err!("Catalog {} not found", call.catalog))?;
    let procedure = require_procedure_catalog(&call.catalog, catalog.as_ref())?
        .load_procedure(&call.procedure)?;
    let parameters = procedure.parameters();

    // Names are bound against index markers, so argument errors are reported
    // before any value is planned.
    let mut raw_values = Vec::with_capacity(call.arguments.len());
    let mut markers = Vec::with_capacity(call.arguments.len());
    for (index, argument) in call.arguments.into_iter().enumerate() {
        let marker = lit(ScalarValue::UInt64(Some(index as u64)));
        markers.push(match argument.name {
            Some(name) => CallArgument::named(name, marker),
            None => CallArgument::positional(marker),
        });
        raw_values.push(argument.value);
    }
    let resolved = resolve_arguments(&parameters, markers)?;

    let empty = DFSchema::empty();
    let values = parameters
        .iter()
        .zip(resolved)
        .map(|(parameter, expr)| {
            let expr = match expr {
                Expr::Literal(ScalarValue::UInt64(Some(index))) => state
                    .create_logical_expr(&raw_values[index as usize].to_string(), &empty)?,
                default => default,
            };
            evaluate_constant(
                state.execution_props(),
                parameter.name(),
                expr,
                parameter.data_type(),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!("Resolved CALL {}.{}", call.catalog, call.procedure);
    Ok(ResolvedCall {
        procedure,
        arguments: ProcedureArguments::new(parameters, values),
    })
}
