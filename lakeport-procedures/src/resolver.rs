//! Binds the arguments of a `CALL` site to a procedure's declared parameters.
//!
//! Resolution always goes through parameter names, even for positional calls,
//! so defaulting of optional parameters and the required check share one path
//! and every offending name is reported at once.

use std::collections::{HashMap, HashSet};

use datafusion::{
    prelude::{lit, Expr},
    scalar::ScalarValue,
};
use indexmap::IndexMap;

use crate::{
    error::{ProcedureError, Result},
    parameter::{CallArgument, ProcedureParameter},
};

/// Lowercases every parameter name.
pub fn normalize_parameters(parameters: &[ProcedureParameter]) -> Vec<ProcedureParameter> {
    parameters
        .iter()
        .map(|p| p.clone().with_name(p.name().to_ascii_lowercase()))
        .collect()
}

/// Checks that names are unique and that required parameters come first.
pub fn validate_parameters(parameters: &[ProcedureParameter]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut duplicates = vec![];
    for parameter in parameters {
        if !seen.insert(parameter.name()) && !duplicates.iter().any(|d| d == parameter.name()) {
            duplicates.push(parameter.name().to_string());
        }
    }
    if !duplicates.is_empty() {
        return Err(ProcedureError::DuplicateParameterName(duplicates));
    }

    // Any inversion shows up as at least one adjacent (optional, required) pair.
    for pair in parameters.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        if !previous.is_required() && current.is_required() {
            return Err(ProcedureError::ParameterOrderingViolation {
                optional: previous.name().to_string(),
                required: current.name().to_string(),
            });
        }
    }
    Ok(())
}

/// Lowercases the names of named arguments.
pub fn normalize_arguments(arguments: Vec<CallArgument>) -> Vec<CallArgument> {
    arguments
        .into_iter()
        .map(|argument| match argument {
            CallArgument::Named { name, value } => CallArgument::Named {
                name: name.to_ascii_lowercase(),
                value,
            },
            positional => positional,
        })
        .collect()
}

/// Resolves normalized arguments against normalized parameters into one
/// expression per parameter, in declared order. Optional parameters without a
/// value get a null literal of their declared type.
pub fn resolve(
    parameters: &[ProcedureParameter],
    arguments: Vec<CallArgument>,
) -> Result<Vec<Expr>> {
    let name_to_position: HashMap<&str, usize> = parameters
        .iter()
        .enumerate()
        .map(|(position, parameter)| (parameter.name(), position))
        .collect();

    let has_named = arguments.iter().any(CallArgument::is_named);
    let has_positional = arguments.iter().any(|a| !a.is_named());
    if has_named && has_positional {
        return Err(ProcedureError::MixedArgumentStyle);
    }

    let mut name_to_argument: HashMap<String, Expr> = HashMap::with_capacity(arguments.len());
    if has_named {
        let (duplicates, unknown) = {
            let mut occurrences: IndexMap<&str, usize> = IndexMap::new();
            for name in arguments.iter().filter_map(CallArgument::name) {
                *occurrences.entry(name).or_default() += 1;
            }
            let duplicates = occurrences
                .iter()
                .filter(|(_, count)| **count > 1)
                .map(|(name, _)| name.to_string())
                .collect::<Vec<_>>();
            let unknown = occurrences
                .keys()
                .filter(|name| !name_to_position.contains_key(**name))
                .map(|name| name.to_string())
                .collect::<Vec<_>>();
            (duplicates, unknown)
        };
        if !duplicates.is_empty() {
            return Err(ProcedureError::DuplicateArgument(duplicates));
        }
        if !unknown.is_empty() {
            return Err(ProcedureError::UnknownArgument(unknown));
        }

        for argument in arguments {
            if let CallArgument::Named { name, value } = argument {
                name_to_argument.insert(name, value);
            }
        }
    } else {
        if arguments.len() > parameters.len() {
            return Err(ProcedureError::TooManyArguments {
                expected: parameters.len(),
                actual: arguments.len(),
            });
        }
        for (parameter, argument) in parameters.iter().zip(arguments) {
            name_to_argument.insert(parameter.name().to_string(), argument.into_value());
        }
    }

    let missing = parameters
        .iter()
        .filter(|p| p.is_required() && !name_to_argument.contains_key(p.name()))
        .map(|p| p.name().to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ProcedureError::MissingRequiredArgument(missing));
    }

    let mut resolved: Vec<Option<Expr>> = vec![None; parameters.len()];
    for (name, value) in name_to_argument {
        resolved[name_to_position[name.as_str()]] = Some(value);
    }

    parameters
        .iter()
        .zip(resolved)
        .map(|(parameter, value)| match value {
            Some(value) => Ok(value),
            None => Ok(lit(ScalarValue::try_from(parameter.data_type())?)),
        })
        .collect()
}

/// Normalizes and validates both sides, then resolves.
pub fn resolve_arguments(
    parameters: &[ProcedureParameter],
    arguments: Vec<CallArgument>,
) -> Result<Vec<Expr>> {
    let parameters = normalize_parameters(parameters);
    validate_parameters(&parameters)?;
    let arguments = normalize_arguments(arguments);
    let resolved = resolve(&parameters, arguments)?;
    tracing::debug!("Resolved procedure arguments: {:?}", resolved);
    Ok(resolved)
}
