//! The syntactic side of `CALL`: procedure identifier and raw arguments.

use datafusion::{
    common::{not_impl_err, plan_err},
    error::Result,
    sql::sqlparser::ast::{
        Expr as SQLExpr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Ident,
    },
};
use lakeport_procedures::ProcedureIdentifier;

/// One argument as written: an optional name and the unplanned value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCallArgument {
    pub name: Option<String>,
    pub value: SQLExpr,
}

/// A parsed `CALL [catalog.]namespace.name(args)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallStatement {
    pub catalog: String,
    pub procedure: ProcedureIdentifier,
    pub arguments: Vec<RawCallArgument>,
}

impl CallStatement {
    pub fn try_new(function: &Function, default_catalog: &str) -> Result<Self> {
        let (catalog, procedure) = resolve_identifier(&function.name.0, default_catalog)?;
        Ok(Self {
            catalog,
            procedure,
            arguments: call_arguments(&function.args)?,
        })
    }
}

/// Splits a lowercased multi-part name into catalog and procedure identifier.
///
/// With three or more parts the first names the catalog; otherwise the
/// default catalog is used. The last part is always the procedure name.
pub fn resolve_identifier(
    parts: &[Ident],
    default_catalog: &str,
) -> Result<(String, ProcedureIdentifier)> {
    let mut parts = parts
        .iter()
        .map(|ident| ident.value.to_ascii_lowercase())
        .collect::<Vec<_>>();
    let Some(name) = parts.pop() else {
        return plan_err!("CALL requires a procedure name");
    };
    let catalog = if parts.len() >= 2 {
        parts.remove(0)
    } else {
        default_catalog.to_string()
    };
    Ok((catalog, ProcedureIdentifier::new(parts, name)))
}

fn call_arguments(args: &FunctionArguments) -> Result<Vec<RawCallArgument>> {
    let list = match args {
        FunctionArguments::None => return Ok(vec![]),
        FunctionArguments::List(list) => list,
        FunctionArguments::Subquery(_) => {
            return not_impl_err!("Subqueries are not supported as CALL arguments")
        }
    };
    list.args
        .iter()
        .map(|arg| match arg {
            FunctionArg::Named {
                name,
                arg: FunctionArgExpr::Expr(value),
                ..
            } => Ok(RawCallArgument {
                name: Some(name.value.clone()),
                value: value.clone(),
            }),
            FunctionArg::Unnamed(FunctionArgExpr::Expr(value)) => Ok(RawCallArgument {
                name: None,
                value: value.clone(),
            }),
            other => not_impl_err!("Unsupported CALL argument: {other}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use datafusion::sql::sqlparser::{ast::Statement, dialect::GenericDialect, parser::Parser};

    use super::*;

    fn parse(sql: &str) -> Result<CallStatement> {
        let statement = Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0);
        match statement {
            Statement::Call(function) => CallStatement::try_new(&function, "lake"),
            other => panic!("not a CALL: {other}"),
        }
    }

    #[test]
    fn test_identifier_resolution() {
        let call = parse("CALL Sys.Compact('db.t')").unwrap();
        assert_eq!(call.catalog, "lake");
        assert_eq!(call.procedure.namespace, vec!["sys"]);
        assert_eq!(call.procedure.name, "compact");

        let call = parse("CALL other.sys.compact('db.t')").unwrap();
        assert_eq!(call.catalog, "other");
        assert_eq!(call.procedure.to_string(), "sys.compact");

        let call = parse("CALL a.b.c.compact()").unwrap();
        assert_eq!(call.catalog, "a");
        assert_eq!(call.procedure.namespace, vec!["b", "c"]);

        let call = parse("CALL compact()").unwrap();
        assert!(call.procedure.namespace.is_empty());
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn test_identifier_lowercases_ascii_only() {
        let parts = [Ident::new("SYS"), Ident::new("ÉTAT")];
        let (catalog, procedure) = resolve_identifier(&parts, "lake").unwrap();
        assert_eq!(catalog, "lake");
        assert_eq!(procedure.namespace, vec!["sys"]);
        assert_eq!(procedure.name, "État");

        assert!(resolve_identifier(&[], "lake").is_err());
    }

    #[test]
    fn test_arguments() {
        let call = parse("CALL sys.compact(table => 'db.t', Partitions => 'dt=1')").unwrap();
        assert_eq!(call.arguments.len(), 2);
        assert_eq!(call.arguments[0].name.as_deref(), Some("table"));
        assert_eq!(call.arguments[1].name.as_deref(), Some("Partitions"));

        let call = parse("CALL sys.rollback_to('db.t', 1 + 1)").unwrap();
        assert!(call.arguments.iter().all(|a| a.name.is_none()));
        assert_eq!(call.arguments[1].value.to_string(), "1 + 1");

        assert!(parse("CALL sys.compact(*)").is_err());
    }
}
