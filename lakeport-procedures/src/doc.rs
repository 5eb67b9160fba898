use std::sync::Arc;

use lakeport_catalog::Catalog;

use crate::procedure::{procedure_builder, procedure_names, Procedure};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcedureDoc {
    pub procedure_name: String,
    pub description: String,
    pub parameters: Vec<ProcedureParameterDoc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcedureParameterDoc {
    name: String,
    data_type: String,
    required: bool,
    description: String,
}

impl ProcedureDoc {
    pub fn from_procedure(procedure: &dyn Procedure) -> Self {
        let parameters = procedure
            .parameters()
            .iter()
            .map(|parameter| ProcedureParameterDoc {
                name: parameter.name().to_string(),
                data_type: format!("{}", parameter.data_type()),
                required: parameter.is_required(),
                description: parameter
                    .description()
                    .unwrap_or("No description available")
                    .to_string(),
            })
            .collect();

        ProcedureDoc {
            procedure_name: procedure.name().to_string(),
            description: procedure
                .description()
                .unwrap_or_else(|| "No documentation available".to_string()),
            parameters,
        }
    }

    /// Documents every registered procedure, bound to `catalog`.
    pub fn registered(catalog: Arc<dyn Catalog>) -> Vec<Self> {
        procedure_names()
            .into_iter()
            .filter_map(procedure_builder)
            .map(|builder| Self::from_procedure(builder.build(catalog.clone()).as_ref()))
            .collect()
    }
}
