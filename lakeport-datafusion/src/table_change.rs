//! Host-side table changes and their translation into storage schema changes.

use std::collections::HashMap;

use arrow::datatypes::{DataType, Schema};
use lakeport_catalog::{schema::COMMENT_METADATA_KEY, Move, SchemaChange, TableSchema};

use crate::error::{BridgeError, Result};

pub const PRIMARY_KEY_PROPERTY: &str = "primary-key";
pub const COMMENT_PROPERTY: &str = "comment";

/// Where an added or moved column goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    First,
    After(String),
}

/// A change requested by `ALTER TABLE` on the host side. Field names are paths
/// into possibly nested columns.
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    SetProperty {
        property: String,
        value: String,
    },
    RemoveProperty {
        property: String,
    },
    AddColumn {
        field_names: Vec<String>,
        data_type: DataType,
        nullable: bool,
        comment: Option<String>,
        position: Option<ColumnPosition>,
    },
    RenameColumn {
        field_names: Vec<String>,
        new_name: String,
    },
    DeleteColumn {
        field_names: Vec<String>,
    },
    UpdateColumnType {
        field_names: Vec<String>,
        new_data_type: DataType,
    },
    UpdateColumnNullability {
        field_names: Vec<String>,
        nullable: bool,
    },
    UpdateColumnComment {
        field_names: Vec<String>,
        new_comment: Option<String>,
    },
    UpdateColumnPosition {
        field_names: Vec<String>,
        position: ColumnPosition,
    },
}

pub fn to_schema_change(change: &TableChange) -> Result<SchemaChange> {
    let schema_change = match change {
        TableChange::SetProperty { property, value } => {
            validate_alter_property(property)?;
            SchemaChange::set_option(property, value)
        }
        TableChange::RemoveProperty { property } => {
            validate_alter_property(property)?;
            SchemaChange::remove_option(property)
        }
        TableChange::AddColumn {
            field_names,
            data_type,
            nullable,
            comment,
            position,
        } => {
            let field_name = top_level_field(field_names)?;
            SchemaChange::AddColumn {
                field_name: field_name.to_string(),
                data_type: data_type.clone(),
                nullable: *nullable,
                comment: comment.clone(),
                position: position.as_ref().map(|p| to_move(field_name, p)),
            }
        }
        TableChange::RenameColumn {
            field_names,
            new_name,
        } => SchemaChange::rename_column(top_level_field(field_names)?, new_name),
        TableChange::DeleteColumn { field_names } => {
            SchemaChange::drop_column(top_level_field(field_names)?)
        }
        TableChange::UpdateColumnType {
            field_names,
            new_data_type,
        } => SchemaChange::UpdateColumnType {
            field_name: top_level_field(field_names)?.to_string(),
            data_type: new_data_type.clone(),
        },
        TableChange::UpdateColumnNullability {
            field_names,
            nullable,
        } => SchemaChange::UpdateColumnNullability {
            field_names: field_names.clone(),
            nullable: *nullable,
        },
        TableChange::UpdateColumnComment {
            field_names,
            new_comment,
        } => SchemaChange::UpdateColumnComment {
            field_names: field_names.clone(),
            comment: new_comment.clone(),
        },
        TableChange::UpdateColumnPosition {
            field_names,
            position,
        } => {
            let field_name = field_names
                .first()
                .ok_or_else(|| BridgeError::unsupported("Column position change without a column"))?;
            SchemaChange::UpdateColumnPosition(to_move(field_name, position))
        }
    };
    Ok(schema_change)
}

fn to_move(field_name: &str, position: &ColumnPosition) -> Move {
    match position {
        ColumnPosition::First => Move::first(field_name),
        ColumnPosition::After(column) => Move::after(field_name, column),
    }
}

fn top_level_field(field_names: &[String]) -> Result<&str> {
    match field_names {
        [field_name] => Ok(field_name.as_str()),
        _ => Err(BridgeError::unsupported(format!(
            "Alter nested column is not supported: {:?}",
            field_names
        ))),
    }
}

fn validate_alter_property(property: &str) -> Result<()> {
    if property == PRIMARY_KEY_PROPERTY {
        tracing::warn!("Rejected change of table property {}", property);
        return Err(BridgeError::unsupported("Alter primary key is not supported"));
    }
    Ok(())
}

/// Builds the storage schema for `CREATE TABLE` from the host's column list,
/// partition columns and table properties.
///
/// The `primary-key` property is a comma separated column list and is not kept
/// as a table option. The `comment` property becomes the table comment.
pub fn to_table_schema(
    schema: &Schema,
    partition_keys: &[String],
    properties: &HashMap<String, String>,
) -> Result<TableSchema> {
    let mut options = properties.clone();
    let primary_keys = options
        .remove(PRIMARY_KEY_PROPERTY)
        .map(|keys| {
            keys.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut builder = TableSchema::builder()
        .partition_keys(partition_keys.to_vec())
        .primary_keys(primary_keys)
        .comment(properties.get(COMMENT_PROPERTY).cloned())
        .options(options);
    for field in schema.fields() {
        builder = builder.column(
            field.name(),
            field.data_type().clone(),
            field.is_nullable(),
            field.metadata().get(COMMENT_METADATA_KEY).map(String::as_str),
        );
    }
    Ok(builder.build()?)
}
