use std::{collections::HashMap, sync::Arc};

use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};

use crate::{
    error::{CatalogError, Result},
    options::Options,
    Identifier,
};

/// Field metadata key holding a column comment.
pub const COMMENT_METADATA_KEY: &str = "comment";

/// Schema of a table: columns plus the table-format metadata around them.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    id: u64,
    fields: SchemaRef,
    partition_keys: Vec<String>,
    primary_keys: Vec<String>,
    options: Options,
    comment: Option<String>,
}

impl TableSchema {
    pub fn builder() -> TableSchemaBuilder {
        TableSchemaBuilder::default()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn arrow_schema(&self) -> SchemaRef {
        self.fields.clone()
    }

    pub fn partition_keys(&self) -> &[String] {
        &self.partition_keys
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn field(&self, name: &str) -> Option<&FieldRef> {
        self.fields.fields().iter().find(|f| f.name() == name)
    }

    pub fn field_comment(&self, name: &str) -> Option<&str> {
        self.field(name)
            .and_then(|f| f.metadata().get(COMMENT_METADATA_KEY))
            .map(String::as_str)
    }

    /// Applies the changes in order and returns the evolved schema with a new id.
    /// The receiver is left untouched if any change fails.
    pub fn apply_changes(&self, table: &Identifier, changes: &[SchemaChange]) -> Result<Self> {
        let mut fields: Vec<FieldRef> = self.fields.fields().iter().cloned().collect();
        let mut options = self.options.clone();
        let partition_keys = self.partition_keys.clone();
        let mut primary_keys = self.primary_keys.clone();

        let position = |fields: &[FieldRef], name: &str| -> Result<usize> {
            fields
                .iter()
                .position(|f| f.name() == name)
                .ok_or_else(|| CatalogError::ColumnNotExist {
                    table: table.clone(),
                    column: name.to_string(),
                })
        };

        for change in changes {
            match change {
                SchemaChange::SetOption { key, value } => {
                    options.insert(key.clone(), value.clone());
                }
                SchemaChange::RemoveOption { key } => {
                    options.remove(key);
                }
                SchemaChange::AddColumn {
                    field_name,
                    data_type,
                    nullable,
                    comment,
                    position: column_move,
                } => {
                    if fields.iter().any(|f| f.name() == field_name) {
                        return Err(CatalogError::ColumnAlreadyExists {
                            table: table.clone(),
                            column: field_name.clone(),
                        });
                    }
                    let field = Arc::new(new_field(
                        field_name,
                        data_type.clone(),
                        *nullable,
                        comment.as_deref(),
                    ));
                    match column_move {
                        None => fields.push(field),
                        Some(column_move) => {
                            let index = match &column_move.kind {
                                MoveKind::First => 0,
                                MoveKind::After(reference) => position(&fields, reference)? + 1,
                            };
                            fields.insert(index, field);
                        }
                    }
                }
                SchemaChange::RenameColumn {
                    field_name,
                    new_name,
                } => {
                    let index = position(&fields, field_name)?;
                    if fields.iter().any(|f| f.name() == new_name) {
                        return Err(CatalogError::ColumnAlreadyExists {
                            table: table.clone(),
                            column: new_name.clone(),
                        });
                    }
                    if partition_keys.contains(field_name) {
                        return Err(CatalogError::Unsupported(format!(
                            "Cannot rename partition column {}",
                            field_name
                        )));
                    }
                    for key in primary_keys.iter_mut().filter(|k| k.as_str() == field_name) {
                        *key = new_name.clone();
                    }
                    fields[index] = Arc::new(fields[index].as_ref().clone().with_name(new_name));
                }
                SchemaChange::DropColumn { field_name } => {
                    let index = position(&fields, field_name)?;
                    if partition_keys.contains(field_name) || primary_keys.contains(field_name) {
                        return Err(CatalogError::Unsupported(format!(
                            "Cannot drop partition key or primary key column {}",
                            field_name
                        )));
                    }
                    if fields.len() == 1 {
                        return Err(CatalogError::Unsupported(
                            "Cannot drop all fields in table".to_string(),
                        ));
                    }
                    fields.remove(index);
                }
                SchemaChange::UpdateColumnType {
                    field_name,
                    data_type,
                } => {
                    let index = position(&fields, field_name)?;
                    fields[index] = Arc::new(
                        fields[index]
                            .as_ref()
                            .clone()
                            .with_data_type(data_type.clone()),
                    );
                }
                SchemaChange::UpdateColumnNullability {
                    field_names,
                    nullable,
                } => {
                    let field_name = top_level_field(field_names)?;
                    let index = position(&fields, field_name)?;
                    if *nullable && primary_keys.iter().any(|k| k == field_name) {
                        return Err(CatalogError::Unsupported(format!(
                            "Cannot change nullability of primary key column {}",
                            field_name
                        )));
                    }
                    fields[index] =
                        Arc::new(fields[index].as_ref().clone().with_nullable(*nullable));
                }
                SchemaChange::UpdateColumnComment {
                    field_names,
                    comment,
                } => {
                    let field_name = top_level_field(field_names)?;
                    let index = position(&fields, field_name)?;
                    let mut metadata = fields[index].metadata().clone();
                    match comment {
                        Some(comment) => {
                            metadata.insert(COMMENT_METADATA_KEY.to_string(), comment.clone());
                        }
                        None => {
                            metadata.remove(COMMENT_METADATA_KEY);
                        }
                    }
                    fields[index] = Arc::new(fields[index].as_ref().clone().with_metadata(metadata));
                }
                SchemaChange::UpdateColumnPosition(column_move) => {
                    let from = position(&fields, &column_move.field_name)?;
                    let field = fields.remove(from);
                    let to = match &column_move.kind {
                        MoveKind::First => 0,
                        MoveKind::After(reference) => position(&fields, reference)? + 1,
                    };
                    fields.insert(to, field);
                }
            }
        }

        Ok(Self {
            id: self.id + 1,
            fields: Arc::new(Schema::new_with_metadata(
                fields,
                self.fields.metadata().clone(),
            )),
            partition_keys,
            primary_keys,
            options,
            comment: self.comment.clone(),
        })
    }
}

fn top_level_field(field_names: &[String]) -> Result<&String> {
    match field_names {
        [name] => Ok(name),
        _ => Err(CatalogError::Unsupported(format!(
            "Nested field {:?} cannot be altered",
            field_names
        ))),
    }
}

fn new_field(name: &str, data_type: DataType, nullable: bool, comment: Option<&str>) -> Field {
    let field = Field::new(name, data_type, nullable);
    match comment {
        Some(comment) => field.with_metadata(HashMap::from([(
            COMMENT_METADATA_KEY.to_string(),
            comment.to_string(),
        )])),
        None => field,
    }
}

#[derive(Debug, Default)]
pub struct TableSchemaBuilder {
    fields: Vec<Field>,
    partition_keys: Vec<String>,
    primary_keys: Vec<String>,
    options: Options,
    comment: Option<String>,
}

impl TableSchemaBuilder {
    pub fn column(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        nullable: bool,
        comment: Option<&str>,
    ) -> Self {
        self.fields
            .push(new_field(&name.into(), data_type, nullable, comment));
        self
    }

    pub fn partition_keys(mut self, keys: Vec<String>) -> Self {
        self.partition_keys = keys;
        self
    }

    pub fn primary_keys(mut self, keys: Vec<String>) -> Self {
        self.primary_keys = keys;
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment.filter(|c| !c.is_empty());
        self
    }

    pub fn build(self) -> Result<TableSchema> {
        for key in self.partition_keys.iter().chain(self.primary_keys.iter()) {
            if !self.fields.iter().any(|f| f.name() == key) {
                return Err(CatalogError::InvalidOption {
                    key: key.clone(),
                    message: "key column is not defined in the table schema".to_string(),
                });
            }
        }
        // Primary key columns are never nullable.
        let fields = self
            .fields
            .into_iter()
            .map(|f| {
                if self.primary_keys.iter().any(|k| k == f.name()) {
                    f.with_nullable(false)
                } else {
                    f
                }
            })
            .collect::<Vec<_>>();

        Ok(TableSchema {
            id: 0,
            fields: Arc::new(Schema::new(fields)),
            partition_keys: self.partition_keys,
            primary_keys: self.primary_keys,
            options: self.options,
            comment: self.comment,
        })
    }
}

/// A single schema evolution step requested against a table.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    SetOption {
        key: String,
        value: String,
    },
    RemoveOption {
        key: String,
    },
    AddColumn {
        field_name: String,
        data_type: DataType,
        nullable: bool,
        comment: Option<String>,
        position: Option<Move>,
    },
    RenameColumn {
        field_name: String,
        new_name: String,
    },
    DropColumn {
        field_name: String,
    },
    UpdateColumnType {
        field_name: String,
        data_type: DataType,
    },
    UpdateColumnNullability {
        field_names: Vec<String>,
        nullable: bool,
    },
    UpdateColumnComment {
        field_names: Vec<String>,
        comment: Option<String>,
    },
    UpdateColumnPosition(Move),
}

impl SchemaChange {
    pub fn set_option(key: impl Into<String>, value: impl Into<String>) -> Self {
        SchemaChange::SetOption {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove_option(key: impl Into<String>) -> Self {
        SchemaChange::RemoveOption { key: key.into() }
    }

    pub fn add_column(
        field_name: impl Into<String>,
        data_type: DataType,
        nullable: bool,
        comment: Option<String>,
        position: Option<Move>,
    ) -> Self {
        SchemaChange::AddColumn {
            field_name: field_name.into(),
            data_type,
            nullable,
            comment,
            position,
        }
    }

    pub fn rename_column(field_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        SchemaChange::RenameColumn {
            field_name: field_name.into(),
            new_name: new_name.into(),
        }
    }

    pub fn drop_column(field_name: impl Into<String>) -> Self {
        SchemaChange::DropColumn {
            field_name: field_name.into(),
        }
    }
}

/// Where a column lands when it is added or repositioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub field_name: String,
    pub kind: MoveKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveKind {
    First,
    After(String),
}

impl Move {
    pub fn first(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            kind: MoveKind::First,
        }
    }

    pub fn after(field_name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            kind: MoveKind::After(reference.into()),
        }
    }
}
