//! Table definition → load schema conversion.
//!
//! The receiving service matches uploaded columns to fields by ordinal, so
//! ordinals are always reassigned 1..N after the audit fields are removed.

use crate::model::{Field, LoadField, LoadSchema, ParseOptions, Reference, TableSchema};
use tracing::{debug, error};

pub const SCHEMA_VERSION: &str = "Schema_Version=1.0";

#[derive(Debug, Clone)]
pub struct SchemaTransformer {
    audit_prefix: String,
    default_parse_options: ParseOptions,
}

impl Default for SchemaTransformer {
    fn default() -> Self {
        Self {
            audit_prefix: crate::model::AUDIT_FIELD_PREFIX.to_string(),
            default_parse_options: ParseOptions::default(),
        }
    }
}

impl SchemaTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options used when the table carries none of its own.
    pub fn with_parse_options(mut self, parse_options: ParseOptions) -> Self {
        self.default_parse_options = parse_options;
        self
    }

    fn is_audit(&self, field: &Field) -> bool {
        field.name.starts_with(&self.audit_prefix)
    }

    /// Converts a stored table definition into the schema a bucket expects.
    ///
    /// Returns `None` (and logs) when the table has no field list or a field
    /// has no name.
    pub fn to_load_schema(&self, table: &TableSchema) -> Option<LoadSchema> {
        let Some(fields) = table.fields.as_ref() else {
            error!(table = %table.name, "table has no fields attribute, cannot build a load schema");
            return None;
        };

        if let Some(position) = fields.iter().position(|field| field.name.trim().is_empty()) {
            error!(table = %table.name, position, "table field without a name");
            return None;
        }

        let fields: Vec<LoadField> = fields
            .iter()
            .filter(|field| !self.is_audit(field))
            .enumerate()
            .map(|(index, field)| LoadField {
                name: field.name.clone(),
                field_type: field.field_type.clone(),
                ordinal: index as u32 + 1,
                use_as_operation_key: field.external_id,
                precision: field.precision,
                scale: field.scale,
                parse_format: field.parse_format.clone(),
                business_object: field.business_object.clone(),
                default_value: field.default_value.clone(),
                description: field.description.clone(),
            })
            .collect();

        debug!(table = %table.name, fields = fields.len(), "built load schema");

        Some(LoadSchema {
            schema_version: Reference::id(SCHEMA_VERSION),
            parse_options: table
                .parse_options
                .clone()
                .unwrap_or_else(|| self.default_parse_options.clone()),
            fields,
        })
    }

    /// Same as [`to_load_schema`](Self::to_load_schema) for an untyped table
    /// definition, e.g. one read from a schema file.
    pub fn to_load_schema_value(&self, table: &serde_json::Value) -> Option<LoadSchema> {
        match serde_json::from_value::<TableSchema>(table.clone()) {
            Ok(table) => self.to_load_schema(&table),
            Err(e) => {
                error!(error = %e, "invalid table definition passed to load schema conversion");
                None
            }
        }
    }

    /// Normalises a table definition before it is created or replaced:
    /// audit fields are dropped and ordinals reassigned 1..N.
    pub fn prepare_table(&self, table: &TableSchema) -> Option<TableSchema> {
        if table.name.trim().is_empty() {
            error!("table definition has no name");
            return None;
        }
        let Some(fields) = table.fields.as_ref() else {
            error!(table = %table.name, "fields attribute missing from schema");
            return None;
        };

        let fields = fields
            .iter()
            .filter(|field| !self.is_audit(field))
            .enumerate()
            .map(|(index, field)| Field {
                ordinal: Some(index as u32 + 1),
                ..field.clone()
            })
            .collect();

        Some(TableSchema {
            fields: Some(fields),
            parse_options: None,
            ..table.clone()
        })
    }
}
