//! Wire types for tables, buckets, change tasks, data sources and file
//! containers.
//!
//! Optional attributes are explicit `Option`s and unknown attributes are
//! ignored, so a response is validated once when it is deserialized instead
//! of being inspected field by field later.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of the system-managed audit columns present on every table.
pub const AUDIT_FIELD_PREFIX: &str = "WPA_";

/// `{ "id": ..., "descriptor": ... }` pointer to another object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
}

impl Reference {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            descriptor: None,
        }
    }

    pub fn descriptor(&self) -> &str {
        self.descriptor.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub external_id: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_object: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_audit(&self) -> bool {
        self.name.starts_with(AUDIT_FIELD_PREFIX)
    }
}

/// How the receiving service parses an uploaded delimited file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOptions {
    pub fields_delimited_by: String,
    pub fields_enclosed_by: String,
    pub header_lines_to_ignore: u32,
    pub charset: Reference,
    #[serde(rename = "type")]
    pub file_type: Reference,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            fields_delimited_by: ",".to_string(),
            fields_enclosed_by: "\"".to_string(),
            header_lines_to_ignore: 1,
            charset: Reference::id("Encoding=UTF-8"),
            file_type: Reference::id("Schema_File_Type=Delimited"),
        }
    }
}

/// A stored table definition (`GET /tables`).
///
/// `fields` is `None` when the table was fetched at summary detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default)]
    pub enable_for_analysis: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_options: Option<ParseOptions>,
}

impl TableSchema {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadField {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<Reference>,
    #[serde(default)]
    pub ordinal: u32,
    #[serde(default)]
    pub use_as_operation_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_object: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Field list and parse options sent with a bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSchema {
    #[serde(default)]
    pub schema_version: Reference,
    #[serde(default)]
    pub parse_options: ParseOptions,
    #[serde(default)]
    pub fields: Vec<LoadField>,
}

impl From<&LoadSchema> for TableSchema {
    /// Rebuilds a table definition from a load schema; operation keys become
    /// external ids again.
    fn from(schema: &LoadSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|field| Field {
                name: field.name.clone(),
                field_type: field.field_type.clone(),
                ordinal: Some(field.ordinal),
                external_id: field.use_as_operation_key,
                precision: field.precision,
                scale: field.scale,
                parse_format: field.parse_format.clone(),
                business_object: field.business_object.clone(),
                default_value: field.default_value.clone(),
                description: field.description.clone(),
                ..Field::default()
            })
            .collect();
        TableSchema {
            fields: Some(fields),
            parse_options: Some(schema.parse_options.clone()),
            ..TableSchema::default()
        }
    }
}

/// Error for unrecognised enum spellings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BucketOperation {
    #[default]
    TruncateAndInsert,
    Insert,
    Update,
    Upsert,
    Delete,
}

impl BucketOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketOperation::TruncateAndInsert => "TruncateAndInsert",
            BucketOperation::Insert => "Insert",
            BucketOperation::Update => "Update",
            BucketOperation::Upsert => "Upsert",
            BucketOperation::Delete => "Delete",
        }
    }

    /// `{"id": "Operation_Type=<op>"}` as the bucket API expects it.
    pub fn to_reference(&self) -> Reference {
        Reference::id(format!("Operation_Type={}", self.as_str()))
    }
}

impl fmt::Display for BucketOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketOperation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim_start_matches("Operation_Type=");
        match value.to_ascii_lowercase().as_str() {
            "truncateandinsert" => Ok(BucketOperation::TruncateAndInsert),
            "insert" => Ok(BucketOperation::Insert),
            "update" => Ok(BucketOperation::Update),
            "upsert" => Ok(BucketOperation::Upsert),
            "delete" => Ok(BucketOperation::Delete),
            _ => Err(ParseEnumError {
                kind: "bucket operation",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketState {
    New,
    Completing,
    Loaded,
    Error,
}

impl fmt::Display for BucketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BucketState::New => "New",
            BucketState::Completing => "Completing",
            BucketState::Loaded => "Loaded",
            BucketState::Error => "Error",
        };
        f.write_str(name)
    }
}

impl FromStr for BucketState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(BucketState::New),
            "completing" | "processing" | "queued" => Ok(BucketState::Completing),
            "loaded" | "success" | "succeeded" | "completed" => Ok(BucketState::Loaded),
            "error" | "failed" => Ok(BucketState::Error),
            _ => Err(ParseEnumError {
                kind: "bucket state",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_dataset: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<LoadSchema>,
}

impl Bucket {
    /// Parsed lifecycle state; `None` when absent or unrecognised.
    pub fn state(&self) -> Option<BucketState> {
        self.state
            .as_ref()
            .and_then(|state| state.descriptor.as_deref())
            .and_then(|descriptor| descriptor.parse().ok())
    }

    pub fn operation(&self) -> Option<BucketOperation> {
        let reference = self.operation.as_ref()?;
        reference
            .descriptor
            .as_deref()
            .or(reference.id.as_deref())
            .and_then(|value| value.parse().ok())
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_dataset.as_ref().and_then(|t| t.id.as_deref())
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_default()
    }
}

/// A named data-change (transformation) job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTask {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Reference>,
}

impl ChangeTask {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityState {
    New,
    Queued,
    Processing,
    Loading,
    Completed,
    Failed,
    Other(String),
}

impl ActivityState {
    pub fn parse(descriptor: &str) -> Self {
        match descriptor.to_ascii_lowercase().as_str() {
            "new" => ActivityState::New,
            "queued" => ActivityState::Queued,
            "processing" => ActivityState::Processing,
            "loading" => ActivityState::Loading,
            "completed" | "success" | "succeeded" => ActivityState::Completed,
            "failed" | "error" => ActivityState::Failed,
            _ => ActivityState::Other(descriptor.to_string()),
        }
    }

    /// Anything other than New/Queued/Processing/Loading is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            ActivityState::New
                | ActivityState::Queued
                | ActivityState::Processing
                | ActivityState::Loading
        )
    }
}

/// One execution of a change task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Reference>,
}

impl Activity {
    /// A missing state is reported as `New` so polling continues.
    pub fn state(&self) -> ActivityState {
        match self.state.as_ref().and_then(|s| s.descriptor.as_deref()) {
            Some(descriptor) => ActivityState::parse(descriptor),
            None => ActivityState::New,
        }
    }
}

/// A WQL data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
}

impl DataSource {
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or_default()
    }

    pub fn descriptor(&self) -> &str {
        self.descriptor.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileContainer {
    pub id: String,
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_wire_reference() {
        assert_eq!(
            BucketOperation::Upsert.to_reference().id.as_deref(),
            Some("Operation_Type=Upsert")
        );
        assert_eq!(
            "Operation_Type=Delete".parse::<BucketOperation>(),
            Ok(BucketOperation::Delete)
        );
        assert!("Merge".parse::<BucketOperation>().is_err());
    }

    #[test]
    fn activity_terminal_states() {
        assert!(!ActivityState::parse("Queued").is_terminal());
        assert!(!ActivityState::parse("Loading").is_terminal());
        assert!(ActivityState::parse("Completed").is_terminal());
        assert!(ActivityState::parse("Cancelled").is_terminal());
    }

    #[test]
    fn bucket_state_from_descriptor() {
        let bucket: Bucket = serde_json::from_value(serde_json::json!({
            "id": "b1",
            "name": "cli_1",
            "state": { "id": "x", "descriptor": "New" }
        }))
        .expect("bucket json");
        assert_eq!(bucket.state(), Some(BucketState::New));
    }
}
