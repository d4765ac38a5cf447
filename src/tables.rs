//! Table definition management.

use crate::client::PrismClient;
use crate::model::TableSchema;
use serde_json::Value;
use tracing::{error, info};

/// Creates and edits table definitions.
pub struct TableAdmin<'a> {
    client: &'a PrismClient,
}

impl<'a> TableAdmin<'a> {
    pub fn new(client: &'a PrismClient) -> Self {
        Self { client }
    }

    fn url(&self, table_id: Option<&str>) -> String {
        let base = format!("{}/tables", self.client.endpoints().prism);
        match table_id {
            Some(id) => format!("{base}/{id}"),
            None => base,
        }
    }

    fn body(&self, schema: &TableSchema, action: &str) -> Option<Value> {
        let Some(prepared) = self.client.transformer().prepare_table(schema) else {
            error!(action, "invalid schema for table operation");
            return None;
        };
        match serde_json::to_value(&prepared) {
            Ok(body) => Some(body),
            Err(e) => {
                error!(action, error = %e, "table schema could not be encoded");
                None
            }
        }
    }

    /// Creates an empty table. `None` unless the service answers 201.
    pub async fn create_table(&self, schema: &TableSchema) -> Option<TableSchema> {
        let body = self.body(schema, "create")?;
        let response = self.client.gateway().post_json(&self.url(None), body).await;
        if response.status != 201 {
            return None;
        }
        let table: TableSchema = response.json()?;
        info!(table_id = ?table.id, table_name = %table.name, "created table");
        Some(table)
    }

    /// Replaces a table's definition. Some changes, such as a field type,
    /// are refused while the table holds rows.
    pub async fn update_table(&self, table_id: &str, schema: &TableSchema) -> Option<TableSchema> {
        let body = self.body(schema, "update")?;
        let response = self
            .client
            .gateway()
            .put_json(&self.url(Some(table_id)), body)
            .await;
        if response.status == 200 {
            response.json()
        } else {
            None
        }
    }

    /// Changes table-level attributes only.
    pub async fn patch_table(&self, table_id: &str, patch: Value) -> Option<TableSchema> {
        let response = self
            .client
            .gateway()
            .patch_json(&self.url(Some(table_id)), patch)
            .await;
        if response.status == 200 {
            response.json()
        } else {
            None
        }
    }
}
