use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::debug;

use seedkit_core::{ID_FIELD, ModelRegistry, Store, StoreError, StoreResult};

use crate::queries;

pub const DEFAULT_SCHEMA: &str = "public";

/// Store backed by PostgreSQL.
///
/// Tables are created on first insert as `(_seq, _id, doc)`; `_seq` keeps
/// insertion order and `doc` holds the record as JSONB.
#[derive(Debug)]
pub struct PostgresStore {
    pool: PgPool,
    schema: String,
    registry: ModelRegistry,
    created: Mutex<HashSet<String>>,
}

impl PostgresStore {
    /// Create a store using a pre-configured pool.
    pub fn new(pool: PgPool, registry: ModelRegistry) -> Self {
        Self {
            pool,
            schema: DEFAULT_SCHEMA.to_string(),
            registry,
            created: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Create the target schema if it is missing.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        queries::execute(&self.pool, &queries::create_schema_sql(&self.schema))
            .await
            .map_err(StoreError::backend)
    }

    fn table_name(&self, model: &str) -> StoreResult<String> {
        self.registry.collection_name(model)
    }

    async fn ensure_table(&self, table: &str) -> StoreResult<String> {
        let qualified = queries::qualified_table(&self.schema, table);
        let mut created = self.created.lock().await;
        if !created.contains(table) {
            queries::execute(&self.pool, &queries::create_table_sql(&qualified))
                .await
                .map_err(StoreError::backend)?;
            debug!(schema = %self.schema, table = %table, "collection table ready");
            created.insert(table.to_string());
        }
        Ok(qualified)
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn model_exists(&self, model: &str) -> StoreResult<bool> {
        let table = self.table_name(model)?;
        queries::table_exists(&self.pool, &self.schema, &table)
            .await
            .map_err(StoreError::backend)
    }

    async fn drop_collection(&self, model: &str) -> StoreResult<()> {
        let table = self.table_name(model)?;
        let qualified = queries::qualified_table(&self.schema, &table);
        let mut created = self.created.lock().await;
        queries::execute(&self.pool, &queries::drop_table_sql(&qualified))
            .await
            .map_err(StoreError::backend)?;
        created.remove(&table);
        debug!(schema = %self.schema, table = %table, "collection table dropped");
        Ok(())
    }

    fn generate_identifier(&self) -> Value {
        Value::String(uuid::Uuid::new_v4().to_string())
    }

    fn uses_generated_identifier(&self, model: &str) -> StoreResult<bool> {
        self.registry.uses_generated_identifier(model)
    }

    async fn insert(&self, model: &str, record: Map<String, Value>) -> StoreResult<Value> {
        let table = self.table_name(model)?;
        let qualified = self.ensure_table(&table).await?;

        let id = identifier_text(&record);
        let document = serde_json::to_string(&Value::Object(record)).map_err(StoreError::backend)?;
        let stored = queries::insert_document(&self.pool, &qualified, id, document)
            .await
            .map_err(StoreError::backend)?;
        serde_json::from_str(&stored).map_err(StoreError::backend)
    }
}

/// Text form of the record identifier for the `_id` column.
fn identifier_text(record: &Map<String, Value>) -> Option<String> {
    match record.get(ID_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id.clone()),
        Some(other) => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn identifier_column_uses_plain_text() {
        assert_eq!(identifier_text(&record(json!({"_id": "abc"}))), Some("abc".to_string()));
        assert_eq!(identifier_text(&record(json!({"_id": 42}))), Some("42".to_string()));
        assert_eq!(identifier_text(&record(json!({"_id": null}))), None);
        assert_eq!(identifier_text(&record(json!({"name": "x"}))), None);
    }
}
