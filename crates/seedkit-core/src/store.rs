use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Trait implemented by backends that can persist seeded records.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Whether the collection behind `model` currently exists.
    async fn model_exists(&self, model: &str) -> StoreResult<bool>;

    /// Drop the collection behind `model`.
    async fn drop_collection(&self, model: &str) -> StoreResult<()>;

    /// Produce a fresh identifier value.
    fn generate_identifier(&self) -> Value;

    /// Whether records of `model` carry a generated identifier field.
    fn uses_generated_identifier(&self, model: &str) -> StoreResult<bool>;

    /// Insert one record and return it as stored.
    async fn insert(&self, model: &str, record: Map<String, Value>) -> StoreResult<Value>;
}

/// Schema information for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Collection records are stored in; defaults to the model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Records get an `_id` generated when the seed data does not supply one.
    #[serde(default = "default_generated_id")]
    pub generated_id: bool,
}

impl ModelSpec {
    pub fn new(generated_id: bool) -> Self {
        Self {
            collection: None,
            generated_id,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::new(default_generated_id())
    }
}

fn default_generated_id() -> bool {
    true
}

/// Registry of known models shared by the stock stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: impl Into<String>, spec: ModelSpec) -> Self {
        self.register(name, spec);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, spec: ModelSpec) {
        self.models.insert(name.into(), spec);
    }

    pub fn get(&self, model: &str) -> StoreResult<&ModelSpec> {
        self.models
            .get(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))
    }

    /// Collection name backing `model`.
    pub fn collection_name(&self, model: &str) -> StoreResult<String> {
        let spec = self.get(model)?;
        Ok(spec
            .collection
            .clone()
            .unwrap_or_else(|| model.to_string()))
    }

    pub fn uses_generated_identifier(&self, model: &str) -> StoreResult<bool> {
        Ok(self.get(model)?.generated_id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_defaults_to_model_name() {
        let registry = ModelRegistry::new()
            .with_model("teams", ModelSpec::new(true))
            .with_model("people", ModelSpec::new(false).with_collection("users"));

        assert_eq!(registry.collection_name("teams").unwrap(), "teams");
        assert_eq!(registry.collection_name("people").unwrap(), "users");
        assert!(registry.uses_generated_identifier("teams").unwrap());
        assert!(!registry.uses_generated_identifier("people").unwrap());
    }

    #[test]
    fn unknown_model_is_an_error() {
        let registry = ModelRegistry::new();
        assert!(matches!(
            registry.uses_generated_identifier("ghosts"),
            Err(StoreError::UnknownModel(name)) if name == "ghosts"
        ));
    }

    #[test]
    fn deserializes_from_toml_like_maps() {
        let registry: ModelRegistry = serde_json::from_value(serde_json::json!({
            "teams": {},
            "users": {"collection": "app_users", "generated_id": false}
        }))
        .expect("parse registry");

        assert!(registry.uses_generated_identifier("teams").unwrap());
        assert_eq!(registry.collection_name("users").unwrap(), "app_users");
        assert_eq!(registry.len(), 2);
    }
}
