use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use seedkit_core::{ModelRegistry, Store, StoreError, StoreResult};

/// Store that keeps inserted records in memory, grouped by collection.
///
/// Used for dry runs and tests. Identifiers are UUID v4 strings.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    registry: ModelRegistry,
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeMap<String, Vec<Value>>,
    inserts: u64,
    drops: u64,
}

impl InMemoryStore {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Pre-populate the collection behind `model`.
    pub fn with_records(self, model: &str, records: Vec<Value>) -> StoreResult<Self> {
        let collection = self.registry.collection_name(model)?;
        self.lock()?
            .collections
            .entry(collection)
            .or_default()
            .extend(records);
        Ok(self)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Records currently stored for `model`, in insertion order.
    pub fn records(&self, model: &str) -> StoreResult<Vec<Value>> {
        let collection = self.registry.collection_name(model)?;
        Ok(self
            .lock()?
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    pub fn collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.collections.keys().cloned().collect())
    }

    pub fn insert_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.inserts)
    }

    pub fn drop_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.drops)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn model_exists(&self, model: &str) -> StoreResult<bool> {
        let collection = self.registry.collection_name(model)?;
        Ok(self.lock()?.collections.contains_key(&collection))
    }

    async fn drop_collection(&self, model: &str) -> StoreResult<()> {
        let collection = self.registry.collection_name(model)?;
        let mut state = self.lock()?;
        state.collections.remove(&collection);
        state.drops += 1;
        Ok(())
    }

    fn generate_identifier(&self) -> Value {
        Value::String(Uuid::new_v4().to_string())
    }

    fn uses_generated_identifier(&self, model: &str) -> StoreResult<bool> {
        self.registry.uses_generated_identifier(model)
    }

    async fn insert(&self, model: &str, record: Map<String, Value>) -> StoreResult<Value> {
        let collection = self.registry.collection_name(model)?;
        let stored = Value::Object(record);
        let mut state = self.lock()?;
        state
            .collections
            .entry(collection)
            .or_default()
            .push(stored.clone());
        state.inserts += 1;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use seedkit_core::ModelSpec;
    use serde_json::json;

    use super::*;

    fn store() -> InMemoryStore {
        InMemoryStore::new(
            ModelRegistry::new()
                .with_model("Team", ModelSpec::new(true).with_collection("teams"))
                .with_model("Tag", ModelSpec::new(false)),
        )
    }

    #[tokio::test]
    async fn insert_and_drop() {
        let store = store();
        assert!(!store.model_exists("Team").await.unwrap());

        let record = json!({"_id": "t1", "name": "Alpha"});
        let stored = store
            .insert("Team", record.as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(stored, record);
        assert!(store.model_exists("Team").await.unwrap());
        assert_eq!(store.records("Team").unwrap(), vec![record]);
        assert_eq!(store.collection_names().unwrap(), vec!["teams"]);

        store.drop_collection("Team").await.unwrap();
        assert!(!store.model_exists("Team").await.unwrap());
        assert_eq!(store.insert_count().unwrap(), 1);
        assert_eq!(store.drop_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_model_is_rejected() {
        let store = store();
        let err = store.insert("Ghost", Map::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownModel(name) if name == "Ghost"));
    }

    #[test]
    fn generated_identifiers_are_unique_strings() {
        let store = store();
        let first = store.generate_identifier();
        let second = store.generate_identifier();
        assert!(first.is_string());
        assert_ne!(first, second);
        assert!(store.uses_generated_identifier("Team").unwrap());
        assert!(!store.uses_generated_identifier("Tag").unwrap());
    }
}
