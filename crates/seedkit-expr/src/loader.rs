use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::LoadError;

/// Source of values named by a seed document's dependency declaration.
#[async_trait]
pub trait DependencyLoader: Send + Sync {
    /// Resolve `locator` to a value.
    async fn load(&self, locator: &str) -> Result<Value, LoadError>;
}

/// Pre-resolved values injected by the caller, keyed by locator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    values: BTreeMap<String, Value>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: impl Into<String>, value: Value) -> Self {
        self.insert(locator, value);
        self
    }

    pub fn insert(&mut self, locator: impl Into<String>, value: Value) {
        self.values.insert(locator.into(), value);
    }

    pub fn get(&self, locator: &str) -> Option<&Value> {
        self.values.get(locator)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for Capabilities {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl DependencyLoader for Capabilities {
    async fn load(&self, locator: &str) -> Result<Value, LoadError> {
        self.values
            .get(locator)
            .cloned()
            .ok_or_else(|| LoadError::UnknownLocator(locator.to_string()))
    }
}
