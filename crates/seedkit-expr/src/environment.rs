use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::{ExprError, LoadError};
use crate::eval::{Scope, evaluate};
use crate::loader::DependencyLoader;
use crate::parser::parse;

/// Named values visible to expressions during one seeding run.
#[derive(Debug, Clone, Default)]
pub struct ExpressionEnvironment {
    bindings: BTreeMap<String, Value>,
}

impl ExpressionEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to the value `loader` resolves for `locator`, unless the
    /// name is already bound. Returns whether a new binding was made.
    pub async fn register_once(
        &mut self,
        name: &str,
        locator: &str,
        loader: &dyn DependencyLoader,
    ) -> Result<bool, LoadError> {
        if self.bindings.contains_key(name) {
            return Ok(false);
        }
        let value = loader.load(locator).await?;
        self.bindings.insert(name.to_string(), value);
        Ok(true)
    }

    /// Bind an already resolved value, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Evaluate `source` with `this` bound to `self_value`.
    pub fn evaluate(&self, source: &str, self_value: &Value) -> Result<Value, ExprError> {
        let expr = parse(source)?;
        evaluate(&expr, &Scope::new(&self.bindings, self_value))
    }
}
