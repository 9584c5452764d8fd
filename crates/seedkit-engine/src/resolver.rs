use serde_json::{Map, Value};

use seedkit_core::{EXPRESSION_MARKER, REFERENCE_MARKER, RecordCache};
use seedkit_expr::{ExprError, ExpressionEnvironment};

use crate::errors::SeedError;

/// Expression that failed to evaluate and was kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionFailure {
    pub expression: String,
    pub error: ExprError,
}

/// Turns a record declaration into the record handed to the store.
///
/// String values are interpreted in this order:
/// 1. containing `=`: an expression over the text after the first character,
///    with `this` bound to the enclosing object;
/// 2. containing `->`: a reference path after the first `->`, resolved
///    against the cache;
/// 3. anything else is kept as is.
///
/// Objects are resolved recursively with themselves as the enclosing object;
/// list elements are resolved against the object holding the list.
pub struct ValueResolver<'r> {
    cache: &'r RecordCache,
    env: &'r ExpressionEnvironment,
    strict: bool,
    failures: Vec<ExpressionFailure>,
}

impl<'r> ValueResolver<'r> {
    pub fn new(cache: &'r RecordCache, env: &'r ExpressionEnvironment) -> Self {
        Self {
            cache,
            env,
            strict: false,
            failures: Vec::new(),
        }
    }

    /// Fail on expression errors instead of keeping the declared text.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolve every field of a record declaration. The declaration is left
    /// untouched; a new object is returned.
    pub fn resolve_record(
        &mut self,
        declaration: &Map<String, Value>,
    ) -> Result<Map<String, Value>, SeedError> {
        let this = Value::Object(declaration.clone());
        self.unwind(&this, declaration)
    }

    /// Resolve one value found inside `parent`, which expressions see as
    /// `this`.
    pub fn resolve(&mut self, parent: &Value, value: &Value) -> Result<Value, SeedError> {
        match value {
            Value::Object(fields) => self.unwind(value, fields).map(Value::Object),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(parent, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::String(text) if text.contains(EXPRESSION_MARKER) => {
                self.evaluate(parent, text)
            }
            Value::String(text) => match text.split_once(REFERENCE_MARKER) {
                Some((_, path)) => Ok(self.cache.find_reference(path)?),
                None => Ok(value.clone()),
            },
            other => Ok(other.clone()),
        }
    }

    pub fn failures(&self) -> &[ExpressionFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<ExpressionFailure> {
        self.failures
    }

    /// `this` is `fields` as a JSON object.
    fn unwind(
        &mut self,
        this: &Value,
        fields: &Map<String, Value>,
    ) -> Result<Map<String, Value>, SeedError> {
        let mut resolved = Map::with_capacity(fields.len());
        for (key, value) in fields {
            resolved.insert(key.clone(), self.resolve(this, value)?);
        }
        Ok(resolved)
    }

    fn evaluate(&mut self, this: &Value, text: &str) -> Result<Value, SeedError> {
        let mut chars = text.chars();
        chars.next();
        let source = chars.as_str();

        match self.env.evaluate(source, this) {
            Ok(value) => Ok(value),
            Err(source_err) if self.strict => Err(SeedError::Expression {
                expression: source.to_string(),
                source: source_err,
            }),
            Err(error) => {
                self.failures.push(ExpressionFailure {
                    expression: source.to_string(),
                    error,
                });
                Ok(Value::String(text.to_string()))
            }
        }
    }
}
