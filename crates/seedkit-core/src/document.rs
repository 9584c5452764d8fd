//! Ordered, owned view of a seed document.

use serde_json::{Map, Value};

use crate::error::DocumentError;

/// Root key holding the dependency declaration.
pub const DEPENDENCIES_KEY: &str = "_dependencies";

/// Collection block key naming the model its records belong to.
pub const MODEL_KEY: &str = "_model";

/// One named group of records sharing a model.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionBlock {
    pub key: String,
    /// `None` when the block did not declare a (string) `_model`.
    pub model: Option<String>,
    pub records: Vec<(String, Map<String, Value>)>,
}

/// Parsed seed document.
///
/// Parsing copies everything out of the source value, so the caller's input is
/// never touched. Reserved keys are stripped here and never reach the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedDocument {
    /// Symbolic name to locator, in declaration order.
    pub dependencies: Vec<(String, String)>,
    pub collections: Vec<CollectionBlock>,
}

impl SeedDocument {
    pub fn from_value(value: &Value) -> Result<Self, DocumentError> {
        let root = value.as_object().ok_or(DocumentError::NotAnObject)?;

        let mut document = SeedDocument::default();
        for (key, value) in root {
            if key == DEPENDENCIES_KEY {
                document.dependencies = parse_dependencies(value)?;
                continue;
            }
            document.collections.push(parse_collection(key, value)?);
        }

        Ok(document)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(contents)?;
        Self::from_value(&value)
    }

    /// Total number of record declarations across all collections.
    pub fn record_count(&self) -> usize {
        self.collections
            .iter()
            .map(|collection| collection.records.len())
            .sum()
    }
}

fn parse_dependencies(value: &Value) -> Result<Vec<(String, String)>, DocumentError> {
    let entries = value.as_object().ok_or_else(|| {
        DocumentError::InvalidDependencies(format!("'{DEPENDENCIES_KEY}' must be an object"))
    })?;

    entries
        .iter()
        .map(|(name, locator)| {
            let locator = locator.as_str().ok_or_else(|| {
                DocumentError::InvalidDependencies(format!(
                    "locator for '{name}' must be a string"
                ))
            })?;
            Ok((name.clone(), locator.to_string()))
        })
        .collect()
}

fn parse_collection(key: &str, value: &Value) -> Result<CollectionBlock, DocumentError> {
    let block = value
        .as_object()
        .ok_or_else(|| DocumentError::InvalidCollection {
            collection: key.to_string(),
        })?;

    let mut model = None;
    let mut records = Vec::with_capacity(block.len());
    for (record_key, declaration) in block {
        if record_key == MODEL_KEY {
            model = declaration.as_str().map(str::to_string);
            continue;
        }
        let declaration = declaration
            .as_object()
            .ok_or_else(|| DocumentError::InvalidRecord {
                collection: key.to_string(),
                record: record_key.clone(),
            })?;
        records.push((record_key.clone(), declaration.clone()));
    }

    Ok(CollectionBlock {
        key: key.to_string(),
        model,
        records,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn preserves_declaration_order() {
        let document = SeedDocument::from_value(&json!({
            "zebras": {"_model": "zebras", "z2": {"n": 2}, "z1": {"n": 1}},
            "apes": {"_model": "apes", "a1": {"n": 3}}
        }))
        .expect("parse document");

        let collections: Vec<&str> = document
            .collections
            .iter()
            .map(|block| block.key.as_str())
            .collect();
        assert_eq!(collections, vec!["zebras", "apes"]);

        let zebras: Vec<&str> = document.collections[0]
            .records
            .iter()
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(zebras, vec!["z2", "z1"]);
    }

    #[test]
    fn strips_reserved_keys() {
        let source = json!({
            "_dependencies": {"company": "acme"},
            "teams": {"_model": "teams", "t1": {"name": "Alpha"}}
        });
        let document = SeedDocument::from_value(&source).expect("parse document");

        assert_eq!(
            document.dependencies,
            vec![("company".to_string(), "acme".to_string())]
        );
        assert_eq!(document.collections.len(), 1);
        assert_eq!(document.collections[0].model.as_deref(), Some("teams"));
        assert!(
            document.collections[0]
                .records
                .iter()
                .all(|(key, _)| key != MODEL_KEY)
        );
        assert!(source.get(DEPENDENCIES_KEY).is_some(), "input must not change");
    }

    #[test]
    fn missing_model_is_kept_as_none() {
        let document = SeedDocument::from_value(&json!({
            "teams": {"t1": {"name": "Alpha"}}
        }))
        .expect("parse document");
        assert_eq!(document.collections[0].model, None);
    }

    #[test]
    fn rejects_non_object_shapes() {
        assert!(matches!(
            SeedDocument::from_value(&json!([1, 2])),
            Err(DocumentError::NotAnObject)
        ));
        assert!(matches!(
            SeedDocument::from_value(&json!({"teams": "nope"})),
            Err(DocumentError::InvalidCollection { .. })
        ));
        assert!(matches!(
            SeedDocument::from_value(&json!({"teams": {"_model": "teams", "t1": 4}})),
            Err(DocumentError::InvalidRecord { .. })
        ));
        assert!(matches!(
            SeedDocument::from_value(&json!({"_dependencies": {"x": 1}})),
            Err(DocumentError::InvalidDependencies(_))
        ));
    }
}
