use serde::Serialize;
use serde_json::{Map, Value};

use crate::ID_FIELD;
use crate::error::ReferenceError;

/// Records inserted during a run, keyed by collection and record key.
///
/// Buckets keep insertion order. The cache only ever grows while a run is in
/// progress; every run starts from a fresh instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RecordCache {
    collections: Map<String, Value>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty bucket for `collection`.
    pub fn open_bucket(&mut self, collection: &str) {
        self.collections
            .insert(collection.to_string(), Value::Object(Map::new()));
    }

    /// Store the record returned by the store under `collection.key`.
    pub fn insert(&mut self, collection: &str, key: &str, record: Value) {
        let bucket = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(records) = bucket {
            records.insert(key.to_string(), record);
        }
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<&Value> {
        self.collection(collection)?.get(key)
    }

    pub fn collection(&self, name: &str) -> Option<&Map<String, Value>> {
        self.collections.get(name).and_then(Value::as_object)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Map<String, Value>)> {
        self.collections
            .iter()
            .filter_map(|(name, bucket)| bucket.as_object().map(|records| (name.as_str(), records)))
    }

    /// Number of collection buckets.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.iter().map(|(_, records)| records.len()).sum()
    }

    /// Resolve a dotted reference path such as `teams.t1` or `users.u1.tags.0`.
    ///
    /// A path that ends on an object yields that object's identifier; scalars,
    /// `null` and lists are returned as they are.
    pub fn find_reference(&self, path: &str) -> Result<Value, ReferenceError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();

        let mut current = self
            .collections
            .get(first)
            .ok_or_else(|| missing_segment(path, first))?;
        for segment in segments {
            current = lookup(current, segment).ok_or_else(|| missing_segment(path, segment))?;
        }

        match current {
            Value::Object(object) => match object.get(ID_FIELD) {
                Some(id) if !id.is_null() => Ok(id.clone()),
                _ => Err(ReferenceError::MissingIdentifier {
                    path: path.to_string(),
                    object: current.to_string(),
                }),
            },
            other => Ok(other.clone()),
        }
    }
}

fn lookup<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(object) => object.get(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        _ => None,
    }
}

fn missing_segment(path: &str, segment: &str) -> ReferenceError {
    ReferenceError::MissingSegment {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn seeded_cache() -> RecordCache {
        let mut cache = RecordCache::new();
        cache.open_bucket("teams");
        cache.insert(
            "teams",
            "t1",
            json!({"_id": "team-1", "name": "Alpha", "tags": ["a", "b"], "meta": {"size": 3}}),
        );
        cache
    }

    #[test]
    fn object_reference_yields_identifier() {
        let cache = seeded_cache();
        assert_eq!(cache.find_reference("teams.t1").unwrap(), json!("team-1"));
    }

    #[test]
    fn scalar_and_list_targets_are_returned_raw() {
        let cache = seeded_cache();
        assert_eq!(cache.find_reference("teams.t1.name").unwrap(), json!("Alpha"));
        assert_eq!(cache.find_reference("teams.t1.tags").unwrap(), json!(["a", "b"]));
        assert_eq!(cache.find_reference("teams.t1.tags.1").unwrap(), json!("b"));
    }

    #[test]
    fn unknown_first_segment_names_it() {
        let cache = seeded_cache();
        let err = cache.find_reference("missing.x").unwrap_err();
        assert_eq!(err.segment(), Some("missing"));
    }

    #[test]
    fn unknown_inner_segment_names_it() {
        let cache = seeded_cache();
        let err = cache.find_reference("teams.t2.name").unwrap_err();
        assert_eq!(err.segment(), Some("t2"));

        let err = cache.find_reference("teams.t1.name.first").unwrap_err();
        assert_eq!(err.segment(), Some("first"));
    }

    #[test]
    fn object_without_identifier_fails() {
        let cache = seeded_cache();
        let err = cache.find_reference("teams.t1.meta").unwrap_err();
        assert!(matches!(err, ReferenceError::MissingIdentifier { .. }));

        let err = cache.find_reference("teams").unwrap_err();
        assert!(matches!(err, ReferenceError::MissingIdentifier { .. }));
    }

    #[test]
    fn buckets_keep_insertion_order() {
        let mut cache = seeded_cache();
        cache.insert("teams", "t0", json!({"_id": "team-0"}));
        let keys: Vec<&String> = cache.collection("teams").unwrap().keys().collect();
        assert_eq!(keys, vec!["t1", "t0"]);
        assert_eq!(cache.record_count(), 2);
    }

    #[test]
    fn insert_without_open_bucket_creates_it() {
        let mut cache = RecordCache::new();
        cache.insert("users", "u1", json!({"_id": "user-1"}));
        cache.insert("users", "u2", json!({"_id": "user-2"}));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("users", "u2"), Some(&json!({"_id": "user-2"})));
        assert_eq!(cache.find_reference("users.u1").unwrap(), json!("user-1"));
    }
}
