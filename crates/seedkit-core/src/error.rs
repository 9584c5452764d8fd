use thiserror::Error;

/// The seed document does not have the expected shape.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("seed document must be a JSON object")]
    NotAnObject,
    #[error("collection '{collection}' must be a JSON object")]
    InvalidCollection { collection: String },
    #[error("record '{collection}.{record}' must be a JSON object")]
    InvalidRecord { collection: String, record: String },
    #[error("invalid dependency declaration: {0}")]
    InvalidDependencies(String),
}

/// A reference path could not be resolved against the record cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// A path segment does not exist in the cache (yet).
    #[error("could not read property \"{segment}\" of reference '{path}'")]
    MissingSegment { path: String, segment: String },
    /// The path ends on an object that carries no identifier.
    #[error("cannot infer identifier for reference '{path}' from object without one: {object}")]
    MissingIdentifier { path: String, object: String },
}

impl ReferenceError {
    /// Full reference path that failed.
    pub fn path(&self) -> &str {
        match self {
            ReferenceError::MissingSegment { path, .. }
            | ReferenceError::MissingIdentifier { path, .. } => path,
        }
    }

    /// Segment that could not be read, if the failure was a missing segment.
    pub fn segment(&self) -> Option<&str> {
        match self {
            ReferenceError::MissingSegment { segment, .. } => Some(segment),
            ReferenceError::MissingIdentifier { .. } => None,
        }
    }
}

/// Failures reported by a store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("store rejected record for model '{model}': {message}")]
    Rejected { model: String, message: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap an adapter-specific error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
