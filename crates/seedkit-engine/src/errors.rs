use thiserror::Error;

use seedkit_core::{DocumentError, ReferenceError, StoreError};
use seedkit_expr::{ExprError, LoadError};

/// Errors that abort a seeding run.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("usage error: {0}")]
    Usage(String),
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),
    #[error(
        "collection '{collection}' has no _model property describing which model should be used"
    )]
    MissingModel { collection: String },
    #[error("failed to load dependency '{name}': {source}")]
    DependencyLoad {
        name: String,
        #[source]
        source: LoadError,
    },
    #[error("reference target not found: {0}")]
    ReferenceNotFound(#[from] ReferenceError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("expression '{expression}' failed: {source}")]
    Expression {
        expression: String,
        #[source]
        source: ExprError,
    },
}

impl SeedError {
    /// Stable short name used in logs and reports.
    pub fn code(&self) -> &'static str {
        match self {
            SeedError::Usage(_) => "usage",
            SeedError::InvalidDocument(_) => "invalid_document",
            SeedError::MissingModel { .. } => "missing_model",
            SeedError::DependencyLoad { .. } => "dependency_load",
            SeedError::ReferenceNotFound(_) => "reference_not_found",
            SeedError::Store(_) => "store",
            SeedError::Expression { .. } => "expression",
        }
    }
}
