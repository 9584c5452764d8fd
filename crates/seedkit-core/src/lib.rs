//! Core contracts and helpers for seedkit.
//!
//! This crate defines the seed document model, the record cache that backs
//! reference resolution, and the store contract implemented by adapters.

pub mod cache;
pub mod document;
pub mod error;
pub mod store;

pub use cache::RecordCache;
pub use document::{CollectionBlock, DEPENDENCIES_KEY, MODEL_KEY, SeedDocument};
pub use error::{DocumentError, ReferenceError, StoreError, StoreResult};
pub use store::{ModelRegistry, ModelSpec, Store};

/// Field that carries a record's identifier.
pub const ID_FIELD: &str = "_id";

/// Marker that turns a string value into a reference path.
pub const REFERENCE_MARKER: &str = "->";

/// Marker that turns a string value into an expression.
pub const EXPRESSION_MARKER: char = '=';
