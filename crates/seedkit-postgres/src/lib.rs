//! PostgreSQL store for seedkit.
//!
//! Every collection maps to a table holding one JSONB document per record.

mod queries;
pub mod store;

pub use queries::quote_ident;
pub use store::{DEFAULT_SCHEMA, PostgresStore};
