mod logging;
mod redaction;
mod run;

pub use logging::{init_console_logging, init_run_logging};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use run::{RunContext, start_run, write_cache, write_json, write_report};

use thiserror::Error;

/// Errors raised while writing run artifacts.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
