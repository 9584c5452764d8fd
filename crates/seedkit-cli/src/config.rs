use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use seedkit_core::ModelRegistry;
use seedkit_engine::SeedOptions;
use seedkit_expr::Capabilities;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("capability '{name}' could not be converted: {source}")]
    Capability {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("capability file {path} is not valid JSON: {source}")]
    CapabilityFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Contents of `seedkit.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedConfig {
    #[serde(default)]
    pub seed: SeedOptions,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub models: ModelRegistry,
    /// Dependency values declared inline, keyed by locator.
    #[serde(default)]
    pub capabilities: BTreeMap<String, toml::Value>,
    /// Dependency values read from JSON files, keyed by locator.
    #[serde(default)]
    pub capability_files: BTreeMap<String, PathBuf>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

fn default_schema() -> String {
    seedkit_postgres::DEFAULT_SCHEMA.to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

impl SeedConfig {
    /// Read a config file; relative capability file paths resolve against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Build the capability map handed to the seeder.
    pub fn capabilities(&self) -> Result<Capabilities, ConfigError> {
        let mut capabilities = Capabilities::new();

        for (name, value) in &self.capabilities {
            let value = serde_json::to_value(value).map_err(|source| ConfigError::Capability {
                name: name.clone(),
                source,
            })?;
            capabilities.insert(name.clone(), value);
        }

        for (name, file) in &self.capability_files {
            let path = self.base_dir.join(file);
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let value = serde_json::from_str(&contents)
                .map_err(|source| ConfigError::CapabilityFile { path, source })?;
            capabilities.insert(name.clone(), value);
        }

        Ok(capabilities)
    }
}
