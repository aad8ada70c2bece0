//! Application configuration.
//!
//! Settings are read from `cohortql.toml` (or an explicit path) and then from
//! `COHORTQL__SECTION__KEY` environment variables, which win over the file.
//! See [`loader::load_config`].

use cohortql_core::{CoreError, DatasetNamespace, ErrorCategory};
use cohortql_search::CompilerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod loader;

pub use loader::{ConfigOverrides, load_config, load_config_with};

pub const DEFAULT_CONFIG_FILE: &str = "cohortql.toml";
pub const ENV_PREFIX: &str = "COHORTQL";

const VALID_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Namespace(#[from] CoreError),

    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Serialize(_) => ErrorCategory::Serialization,
            _ => ErrorCategory::Configuration,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub warehouse: WarehouseSettings,
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Project and dataset that qualify every table reference.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct WarehouseSettings {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub dataset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.warehouse.project.trim().is_empty() {
            return Err(ConfigError::invalid("warehouse.project must not be empty"));
        }
        if self.warehouse.dataset.trim().is_empty() {
            return Err(ConfigError::invalid("warehouse.dataset must not be empty"));
        }
        self.namespace()?;

        if self.compiler.max_groups == 0 {
            return Err(ConfigError::invalid("compiler.max_groups must be > 0"));
        }
        if self.compiler.max_items_per_group == 0 {
            return Err(ConfigError::invalid(
                "compiler.max_items_per_group must be > 0",
            ));
        }
        if self.compiler.max_parameters_per_item == 0 {
            return Err(ConfigError::invalid(
                "compiler.max_parameters_per_item must be > 0",
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid(format!(
                "logging.level must be one of {VALID_LEVELS:?}"
            )));
        }
        Ok(())
    }

    /// The `project.dataset` namespace compiled queries are qualified with.
    pub fn namespace(&self) -> Result<DatasetNamespace> {
        Ok(DatasetNamespace::new(
            self.warehouse.project.trim(),
            self.warehouse.dataset.trim(),
        )?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
