use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{AppConfig, ConfigError, DEFAULT_CONFIG_FILE, ENV_PREFIX, Result};

/// Values supplied on the command line. Applied last, above the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `project.dataset`
    pub dataset: Option<String>,
    pub log_level: Option<String>,
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    load_config_with(path, &ConfigOverrides::default())
}

pub fn load_config_with(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<AppConfig> {
    let mut builder = Config::builder();
    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if file.exists() {
        debug!(path = %file.display(), "loading config file");
        builder = builder.add_source(File::from(file));
    }

    // e.g. COHORTQL__COMPILER__MAX_GROUPS=5
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__"),
    );

    if let Some(dataset) = overrides.dataset.as_deref() {
        let (project, dataset) = split_dataset(dataset)?;
        builder = builder
            .set_override("warehouse.project", project)?
            .set_override("warehouse.dataset", dataset)?;
    }
    if let Some(level) = overrides.log_level.as_deref() {
        builder = builder.set_override("logging.level", level)?;
    }

    let merged: AppConfig = builder.build()?.try_deserialize()?;
    merged.validate()?;
    Ok(merged)
}

/// Split a `--dataset` value into project and dataset.
fn split_dataset(value: &str) -> Result<(&str, &str)> {
    match value.trim().split_once('.') {
        Some((project, dataset)) if !project.is_empty() && !dataset.is_empty() => {
            Ok((project, dataset))
        }
        _ => Err(ConfigError::invalid(format!(
            "dataset \"{value}\": expected <project>.<dataset>"
        ))),
    }
}
