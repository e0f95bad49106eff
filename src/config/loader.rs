//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(
        "Validation failed: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    Validation(Vec<ValidationError>),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = load_config_str(&content)?;
    tracing::info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn load_config_str(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
