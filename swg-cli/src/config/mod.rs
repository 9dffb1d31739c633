//! Configuration module for swg-propensity.
//!
//! Handles loading configuration from TOML files and CLI arguments.

pub mod file;

use crate::config::file::{FileConfig, PageConfig};
use std::path::Path;
use std::time::Duration;
use swg_core::config::{ClientConfig, PropensityServerConfig};
use swg_core::context::StaticDocument;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid url: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration result containing all parts.
#[derive(Debug)]
pub struct LoadedConfig {
    pub server: PropensityServerConfig,
    pub client: ClientConfig,
    pub document: StaticDocument,
    pub timeout: Option<Duration>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    enable_override: Option<bool>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, enable_override: Option<bool>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            enable_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    fn load_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(enable) = self.enable_override {
            file_config.propensity.enable = enable;
        }

        validate(&file_config)?;
        build_loaded_config(file_config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.page.publication_id.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "page.publication_id must not be empty".to_string(),
        ));
    }
    if config.page.hostname.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "page.hostname must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let propensity = file_config.propensity;
    let mut server = PropensityServerConfig::new(file_config.page.publication_id.clone())?;
    if let Some(base_url) = propensity.base_url {
        server = server.with_base_url(base_url);
    }
    if let Some(version) = propensity.version {
        server.version = version;
    }

    Ok(LoadedConfig {
        server,
        client: ClientConfig {
            enable_propensity: propensity.enable,
        },
        document: convert_page(file_config.page),
        timeout: propensity.timeout_secs.map(Duration::from_secs),
    })
}

fn convert_page(page: PageConfig) -> StaticDocument {
    let document = StaticDocument::new(page.hostname)
        .with_cookie(page.cookie)
        .with_referrer(page.referrer);
    match page.timezone_offset_minutes {
        Some(minutes) => document.with_timezone_offset(minutes),
        None => document,
    }
}
