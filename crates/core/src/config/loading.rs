//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `BIZREG_` and use double underscores
    /// for nested values. For example:
    /// - `BIZREG_SEARCH__MAX_DEPTH=3`
    /// - `BIZREG_AGENT__MODEL=computer-use-preview-2025-03-11`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        // Agent defaults
        let builder = set_config_default(builder, "agent.model", default_agent_model())?;
        let builder =
            set_config_default(builder, "agent.max_steps", default_max_steps() as i64)?;
        let builder = set_config_default(
            builder,
            "agent.wait_between_actions_ms",
            default_wait_between_actions_ms() as i64,
        )?;
        let builder = set_config_default(
            builder,
            "agent.request_timeout_secs",
            default_request_timeout_secs() as i64,
        )?;

        // Search defaults
        let builder = set_config_default(builder, "search.state", default_state())?;
        let builder = set_config_default(builder, "search.registry_url", default_registry_url())?;
        let builder =
            set_config_default(builder, "search.max_depth", default_max_depth() as i64)?;
        let builder = set_config_default(builder, "search.settle_ms", default_settle_ms() as i64)?;

        // Model defaults
        let builder = set_config_default(
            builder,
            "models.extraction_model",
            default_extraction_model(),
        )?;
        let builder = set_config_default(
            builder,
            "models.classification_model",
            default_classification_model(),
        )?;
        let builder = set_config_default(
            builder,
            "models.validation_model",
            default_validation_model(),
        )?;
        let mut builder = set_config_default(
            builder,
            "models.temperature",
            f64::from(default_temperature()),
        )?;

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        // Add environment variables with BIZREG_ prefix
        builder = builder.add_source(
            Environment::with_prefix("BIZREG")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from a single file
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.bizreg/config.toml or custom --config path)
    /// 3. Environment variables (BIZREG_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
