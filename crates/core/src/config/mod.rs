//! Configuration module for the bizreg system
//!
//! Configuration can be loaded from a TOML file and/or environment variables.
//! Every section has defaults, so an empty file is a valid configuration.

mod defaults;
mod loading;


use crate::error::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use defaults::*;

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.bizreg/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".bizreg").join("config.toml"))
}

/// Main configuration structure for the bizreg system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Computer-use agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Registry search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Plain LLM configuration (JSON extraction, classification, validation)
    #[serde(default)]
    pub models: ModelsConfig,
}

/// Computer-use agent configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent model name; must appear in the agent model table
    #[serde(default = "default_agent_model")]
    pub model: String,

    /// System instructions overriding the generated browser-assistant prompt
    #[serde(default)]
    pub instructions: Option<String>,

    /// Provider API key (falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Provider base URL override
    #[serde(default)]
    pub base_url: Option<String>,

    /// Step budget per task execution
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Minimum delay before every individual action
    #[serde(default = "default_wait_between_actions_ms")]
    pub wait_between_actions_ms: u64,

    /// Minimum delay before every step, when set
    #[serde(default)]
    pub wait_between_steps_ms: Option<u64>,

    /// Timeout for a single provider HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model", &self.model)
            .field("instructions", &self.instructions)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("max_steps", &self.max_steps)
            .field("wait_between_actions_ms", &self.wait_between_actions_ms)
            .field("wait_between_steps_ms", &self.wait_between_steps_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_agent_model(),
            instructions: None,
            api_key: None,
            base_url: None,
            max_steps: default_max_steps(),
            wait_between_actions_ms: default_wait_between_actions_ms(),
            wait_between_steps_ms: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Registry search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// State whose business registry is searched
    #[serde(default = "default_state")]
    pub state: String,

    /// Entry page of the registry's online entity search
    #[serde(default = "default_registry_url")]
    pub registry_url: String,

    /// Maximum number of search attempts along one search path
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Delay after navigation before the agent starts
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            state: default_state(),
            registry_url: default_registry_url(),
            max_depth: default_max_depth(),
            settle_ms: default_settle_ms(),
        }
    }
}

/// Plain LLM configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// OpenAI API key (falls back to OPENAI_API_KEY)
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// OpenAI base URL override
    #[serde(default)]
    pub openai_base_url: Option<String>,

    /// Model used to reformat prose into JSON
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,

    /// Web-search model used by the classification gate
    #[serde(default = "default_classification_model")]
    pub classification_model: String,

    /// Completion model used by the validation gate
    #[serde(default = "default_validation_model")]
    pub validation_model: String,

    /// Sampling temperature for gate prompts
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl std::fmt::Debug for ModelsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelsConfig")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("extraction_model", &self.extraction_model)
            .field("classification_model", &self.classification_model)
            .field("validation_model", &self.validation_model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: None,
            extraction_model: default_extraction_model(),
            classification_model: default_classification_model(),
            validation_model: default_validation_model(),
            temperature: default_temperature(),
        }
    }
}

impl ModelsConfig {
    pub fn resolve_openai_api_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.agent.model.trim().is_empty() {
            return Err(Error::config("agent.model must not be empty".to_string()));
        }

        if self.agent.max_steps == 0 {
            return Err(Error::config(
                "agent.max_steps must be greater than 0".to_string(),
            ));
        }

        if self.agent.request_timeout_secs == 0 {
            return Err(Error::config(
                "agent.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.search.max_depth == 0 {
            return Err(Error::config(
                "search.max_depth must be greater than 0".to_string(),
            ));
        }

        if self.search.registry_url.trim().is_empty() {
            return Err(Error::config(
                "search.registry_url must not be empty".to_string(),
            ));
        }

        for (key, value) in [
            ("models.extraction_model", &self.models.extraction_model),
            ("models.classification_model", &self.models.classification_model),
            ("models.validation_model", &self.models.validation_model),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(format!("{key} must not be empty")));
            }
        }

        if !(0.0..=2.0).contains(&self.models.temperature) {
            return Err(Error::config(format!(
                "models.temperature must be between 0.0 and 2.0 (got {})",
                self.models.temperature
            )));
        }

        Ok(())
    }

    /// Saves configuration to a TOML file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, toml_string)
            .context(format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }
}
