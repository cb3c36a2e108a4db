//! Error types for agent operations

use crate::types::AgentType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Unknown model name: {0}")]
    UnknownModel(String),

    #[error("Unknown agent type: {0}")]
    UnknownAgentType(String),

    #[error("API key not configured for {provider}")]
    MissingApiKey { provider: AgentType },

    #[error("{provider} agent execution failed: {detail}")]
    Execution { provider: AgentType, detail: String },

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Browser environment error: {0}")]
    Environment(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    pub fn execution(provider: AgentType, detail: impl Into<String>) -> Self {
        Self::Execution {
            provider,
            detail: detail.into(),
        }
    }

    pub fn environment(detail: impl Into<String>) -> Self {
        Self::Environment(detail.into())
    }

    /// Whether the failure came from the provider or the path to it
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Execution { .. } | Self::MissingApiKey { .. })
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
