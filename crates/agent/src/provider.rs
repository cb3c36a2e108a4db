//! Model-name based resolution of agent clients

use crate::client::{AgentClient, AnthropicAgentClient, ClientSettings, OpenAiAgentClient};
use crate::error::{AgentError, Result};
use crate::transport::{DirectTransport, ProviderTransport};
use crate::types::{AgentType, ClientOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Every supported agent model and the API it speaks.
///
/// Lookups never fall back to a default provider: a request shaped for the
/// wrong provider fails in ways that are hard to diagnose.
const MODEL_AGENT_TYPES: &[(&str, AgentType)] = &[
    ("computer-use-preview-2025-02-04", AgentType::OpenAi),
    ("computer-use-preview-2025-03-11", AgentType::OpenAi),
    ("claude-3-5-sonnet-20240620", AgentType::Anthropic),
    ("claude-3-5-sonnet-20241022", AgentType::Anthropic),
    ("claude-3-7-sonnet-20250219", AgentType::Anthropic),
];

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Names of every model [`AgentProvider`] can build a client for
pub fn supported_models() -> impl Iterator<Item = &'static str> {
    MODEL_AGENT_TYPES.iter().map(|(model, _)| *model)
}

/// Builds the [`AgentClient`] variant matching a model name
#[derive(Debug, Clone)]
pub struct AgentProvider {
    request_timeout: Duration,
}

impl Default for AgentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentProvider {
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Timeout applied to the direct transport when no remote handler is supplied
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolve the agent type for a model name
    pub fn agent_type(model_name: &str) -> Result<AgentType> {
        MODEL_AGENT_TYPES
            .iter()
            .find(|(model, _)| *model == model_name)
            .map(|(_, agent_type)| *agent_type)
            .ok_or_else(|| AgentError::UnknownModel(model_name.to_string()))
    }

    /// Build a client for `model_name`.
    ///
    /// # Arguments
    /// * `client_options` - Provider connection options (API key, base URL, ...)
    /// * `instructions` - System instructions for the agent
    /// * `remote_handler` - Transport used instead of a direct provider connection
    pub fn get_client(
        &self,
        model_name: &str,
        client_options: Option<ClientOptions>,
        instructions: Option<String>,
        remote_handler: Option<Arc<dyn ProviderTransport>>,
    ) -> Result<AgentClient> {
        let agent_type = Self::agent_type(model_name)?;
        info!("Getting agent client for type: {agent_type}, model: {model_name}");

        self.build_client(
            agent_type,
            model_name,
            client_options.unwrap_or_default(),
            instructions,
            remote_handler,
        )
        .inspect_err(|e| error!("Error creating agent client: {e}"))
    }

    fn build_client(
        &self,
        agent_type: AgentType,
        model_name: &str,
        client_options: ClientOptions,
        instructions: Option<String>,
        remote_handler: Option<Arc<dyn ProviderTransport>>,
    ) -> Result<AgentClient> {
        let transport = match remote_handler {
            Some(handler) => handler,
            None => Arc::new(DirectTransport::new(self.request_timeout)?),
        };

        let settings = ClientSettings {
            model_name: model_name.to_string(),
            instructions,
            client_options,
            transport,
        };

        Ok(match agent_type {
            AgentType::OpenAi => AgentClient::OpenAi(OpenAiAgentClient::new(settings)),
            AgentType::Anthropic => AgentClient::Anthropic(AnthropicAgentClient::new(settings)),
        })
    }
}
