//! How provider calls leave the process
//!
//! Every agent and LLM call goes through a [`ProviderTransport`]. The default
//! [`DirectTransport`] speaks HTTP to the provider; a remote handler built with
//! [`remote_handler`] lets the same request bodies be proxied through another
//! service without the call sites knowing.

use crate::error::{AgentError, Result};
use crate::types::{AgentType, ClientOptions};
use async_trait::async_trait;
use bizreg_core::truncate_for_error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::Display;
use tracing::{debug, warn};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider API endpoint a request body targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Endpoint {
    /// OpenAI Responses API
    Responses,
    /// OpenAI Chat Completions API
    ChatCompletions,
    /// Anthropic Messages API
    Messages,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Responses => "responses",
            Self::ChatCompletions => "chat/completions",
            Self::Messages => "messages",
        }
    }
}

/// A provider call: which provider, which endpoint, connection options and the request body
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    pub provider: AgentType,
    pub endpoint: Endpoint,
    pub client_options: ClientOptions,
    pub body: Value,
}

/// Sends provider requests and returns the provider's JSON response
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<Value>;
}

/// Adapt a closure into a transport so provider calls can be delegated to an external process.
///
/// # Example
/// ```
/// use bizreg_agent::{remote_handler, ProviderRequest};
/// use serde_json::json;
///
/// let handler = remote_handler(|request: ProviderRequest| async move {
///     // forward request.provider / request.body to a backend service here
///     Ok(json!({"content": [], "echo": request.provider.to_string()}))
/// });
/// # let _ = handler;
/// ```
pub fn remote_handler<F, Fut>(handler: F) -> Arc<dyn ProviderTransport>
where
    F: Fn(ProviderRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnTransport(handler))
}

struct FnTransport<F>(F);

#[async_trait]
impl<F, Fut> ProviderTransport for FnTransport<F>
where
    F: Fn(ProviderRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn send(&self, request: ProviderRequest) -> Result<Value> {
        (self.0)(request).await
    }
}

/// Direct HTTP connection to the provider APIs
#[derive(Debug, Clone)]
pub struct DirectTransport {
    client: Client,
}

impl DirectTransport {
    /// Create a new direct transport
    ///
    /// # Arguments
    /// * `timeout` - Per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn default_base_url(provider: AgentType) -> &'static str {
        match provider {
            AgentType::OpenAi => OPENAI_API_BASE,
            AgentType::Anthropic => ANTHROPIC_API_BASE,
        }
    }

    fn endpoint_url(options: &ClientOptions, provider: AgentType, endpoint: Endpoint) -> String {
        let base = options
            .base_url()
            .unwrap_or_else(|| Self::default_base_url(provider));
        format!("{}/{}", base.trim_end_matches('/'), endpoint.path())
    }

    fn resolve_api_key(options: &ClientOptions, provider: AgentType) -> Result<String> {
        options
            .api_key()
            .map(str::to_string)
            .or_else(|| std::env::var(provider.api_key_env_var()).ok())
            .filter(|key| !key.is_empty())
            .ok_or(AgentError::MissingApiKey { provider })
    }

    /// Remove a body-level `betas` list; the Messages API takes it as a header
    fn take_betas(body: &mut Value) -> Option<String> {
        let betas = body.as_object_mut()?.remove("betas")?;
        let joined = betas
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(",");
        (!joined.is_empty()).then_some(joined)
    }
}

#[async_trait]
impl ProviderTransport for DirectTransport {
    async fn send(&self, request: ProviderRequest) -> Result<Value> {
        let ProviderRequest {
            provider,
            endpoint,
            client_options,
            mut body,
        } = request;

        let url = Self::endpoint_url(&client_options, provider, endpoint);
        let api_key = Self::resolve_api_key(&client_options, provider)?;

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        builder = match provider {
            AgentType::OpenAi => builder.bearer_auth(api_key),
            AgentType::Anthropic => {
                let mut builder = builder
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION);
                if let Some(betas) = Self::take_betas(&mut body) {
                    builder = builder.header("anthropic-beta", betas);
                }
                builder
            }
        };

        debug!("POST {url} ({provider} {endpoint})");

        let response = builder.json(&body).send().await.map_err(|e| {
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connection"
            } else if e.is_request() {
                "request build"
            } else if e.is_body() {
                "body"
            } else {
                "unknown"
            };
            warn!("{provider} {endpoint} request failed ({error_kind}): {e}");
            AgentError::execution(provider, format!("{error_kind} error: {e}"))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AgentError::execution(provider, format!("Failed to read response body: {e}"))
        })?;

        if !status.is_success() {
            return Err(AgentError::execution(
                provider,
                format!("HTTP {status}: {}", truncate_for_error(&text)),
            ));
        }

        serde_json::from_str(&text).map_err(|e| {
            AgentError::execution(
                provider,
                format!(
                    "Invalid JSON response: {e}. Response: {}",
                    truncate_for_error(&text)
                ),
            )
        })
    }
}
