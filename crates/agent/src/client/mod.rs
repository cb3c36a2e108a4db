//! Agent client variants and the step loop they share
//!
//! Each variant only knows its provider's wire format (building a request
//! body from the conversation, reading a response into a [`Turn`], appending
//! observations). Pacing, action execution, screenshots and the step budget
//! live in [`run_task`] so both variants behave identically.

mod anthropic;
mod openai;

pub use anthropic::AnthropicAgentClient;
pub use openai::OpenAiAgentClient;

use crate::environment::{BrowserEnvironment, Viewport};
use crate::error::{AgentError, Result};
use crate::transport::{Endpoint, ProviderRequest, ProviderTransport};
use crate::types::{
    AgentAction, AgentType, ClientOptions, TaskExecutionRequest, TaskExecutionResult, Usage,
};
use bizreg_core::truncate_for_error;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

pub(crate) const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that can use a web browser. \
Do not ask follow up questions, the user will trust your judgement.";

/// Connection settings shared by every variant
#[derive(Clone)]
pub(crate) struct ClientSettings {
    pub model_name: String,
    pub instructions: Option<String>,
    pub client_options: ClientOptions,
    pub transport: Arc<dyn ProviderTransport>,
}

impl ClientSettings {
    pub fn instructions(&self) -> &str {
        self.instructions
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("model_name", &self.model_name)
            .field("instructions", &self.instructions)
            .field("client_options", &self.client_options)
            .finish_non_exhaustive()
    }
}

/// An action requested by the model, keyed by the provider's call id
#[derive(Debug)]
pub(crate) struct ToolCall {
    pub id: String,
    /// `Err` holds the reason an action could not be mapped to [`AgentAction`]
    pub action: std::result::Result<AgentAction, String>,
    pub pending_safety_checks: Vec<Value>,
}

/// One parsed provider response
#[derive(Debug, Default)]
pub(crate) struct Turn {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Result of executing one [`ToolCall`], reported back on the next step
#[derive(Debug, Clone)]
pub(crate) struct Observation {
    pub call_id: String,
    pub screenshot: String,
    pub current_url: String,
    pub error: Option<String>,
    pub acknowledged_safety_checks: Vec<Value>,
}

/// Provider-specific half of a computer-use conversation
pub(crate) trait StepProtocol: Send + Sync {
    type Conversation: Send;

    fn agent_type(&self) -> AgentType;

    fn settings(&self) -> &ClientSettings;

    fn endpoint(&self) -> Endpoint;

    fn start(&self, instruction: &str) -> Self::Conversation;

    fn request_body(&self, conversation: &Self::Conversation, viewport: Viewport) -> Value;

    fn parse_turn(&self, conversation: &mut Self::Conversation, response: &Value) -> Result<Turn>;

    fn record_observations(
        &self,
        conversation: &mut Self::Conversation,
        observations: Vec<Observation>,
    );
}

/// Computer-use agent for one of the supported providers
#[derive(Debug, Clone)]
pub enum AgentClient {
    OpenAi(OpenAiAgentClient),
    Anthropic(AnthropicAgentClient),
}

impl AgentClient {
    pub fn agent_type(&self) -> AgentType {
        match self {
            Self::OpenAi(_) => AgentType::OpenAi,
            Self::Anthropic(_) => AgentType::Anthropic,
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            Self::OpenAi(client) => &client.settings().model_name,
            Self::Anthropic(client) => &client.settings().model_name,
        }
    }

    /// Run the request against `environment` until the model stops issuing
    /// actions or the step budget runs out.
    ///
    /// Provider and transport failures surface as [`AgentError::Execution`];
    /// a browser that cannot produce a screenshot surfaces as
    /// [`AgentError::Environment`].
    pub async fn execute(
        &self,
        environment: &dyn BrowserEnvironment,
        request: &TaskExecutionRequest,
    ) -> Result<TaskExecutionResult> {
        match self {
            Self::OpenAi(client) => run_task(client, environment, request).await,
            Self::Anthropic(client) => run_task(client, environment, request).await,
        }
    }
}

/// Both providers report failures as an `error` object in an otherwise normal body
fn check_error_response(provider: AgentType, response: &Value) -> Result<()> {
    let is_error_type = response.get("type").and_then(Value::as_str) == Some("error");
    let error = response.get("error").filter(|e| !e.is_null());

    if is_error_type || error.is_some() {
        let detail = error
            .and_then(|e| e.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| truncate_for_error(&response.to_string()));
        return Err(AgentError::execution(provider, detail));
    }
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub(crate) async fn run_task<P: StepProtocol>(
    protocol: &P,
    environment: &dyn BrowserEnvironment,
    request: &TaskExecutionRequest,
) -> Result<TaskExecutionResult> {
    request.validate()?;

    let provider = protocol.agent_type();
    let settings = protocol.settings();
    let viewport = environment.viewport();
    let mut conversation = protocol.start(&request.instruction);

    let mut actions = Vec::new();
    let mut messages = Vec::new();
    let mut usage = Usage::default();
    let mut steps_taken = 0;
    let mut completed = false;

    info!(
        "Executing {provider} agent task with model {} (max {} steps)",
        settings.model_name, request.max_steps
    );

    while steps_taken < request.max_steps {
        if let Some(wait) = request.wait_between_steps_ms {
            sleep(Duration::from_millis(wait)).await;
        }
        steps_taken += 1;
        debug!("Step {steps_taken}/{}", request.max_steps);

        let started = Instant::now();
        let response = settings
            .transport
            .send(ProviderRequest {
                provider,
                endpoint: protocol.endpoint(),
                client_options: settings.client_options.clone(),
                body: protocol.request_body(&conversation, viewport),
            })
            .await?;
        check_error_response(provider, &response)?;
        usage.accumulate(Usage::from_response(
            response.get("usage"),
            elapsed_ms(started),
        ));

        let turn = protocol.parse_turn(&mut conversation, &response)?;
        if let Some(text) = turn.text.filter(|t| !t.trim().is_empty()) {
            debug!("Agent message: {text}");
            messages.push(text);
        }

        if turn.tool_calls.is_empty() {
            completed = true;
            break;
        }

        let mut observations = Vec::with_capacity(turn.tool_calls.len());
        for call in turn.tool_calls {
            let error = match &call.action {
                Ok(AgentAction::Screenshot) => None,
                Ok(action) => {
                    sleep(Duration::from_millis(request.wait_between_actions_ms)).await;
                    debug!("Performing action: {action:?}");
                    environment
                        .perform_computer_action(action)
                        .await
                        .err()
                        .map(|e| {
                            warn!("Action failed, reporting to model: {e}");
                            e.to_string()
                        })
                }
                Err(reason) => {
                    warn!("Skipping unsupported action: {reason}");
                    Some(reason.clone())
                }
            };

            let screenshot = environment.screenshot().await.map_err(|e| match e {
                AgentError::Environment(_) => e,
                other => AgentError::environment(format!("Failed to capture screenshot: {other}")),
            })?;
            let current_url = environment.current_url().await.unwrap_or_else(|e| {
                warn!("Failed to read current URL: {e}");
                String::new()
            });

            if let Ok(action) = call.action {
                actions.push(action);
            }
            observations.push(Observation {
                call_id: call.id,
                screenshot,
                current_url,
                error,
                acknowledged_safety_checks: call.pending_safety_checks,
            });
        }
        protocol.record_observations(&mut conversation, observations);
    }

    if !completed {
        info!(
            "Agent stopped after exhausting its step budget of {}",
            request.max_steps
        );
    }

    Ok(TaskExecutionResult {
        success: completed,
        completed,
        message: messages.join("\n"),
        actions,
        usage,
        steps_taken,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_body_maps_to_execution() {
        let anthropic = json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}});
        let err = check_error_response(AgentType::Anthropic, &anthropic).unwrap_err();
        assert_eq!(err.to_string(), "anthropic agent execution failed: Overloaded");

        let openai = json!({"id": "resp_1", "error": {"code": "server_error", "message": "boom"}});
        assert!(check_error_response(AgentType::OpenAi, &openai).is_err());
    }

    #[test]
    fn test_null_error_field_is_not_an_error() {
        let ok = json!({"id": "resp_1", "error": null, "output": []});
        assert!(check_error_response(AgentType::OpenAi, &ok).is_ok());
    }

    #[test]
    fn test_blank_instructions_fall_back_to_default() {
        let settings = ClientSettings {
            model_name: "m".to_string(),
            instructions: Some("  ".to_string()),
            client_options: ClientOptions::new(),
            transport: crate::transport::remote_handler(|_| async { Ok(json!({})) }),
        };
        assert_eq!(settings.instructions(), DEFAULT_SYSTEM_PROMPT);
    }
}
