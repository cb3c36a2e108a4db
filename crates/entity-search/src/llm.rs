//! Language model seam used by the JSON extractor and the gates

use crate::error::{EntitySearchError, Result};
use async_trait::async_trait;
use bizreg_agent::{
    AgentType, ClientOptions, DirectTransport, Endpoint, ProviderRequest, ProviderTransport,
};
use bizreg_core::ModelsConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const WEB_SEARCH_MAX_OUTPUT_TOKENS: u32 = 2048;

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    /// Ask the provider to constrain output to a JSON object
    pub json_output: bool,
    /// Let the model run a live web search before answering
    pub web_search: bool,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            json_output: false,
            web_search: false,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text completion backed by a remote model.
///
/// Returns the model's text output, which may be empty. Transport and
/// provider failures are reported as [`EntitySearchError::Model`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// OpenAI-backed [`LanguageModel`]: chat completions for plain prompts and
/// the Responses API with the web search tool for search-backed prompts
pub struct OpenAiLanguageModel {
    transport: Arc<dyn ProviderTransport>,
    client_options: ClientOptions,
}

impl std::fmt::Debug for OpenAiLanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiLanguageModel")
            .field("client_options", &self.client_options)
            .finish_non_exhaustive()
    }
}

impl OpenAiLanguageModel {
    pub fn new(transport: Arc<dyn ProviderTransport>, client_options: ClientOptions) -> Self {
        Self {
            transport,
            client_options,
        }
    }

    /// Direct connection configured from the `[models]` section
    pub fn from_config(config: &ModelsConfig, timeout: Duration) -> Result<Self> {
        let transport = DirectTransport::new(timeout)?;
        let mut options = ClientOptions::new();
        if let Some(key) = config.resolve_openai_api_key() {
            options = options.with_api_key(key);
        }
        if let Some(base_url) = &config.openai_base_url {
            options = options.with_base_url(base_url.clone());
        }
        Ok(Self::new(Arc::new(transport), options))
    }

    fn chat_body(request: &CompletionRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": request.model,
            "messages": messages
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if request.json_output {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    fn web_search_body(request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "input": [{
                "role": "user",
                "content": [{"type": "input_text", "text": request.prompt}]
            }],
            "text": {"format": {"type": "text"}},
            "tools": [{
                "type": "web_search_preview",
                "user_location": {"type": "approximate", "country": "US"},
                "search_context_size": "medium"
            }],
            "tool_choice": {"type": "web_search_preview"},
            "max_output_tokens": WEB_SEARCH_MAX_OUTPUT_TOKENS,
            "top_p": 1,
            "store": false
        });
        if let Some(system) = &request.system {
            body["instructions"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    fn chat_text(response: &Value) -> String {
        response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// `output_text` is an SDK convenience; raw responses carry the text in `output`
    fn responses_text(response: &Value) -> String {
        if let Some(text) = response.get("output_text").and_then(Value::as_str) {
            return text.to_string();
        }
        response
            .get("output")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
            .filter_map(|item| item.get("content").and_then(Value::as_array))
            .flatten()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("")
    }
}

#[async_trait]
impl LanguageModel for OpenAiLanguageModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let (endpoint, body) = if request.web_search {
            (Endpoint::Responses, Self::web_search_body(&request))
        } else {
            (Endpoint::ChatCompletions, Self::chat_body(&request))
        };
        debug!("Calling {} via {endpoint}", request.model);

        let response = self
            .transport
            .send(ProviderRequest {
                provider: AgentType::OpenAi,
                endpoint,
                client_options: self.client_options.clone(),
                body,
            })
            .await
            .map_err(|e| EntitySearchError::Model(e.to_string()))?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(EntitySearchError::Model(error.to_string()));
        }

        Ok(match endpoint {
            Endpoint::Responses => Self::responses_text(&response),
            _ => Self::chat_text(&response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizreg_agent::{remote_handler, AgentError};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn capturing(response: Value) -> (OpenAiLanguageModel, Arc<Mutex<Vec<ProviderRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let transport = remote_handler(move |request: ProviderRequest| {
            sink.lock().unwrap().push(request);
            let response = response.clone();
            async move { Ok(response) }
        });
        (OpenAiLanguageModel::new(transport, ClientOptions::new()), seen)
    }

    #[tokio::test]
    async fn test_plain_prompt_uses_chat_completions() {
        let (model, seen) = capturing(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"is_valid\": true}"}}]
        }));
        let text = model
            .complete(
                CompletionRequest::new("gpt-4o", "Compare these")
                    .with_system("You are an AI assistant")
                    .with_json_output()
                    .with_temperature(0.5),
            )
            .await
            .unwrap();

        assert_eq!(text, "{\"is_valid\": true}");
        let requests = seen.lock().unwrap();
        assert_eq!(requests[0].endpoint, Endpoint::ChatCompletions);
        assert_eq!(requests[0].body["messages"][0]["role"], "system");
        assert_eq!(requests[0].body["response_format"]["type"], "json_object");
        assert_eq!(requests[0].body["temperature"], 0.5);
    }

    #[tokio::test]
    async fn test_web_search_prompt_uses_responses_tool() {
        let (model, seen) = capturing(json!({
            "output": [
                {"type": "web_search_call", "status": "completed"},
                {"type": "message", "content": [{"type": "output_text", "text": "{\"label\": \"individual\"}"}]}
            ]
        }));
        let text = model
            .complete(CompletionRequest::new("gpt-4o-mini", "Classify").with_web_search())
            .await
            .unwrap();

        assert_eq!(text, "{\"label\": \"individual\"}");
        let requests = seen.lock().unwrap();
        assert_eq!(requests[0].endpoint, Endpoint::Responses);
        assert_eq!(requests[0].body["tools"][0]["type"], "web_search_preview");
        assert_eq!(requests[0].body["store"], false);
    }

    #[tokio::test]
    async fn test_transport_failure_is_model_error() {
        let transport = remote_handler(|_| async {
            Err(AgentError::execution(AgentType::OpenAi, "connection refused"))
        });
        let model = OpenAiLanguageModel::new(transport, ClientOptions::new());
        let result = model.complete(CompletionRequest::new("gpt-4o", "hi")).await;
        assert!(matches!(result, Err(EntitySearchError::Model(detail)) if detail.contains("connection refused")));
    }
}
