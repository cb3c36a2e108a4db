//! OpenAI computer-use variant (Responses API)

use super::{ClientSettings, Observation, StepProtocol, ToolCall, Turn};
use crate::environment::Viewport;
use crate::error::{AgentError, Result};
use crate::transport::Endpoint;
use crate::types::{AgentAction, AgentType};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct OpenAiAgentClient {
    settings: ClientSettings,
}

/// Conversation state lives server-side; only the chaining id and the next input are kept
#[derive(Debug, Default)]
pub(crate) struct ResponsesConversation {
    previous_response_id: Option<String>,
    input: Vec<Value>,
}

impl OpenAiAgentClient {
    pub(crate) fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    fn computer_tool(viewport: Viewport) -> Value {
        json!({
            "type": "computer_use_preview",
            "display_width": viewport.width,
            "display_height": viewport.height,
            "environment": "browser"
        })
    }

    fn parse_computer_call(item: &Value) -> ToolCall {
        let id = item
            .get("call_id")
            .or_else(|| item.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let action = item
            .get("action")
            .cloned()
            .ok_or_else(|| "computer_call without action".to_string())
            .and_then(|raw| {
                serde_json::from_value::<AgentAction>(raw.clone())
                    .map_err(|e| format!("unsupported action {raw}: {e}"))
            });
        let pending_safety_checks = item
            .get("pending_safety_checks")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        ToolCall {
            id,
            action,
            pending_safety_checks,
        }
    }

    fn message_text(item: &Value) -> impl Iterator<Item = &str> {
        item.get("content")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
    }
}

impl StepProtocol for OpenAiAgentClient {
    type Conversation = ResponsesConversation;

    fn agent_type(&self) -> AgentType {
        AgentType::OpenAi
    }

    fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::Responses
    }

    fn start(&self, instruction: &str) -> Self::Conversation {
        ResponsesConversation {
            previous_response_id: None,
            input: vec![json!({"role": "user", "content": instruction})],
        }
    }

    fn request_body(&self, conversation: &Self::Conversation, viewport: Viewport) -> Value {
        let mut body = json!({
            "model": self.settings.model_name,
            "instructions": self.settings.instructions(),
            "tools": [Self::computer_tool(viewport)],
            "input": conversation.input,
            "truncation": "auto"
        });
        if let Some(previous) = &conversation.previous_response_id {
            body["previous_response_id"] = json!(previous);
        }
        body
    }

    fn parse_turn(&self, conversation: &mut Self::Conversation, response: &Value) -> Result<Turn> {
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::execution(AgentType::OpenAi, "response has no id"))?;
        conversation.previous_response_id = Some(id.to_string());
        conversation.input.clear();

        let output = response
            .get("output")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::execution(AgentType::OpenAi, "response has no output"))?;

        let mut turn = Turn::default();
        let mut text = Vec::new();
        for item in output {
            match item.get("type").and_then(Value::as_str) {
                Some("message") => text.extend(Self::message_text(item)),
                Some("computer_call") => turn.tool_calls.push(Self::parse_computer_call(item)),
                _ => {}
            }
        }
        if !text.is_empty() {
            turn.text = Some(text.join("\n"));
        }
        Ok(turn)
    }

    fn record_observations(
        &self,
        conversation: &mut Self::Conversation,
        observations: Vec<Observation>,
    ) {
        conversation.input = observations
            .into_iter()
            .map(|observation| {
                let mut output = json!({
                    "type": "computer_call_output",
                    "call_id": observation.call_id,
                    "output": {
                        "type": "input_image",
                        "image_url": format!("data:image/png;base64,{}", observation.screenshot)
                    }
                });
                if !observation.current_url.is_empty() {
                    output["current_url"] = json!(observation.current_url);
                }
                if !observation.acknowledged_safety_checks.is_empty() {
                    output["acknowledged_safety_checks"] =
                        json!(observation.acknowledged_safety_checks);
                }
                output
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::remote_handler;
    use crate::types::{ClientOptions, MouseButton};
    use pretty_assertions::assert_eq;

    fn client() -> OpenAiAgentClient {
        OpenAiAgentClient::new(ClientSettings {
            model_name: "computer-use-preview-2025-03-11".to_string(),
            instructions: Some("Stay on the page.".to_string()),
            client_options: ClientOptions::new(),
            transport: remote_handler(|_| async { Ok(json!({})) }),
        })
    }

    #[test]
    fn test_first_body_carries_instruction_and_tool() {
        let client = client();
        let conversation = client.start("Find Tech9");
        let body = client.request_body(&conversation, Viewport::default());

        assert_eq!(body["model"], "computer-use-preview-2025-03-11");
        assert_eq!(body["instructions"], "Stay on the page.");
        assert_eq!(body["tools"][0]["type"], "computer_use_preview");
        assert_eq!(body["tools"][0]["display_width"], 1024);
        assert_eq!(body["input"][0]["content"], "Find Tech9");
        assert!(body.get("previous_response_id").is_none());
    }

    #[test]
    fn test_parse_turn_reads_calls_and_chains() {
        let client = client();
        let mut conversation = client.start("Find Tech9");
        let response = json!({
            "id": "resp_42",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [{"type": "output_text", "text": "Searching now"}]},
                {
                    "type": "computer_call",
                    "call_id": "call_1",
                    "action": {"type": "click", "x": 5, "y": 6, "button": "left"},
                    "pending_safety_checks": [{"id": "sc_1", "code": "malicious_instructions"}]
                }
            ]
        });

        let turn = client.parse_turn(&mut conversation, &response).unwrap();
        assert_eq!(turn.text.as_deref(), Some("Searching now"));
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(
            turn.tool_calls[0].action,
            Ok(AgentAction::Click {
                x: 5,
                y: 6,
                button: MouseButton::Left
            })
        );

        client.record_observations(
            &mut conversation,
            vec![Observation {
                call_id: "call_1".to_string(),
                screenshot: "AAAA".to_string(),
                current_url: "https://example.test".to_string(),
                error: None,
                acknowledged_safety_checks: turn.tool_calls[0].pending_safety_checks.clone(),
            }],
        );
        let body = client.request_body(&conversation, Viewport::default());
        assert_eq!(body["previous_response_id"], "resp_42");
        assert_eq!(body["input"][0]["type"], "computer_call_output");
        assert_eq!(
            body["input"][0]["output"]["image_url"],
            "data:image/png;base64,AAAA"
        );
        assert_eq!(body["input"][0]["acknowledged_safety_checks"][0]["id"], "sc_1");
    }

    #[test]
    fn test_unknown_action_kept_as_unsupported_call() {
        let client = client();
        let mut conversation = client.start("x");
        let response = json!({
            "id": "resp_1",
            "output": [{"type": "computer_call", "call_id": "c", "action": {"type": "teleport"}}]
        });
        let turn = client.parse_turn(&mut conversation, &response).unwrap();
        assert!(turn.tool_calls[0].action.is_err());
    }

    #[test]
    fn test_response_without_id_is_execution_error() {
        let client = client();
        let mut conversation = client.start("x");
        let result = client.parse_turn(&mut conversation, &json!({"output": []}));
        assert!(matches!(result, Err(AgentError::Execution { .. })));
    }
}
