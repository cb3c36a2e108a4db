//! Anthropic computer-use variant (Messages API with the computer tool beta)

use super::{ClientSettings, Observation, StepProtocol, ToolCall, Turn};
use crate::environment::Viewport;
use crate::error::{AgentError, Result};
use crate::transport::Endpoint;
use crate::types::{AgentAction, AgentType, MouseButton, Point};
use serde_json::{json, Value};

const MAX_TOKENS: u32 = 4096;
const SCROLL_STEP_PX: i64 = 100;

#[derive(Debug, Clone)]
pub struct AnthropicAgentClient {
    settings: ClientSettings,
}

/// Full message history; the Messages API is stateless
#[derive(Debug, Default)]
pub(crate) struct MessagesConversation {
    messages: Vec<Value>,
}

impl AnthropicAgentClient {
    pub(crate) fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    fn is_latest_tool(&self) -> bool {
        self.settings.model_name.contains("3-7")
    }

    fn beta_flag(&self) -> &'static str {
        if self.is_latest_tool() {
            "computer-use-2025-01-24"
        } else {
            "computer-use-2024-10-22"
        }
    }

    fn tool_type(&self) -> &'static str {
        if self.is_latest_tool() {
            "computer_20250124"
        } else {
            "computer_20241022"
        }
    }
}

fn coordinate(input: &Value, key: &str) -> std::result::Result<(i64, i64), String> {
    let pair = input
        .get(key)
        .and_then(Value::as_array)
        .filter(|pair| pair.len() == 2)
        .ok_or_else(|| format!("missing {key}"))?;
    match (pair[0].as_i64(), pair[1].as_i64()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(format!("non-integer {key}")),
    }
}

fn text_field(input: &Value) -> std::result::Result<String, String> {
    input
        .get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "missing text".to_string())
}

/// Map a computer tool input onto the provider-neutral action set
fn convert_tool_input(input: &Value) -> std::result::Result<AgentAction, String> {
    let action = input
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| "tool input has no action".to_string())?;

    let click = |button: MouseButton| {
        coordinate(input, "coordinate").map(|(x, y)| AgentAction::Click { x, y, button })
    };

    match action {
        "left_click" => click(MouseButton::Left),
        "right_click" => click(MouseButton::Right),
        "middle_click" => click(MouseButton::Wheel),
        "double_click" => {
            coordinate(input, "coordinate").map(|(x, y)| AgentAction::DoubleClick { x, y })
        }
        "triple_click" => {
            coordinate(input, "coordinate").map(|(x, y)| AgentAction::TripleClick { x, y })
        }
        "mouse_move" => coordinate(input, "coordinate").map(|(x, y)| AgentAction::Move { x, y }),
        "left_click_drag" => {
            let (start_x, start_y) = coordinate(input, "start_coordinate")?;
            let (x, y) = coordinate(input, "coordinate")?;
            Ok(AgentAction::Drag {
                path: vec![Point { x: start_x, y: start_y }, Point { x, y }],
            })
        }
        "type" => text_field(input).map(|text| AgentAction::Type { text }),
        "key" => text_field(input).map(|text| AgentAction::Keypress {
            keys: text.split('+').map(|key| key.trim().to_string()).collect(),
        }),
        "scroll" => {
            let (x, y) = coordinate(input, "coordinate")?;
            let amount = input
                .get("scroll_amount")
                .and_then(Value::as_i64)
                .unwrap_or(1)
                * SCROLL_STEP_PX;
            let (scroll_x, scroll_y) =
                match input.get("scroll_direction").and_then(Value::as_str) {
                    Some("up") => (0, -amount),
                    Some("down") => (0, amount),
                    Some("left") => (-amount, 0),
                    Some("right") => (amount, 0),
                    other => return Err(format!("unknown scroll direction {other:?}")),
                };
            Ok(AgentAction::Scroll {
                x,
                y,
                scroll_x,
                scroll_y,
            })
        }
        "screenshot" => Ok(AgentAction::Screenshot),
        "wait" => Ok(AgentAction::Wait {
            duration_ms: input
                .get("duration")
                .and_then(Value::as_f64)
                .map(|seconds| (seconds * 1000.0) as u64),
        }),
        other => Err(format!("unsupported computer action: {other}")),
    }
}

impl StepProtocol for AnthropicAgentClient {
    type Conversation = MessagesConversation;

    fn agent_type(&self) -> AgentType {
        AgentType::Anthropic
    }

    fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::Messages
    }

    fn start(&self, instruction: &str) -> Self::Conversation {
        MessagesConversation {
            messages: vec![json!({"role": "user", "content": instruction})],
        }
    }

    fn request_body(&self, conversation: &Self::Conversation, viewport: Viewport) -> Value {
        json!({
            "model": self.settings.model_name,
            "max_tokens": MAX_TOKENS,
            "system": self.settings.instructions(),
            "messages": conversation.messages,
            "tools": [{
                "type": self.tool_type(),
                "name": "computer",
                "display_width_px": viewport.width,
                "display_height_px": viewport.height,
                "display_number": 1
            }],
            "betas": [self.beta_flag()]
        })
    }

    fn parse_turn(&self, conversation: &mut Self::Conversation, response: &Value) -> Result<Turn> {
        let content = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::execution(AgentType::Anthropic, "response has no content"))?;

        let mut turn = Turn::default();
        let mut text = Vec::new();
        for block in content {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(Value::as_str) {
                        text.push(t);
                    }
                }
                Some("tool_use") => {
                    let id = block
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    turn.tool_calls.push(ToolCall {
                        id,
                        action: convert_tool_input(&input),
                        pending_safety_checks: Vec::new(),
                    });
                }
                _ => {}
            }
        }
        if !text.is_empty() {
            turn.text = Some(text.join("\n"));
        }

        conversation
            .messages
            .push(json!({"role": "assistant", "content": content}));
        Ok(turn)
    }

    fn record_observations(
        &self,
        conversation: &mut Self::Conversation,
        observations: Vec<Observation>,
    ) {
        let results: Vec<Value> = observations
            .into_iter()
            .map(|observation| match observation.error {
                Some(error) => json!({
                    "type": "tool_result",
                    "tool_use_id": observation.call_id,
                    "is_error": true,
                    "content": [{"type": "text", "text": error}]
                }),
                None => {
                    let mut content = vec![json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": observation.screenshot
                        }
                    })];
                    if !observation.current_url.is_empty() {
                        content.push(json!({
                            "type": "text",
                            "text": format!("Current URL: {}", observation.current_url)
                        }));
                    }
                    json!({
                        "type": "tool_result",
                        "tool_use_id": observation.call_id,
                        "content": content
                    })
                }
            })
            .collect();

        conversation
            .messages
            .push(json!({"role": "user", "content": results}));
    }
}
