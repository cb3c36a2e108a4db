//! Request, result and action types shared by every agent variant

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Remote agentic API spoken by a client variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AgentType {
    OpenAi,
    Anthropic,
}

impl AgentType {
    /// Parse a provider name, failing on anything outside the closed set
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(name)
            .map_err(|_: strum::ParseError| AgentError::UnknownAgentType(name.to_string()))
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Provider connection options: arbitrary key/value pairs passed through to the transport.
///
/// Keys follow the provider SDK conventions (`apiKey`, `baseURL`); snake_case
/// spellings are accepted as well.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientOptions(Map<String, Value>);

const API_KEY_KEYS: &[&str] = &["apiKey", "api_key"];
const BASE_URL_KEYS: &[&str] = &["baseURL", "baseUrl", "base_url"];

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        self.with("apiKey", api_key.into())
    }

    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        self.with("baseURL", base_url.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.first_str(API_KEY_KEYS)
    }

    pub fn base_url(&self) -> Option<&str> {
        self.first_str(BASE_URL_KEYS)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_str))
            .filter(|value| !value.is_empty())
    }
}

impl From<Map<String, Value>> for ClientOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            if API_KEY_KEYS.contains(&key.as_str()) {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// One task execution: a natural-language goal plus pacing and a step budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecutionRequest {
    pub instruction: String,
    /// Minimum delay before every individual action
    #[serde(default)]
    pub wait_between_actions_ms: u64,
    /// Minimum delay before every step, when set
    #[serde(default)]
    pub wait_between_steps_ms: Option<u64>,
    pub max_steps: u32,
}

impl TaskExecutionRequest {
    pub fn new(instruction: impl Into<String>, max_steps: u32) -> Self {
        Self {
            instruction: instruction.into(),
            wait_between_actions_ms: 0,
            wait_between_steps_ms: None,
            max_steps,
        }
    }

    pub fn with_wait_between_actions(mut self, millis: u64) -> Self {
        self.wait_between_actions_ms = millis;
        self
    }

    pub fn with_wait_between_steps(mut self, millis: Option<u64>) -> Self {
        self.wait_between_steps_ms = millis;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.instruction.trim().is_empty() {
            return Err(AgentError::InvalidRequest(
                "Instruction cannot be empty".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(AgentError::InvalidRequest(
                "max_steps must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Token usage reported by the provider, summed over every step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub inference_time_ms: u64,
}

impl Usage {
    pub(crate) fn from_response(usage: Option<&Value>, inference_time_ms: u64) -> Self {
        let read = |key: &str| {
            usage
                .and_then(|u| u.get(key))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };
        Self {
            input_tokens: read("input_tokens"),
            output_tokens: read("output_tokens"),
            inference_time_ms,
        }
    }

    pub fn accumulate(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.inference_time_ms += other.inference_time_ms;
    }
}

/// Outcome of one task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecutionResult {
    /// The model reported the task complete
    pub success: bool,
    /// The loop ended because the model stopped proposing actions
    pub completed: bool,
    /// Text emitted by the model, one line per step that produced text
    pub message: String,
    pub actions: Vec<AgentAction>,
    pub usage: Usage,
    pub steps_taken: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    #[serde(alias = "middle")]
    Wheel,
    Back,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// Provider-neutral computer action.
///
/// The wire shape matches the OpenAI computer-use action objects; Anthropic
/// tool inputs are converted into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    Click {
        x: i64,
        y: i64,
        #[serde(default)]
        button: MouseButton,
    },
    DoubleClick {
        x: i64,
        y: i64,
    },
    TripleClick {
        x: i64,
        y: i64,
    },
    Move {
        x: i64,
        y: i64,
    },
    Drag {
        path: Vec<Point>,
    },
    Type {
        text: String,
    },
    Keypress {
        keys: Vec<String>,
    },
    Scroll {
        x: i64,
        y: i64,
        scroll_x: i64,
        scroll_y: i64,
    },
    Screenshot,
    Wait {
        #[serde(default)]
        duration_ms: Option<u64>,
    },
}
