//! Error types for entity search

use bizreg_agent::AgentError;
use bizreg_core::truncate_for_error;
use strum_macros::Display;
use thiserror::Error;

/// Which oracle a gate error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum GateKind {
    Classification,
    Validation,
}

#[derive(Error, Debug)]
pub enum EntitySearchError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Language model call failed: {0}")]
    Model(String),

    /// The extraction fallback answered with text that still is not JSON.
    /// `raw` holds the complete output.
    #[error("LLM did not return valid JSON: {}", truncate_for_error(.raw))]
    MalformedLlmJson { raw: String },

    #[error("Agent output is neither a registry record nor a no-result report: {}", truncate_for_error(.raw))]
    MalformedAgentOutput { raw: String },

    #[error("{gate} gate invocation failed: {detail}")]
    GateInvocation { gate: GateKind, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EntitySearchError {
    pub fn gate(gate: GateKind, detail: impl Into<String>) -> Self {
        Self::GateInvocation {
            gate,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EntitySearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_json_keeps_full_payload() {
        let raw = "not json ".repeat(200);
        let err = EntitySearchError::MalformedLlmJson { raw: raw.clone() };
        assert!(err.to_string().contains("more chars"));
        match err {
            EntitySearchError::MalformedLlmJson { raw: kept } => assert_eq!(kept, raw),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_gate_error_names_gate() {
        let err = EntitySearchError::gate(GateKind::Validation, "HTTP 500");
        assert_eq!(err.to_string(), "validation gate invocation failed: HTTP 500");
    }
}
