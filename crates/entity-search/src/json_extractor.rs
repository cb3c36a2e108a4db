//! Turns raw model text into structured JSON

use crate::error::{EntitySearchError, Result};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::prompts;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

/// Outermost brace-delimited span, greedy and across lines
static JSON_OBJECT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").ok());

/// Parse the greedy `{...}` span of `text`, if there is one and it is valid JSON
pub fn extract_json_locally(text: &str) -> Option<Value> {
    let pattern = JSON_OBJECT_PATTERN.as_ref()?;
    let candidate = pattern.find(text)?;
    match serde_json::from_str(candidate.as_str()) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Brace-delimited span is not valid JSON: {e}");
            None
        }
    }
}

/// Two-stage JSON extraction: local pattern match, then a model that reformats the text.
///
/// `Ok(None)` means extraction was inconclusive (empty input, or the model
/// could not be reached), not that the text holds no data.
#[derive(Clone)]
pub struct JsonExtractor {
    model: Arc<dyn LanguageModel>,
    extraction_model: String,
}

impl std::fmt::Debug for JsonExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonExtractor")
            .field("extraction_model", &self.extraction_model)
            .finish_non_exhaustive()
    }
}

impl JsonExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, extraction_model: impl Into<String>) -> Self {
        Self {
            model,
            extraction_model: extraction_model.into(),
        }
    }

    pub async fn extract(&self, text: &str) -> Result<Option<Value>> {
        if text.is_empty() {
            debug!("No text to extract JSON from");
            return Ok(None);
        }

        if let Some(value) = extract_json_locally(text) {
            return Ok(Some(value));
        }

        debug!("Attempting to extract JSON using {}", self.extraction_model);
        let request = CompletionRequest::new(&self.extraction_model, text)
            .with_system(prompts::EXTRACT_JSON_SYSTEM.trim())
            .with_json_output();

        let output = match self.model.complete(request).await {
            Ok(output) => output,
            Err(e) => {
                warn!("JSON extraction fallback unavailable: {e}");
                return Ok(None);
            }
        };

        if output.trim().is_empty() {
            warn!("JSON extraction fallback returned no output");
            return Ok(None);
        }

        serde_json::from_str(&output)
            .map(Some)
            .map_err(|_| EntitySearchError::MalformedLlmJson { raw: output })
    }
}
