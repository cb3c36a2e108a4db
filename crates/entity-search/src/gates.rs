//! Single-call oracles over extracted registry records
//!
//! Both gates make one model call and pipe the answer through the
//! [`JsonExtractor`]. A missing or unparsable answer is inconclusive (`None`
//! fields), never a negative result. Remote failures are
//! [`EntitySearchError::GateInvocation`].

use crate::error::{EntitySearchError, GateKind, Result};
use crate::json_extractor::JsonExtractor;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::prompts::{self, format_prompt};
use bizreg_core::truncate_for_error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use strum_macros::Display;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ClassificationLabel {
    Individual,
    RelatedEntity,
    RegistrationService,
    #[serde(other)]
    Unknown,
}

impl ClassificationLabel {
    fn from_answer(value: &Value) -> Option<Self> {
        value
            .as_str()
            .map(|label| label.trim().to_ascii_lowercase())
            .and_then(|label| serde_json::from_value(Value::String(label)).ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub registered_name: Option<String>,
    /// `None` when the model gave no usable answer
    pub label: Option<ClassificationLabel>,
}

impl Classification {
    fn decided(registered_name: &str, label: ClassificationLabel) -> Self {
        Self {
            registered_name: Some(registered_name.to_string()),
            label: Some(label),
        }
    }

    pub fn is_related_entity(&self) -> bool {
        self.label == Some(ClassificationLabel::RelatedEntity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub entity_number: Option<String>,
}

/// Designators that carry no name on their own
const LEGAL_SUFFIXES: &[&str] = &[
    "INC", "INCORPORATED", "LLC", "LC", "LLP", "LP", "PLLC", "PC", "PA", "CORP", "CORPORATION",
    "CO", "COMPANY", "LTD", "LIMITED", "DBA", "THE",
];

fn normalized_tokens(name: &str) -> Vec<String> {
    name.split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Empty, or nothing but legal designators ("INC", "L.L.C.")
fn is_incomplete_name(name: &str) -> bool {
    normalized_tokens(name)
        .iter()
        .all(|token| LEGAL_SUFFIXES.contains(&token.as_str()))
}

/// Run a gate answer through the extractor; prose that cannot be turned into JSON is inconclusive
async fn parse_answer(
    extractor: &JsonExtractor,
    gate: GateKind,
    answer: &str,
) -> Result<Option<Value>> {
    match extractor.extract(answer).await {
        Err(EntitySearchError::MalformedLlmJson { raw }) => {
            warn!(
                "{gate} answer could not be read as JSON: {}",
                truncate_for_error(&raw)
            );
            Ok(None)
        }
        other => other,
    }
}

/// Labels a principal name as an individual, a related entity, or a registration service
#[derive(Clone)]
pub struct ClassificationGate {
    model: Arc<dyn LanguageModel>,
    extractor: JsonExtractor,
    model_name: String,
    temperature: f32,
}

impl std::fmt::Debug for ClassificationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationGate")
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ClassificationGate {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        extractor: JsonExtractor,
        model_name: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            model,
            extractor,
            model_name: model_name.into(),
            temperature,
        }
    }

    /// Classify `registered_name`, a principal of the record described by `entity_data`.
    ///
    /// Incomplete names are `unknown` without a model call. Everything else,
    /// personal names included, is labelled by a web-search backed model.
    pub async fn classify(
        &self,
        state: &str,
        entity_data: &str,
        registered_name: &str,
    ) -> Result<Classification> {
        if is_incomplete_name(registered_name) {
            debug!("'{registered_name}' is an incomplete name");
            return Ok(Classification::decided(
                registered_name,
                ClassificationLabel::Unknown,
            ));
        }

        let prompt = format_prompt(
            prompts::CLASSIFY_ENTITY,
            &[
                ("state", state),
                ("entity_data", entity_data),
                ("registered_name", registered_name),
            ],
        );
        let request = CompletionRequest::new(&self.model_name, prompt)
            .with_web_search()
            .with_temperature(self.temperature);

        let answer = self
            .model
            .complete(request)
            .await
            .map_err(|e| EntitySearchError::gate(GateKind::Classification, e.to_string()))?;

        let Some(parsed) =
            parse_answer(&self.extractor, GateKind::Classification, &answer).await?
        else {
            return Ok(Classification::default());
        };

        Ok(Classification {
            registered_name: parsed
                .get("registered_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            label: parsed.get("label").and_then(ClassificationLabel::from_answer),
        })
    }
}

/// Confirms an extracted record belongs to the target business
#[derive(Clone)]
pub struct ValidationGate {
    model: Arc<dyn LanguageModel>,
    extractor: JsonExtractor,
    model_name: String,
    temperature: f32,
}

impl std::fmt::Debug for ValidationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationGate")
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ValidationGate {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        extractor: JsonExtractor,
        model_name: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            model,
            extractor,
            model_name: model_name.into(),
            temperature,
        }
    }

    /// `None` when the model's answer carries no `is_valid` verdict
    pub async fn validate(
        &self,
        state: &str,
        registration_data: &str,
        business_data: &str,
    ) -> Result<Option<ValidationOutcome>> {
        let prompt = format_prompt(
            prompts::VALIDATE_ENTITY,
            &[
                ("state", state),
                ("registration_data", registration_data),
                ("business_data", business_data),
            ],
        );
        let request = CompletionRequest::new(&self.model_name, prompt)
            .with_system(prompts::VALIDATE_ENTITY_SYSTEM.trim())
            .with_json_output()
            .with_temperature(self.temperature);

        let answer = self
            .model
            .complete(request)
            .await
            .map_err(|e| EntitySearchError::gate(GateKind::Validation, e.to_string()))?;

        let Some(parsed) = parse_answer(&self.extractor, GateKind::Validation, &answer).await?
        else {
            return Ok(None);
        };

        let is_valid = match parsed.get("is_valid") {
            Some(Value::Bool(valid)) => *valid,
            Some(Value::String(valid)) if valid.eq_ignore_ascii_case("true") => true,
            Some(Value::String(valid)) if valid.eq_ignore_ascii_case("false") => false,
            _ => return Ok(None),
        };
        let entity_number = parsed
            .get("entity_number")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(Some(ValidationOutcome {
            is_valid,
            entity_number,
        }))
    }
}
