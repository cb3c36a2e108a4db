//! Registry entity resolution driven by a computer-use agent
//!
//! Finds the registry record for a business by running an agent against the
//! registry's search page, then checking the extracted record with two
//! model-backed gates: principals are classified to detect a related entity
//! (searched next), and the record is validated against the target business.
//!
//! # Public API
//!
//! - [`EntitySearchOrchestrator`] - Bounded search loop with exclusion tracking
//! - [`JsonExtractor`] - Regex-first JSON extraction with a model fallback
//! - [`ClassificationGate`] / [`ValidationGate`] - Single-call oracles
//! - [`LanguageModel`] - Completion seam; [`OpenAiLanguageModel`] is the default
//! - [`SearchOutcome`] - Found / not found / exhausted, with the attempt trace

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod error;
mod gates;
mod json_extractor;
mod llm;
mod orchestrator;
mod prompts;
mod schema;
mod types;

pub use error::{EntitySearchError, GateKind, Result};
pub use gates::{Classification, ClassificationGate, ClassificationLabel, ValidationGate, ValidationOutcome};
pub use json_extractor::{extract_json_locally, JsonExtractor};
pub use llm::{CompletionRequest, LanguageModel, OpenAiLanguageModel};
pub use orchestrator::EntitySearchOrchestrator;
pub use schema::{no_result_schema, record_schema};
pub use types::{
    AddressInformation, AgentReport, AttemptDecision, BusinessEntityRecord, Company,
    EntityInformation, NoResultSentinel, Principal, RegisteredAgent, SearchAttempt,
    SearchCriteria, SearchOutcome, SearchState, ServiceOfProcessInformation,
};
