//! Bounded search loop over registry attempts

use crate::{
    error::{EntitySearchError, GateKind, Result},
    gates::{ClassificationGate, ClassificationLabel, ValidationGate},
    json_extractor::JsonExtractor,
    llm::LanguageModel,
    prompts::{self, format_prompt},
    schema::{no_result_schema, record_schema},
    types::{
        AgentReport, AttemptDecision, BusinessEntityRecord, Company, SearchAttempt, SearchOutcome,
        SearchState,
    },
};
use bizreg_agent::{
    AgentProvider, BrowserEnvironment, ClientOptions, ProviderTransport, TaskExecutionRequest,
};
use bizreg_core::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Resolves a [`Company`] to its registry record.
///
/// Each attempt runs one agent task against the registry search page. A
/// no-result report ends the search; a record is checked with the gates and
/// either accepted, replaced by a related-entity target, or excluded before
/// the next attempt. Attempts are bounded by `search.max_depth`.
///
/// The browser environment is used exclusively by one search at a time.
pub struct EntitySearchOrchestrator {
    config: Config,
    environment: Arc<dyn BrowserEnvironment>,
    provider: AgentProvider,
    remote_handler: Option<Arc<dyn ProviderTransport>>,
    extractor: JsonExtractor,
    classification: ClassificationGate,
    validation: ValidationGate,
}

impl std::fmt::Debug for EntitySearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySearchOrchestrator")
            .field("config", &self.config)
            .field("provider", &self.provider)
            .field("remote_handler", &self.remote_handler.is_some())
            .finish_non_exhaustive()
    }
}

/// What one gated attempt concluded, before the state transition
enum Verdict {
    Accept,
    Branch(String),
    Reject,
}

impl EntitySearchOrchestrator {
    pub fn new(
        config: Config,
        environment: Arc<dyn BrowserEnvironment>,
        language_model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| EntitySearchError::Config(e.to_string()))?;
        AgentProvider::agent_type(&config.agent.model)?;

        let provider = AgentProvider::new()
            .with_request_timeout(Duration::from_secs(config.agent.request_timeout_secs));
        let models = &config.models;
        let extractor = JsonExtractor::new(language_model.clone(), &models.extraction_model);
        let classification = ClassificationGate::new(
            language_model.clone(),
            extractor.clone(),
            &models.classification_model,
            models.temperature,
        );
        let validation = ValidationGate::new(
            language_model,
            extractor.clone(),
            &models.validation_model,
            models.temperature,
        );

        Ok(Self {
            config,
            environment,
            provider,
            remote_handler: None,
            extractor,
            classification,
            validation,
        })
    }

    /// Route every agent provider call through `handler`
    pub fn with_remote_handler(mut self, handler: Arc<dyn ProviderTransport>) -> Self {
        self.remote_handler = Some(handler);
        self
    }

    pub async fn search(&self, mut company: Company) -> Result<SearchOutcome> {
        let max_depth = self.config.search.max_depth;
        let mut state = SearchState::new();
        let mut trace = Vec::new();

        info!("Starting entity search for '{}'", company.name);

        loop {
            if state.depth() >= max_depth {
                warn!(
                    "Search for '{}' exhausted after {} attempts",
                    company.name,
                    state.depth()
                );
                return Ok(SearchOutcome::Exhausted { state, trace });
            }

            info!(
                "Attempt {}/{}: searching for '{}'",
                state.depth() + 1,
                max_depth,
                company.name
            );
            let report = self.run_attempt(&company, &state).await?;

            let mut attempt = SearchAttempt {
                depth: state.depth(),
                company: company.clone(),
                tested_entities: state.tested_entities().to_vec(),
                entity_number: None,
                decision: AttemptDecision::NotFound,
            };

            let record = match report {
                AgentReport::NoResult(_) => {
                    info!("No results found for '{}'", company.name);
                    trace.push(attempt);
                    return Ok(SearchOutcome::NotFound { state, trace });
                }
                AgentReport::Record(record) => record,
            };
            let entity_number = record.entity_number().map(str::to_string);
            attempt.entity_number = entity_number.clone();

            if let Some(number) = entity_number.as_deref().filter(|n| state.has_tested(n)) {
                warn!("Agent returned already tested entity {number}, retrying");
                attempt.decision = AttemptDecision::AlreadyTested;
                trace.push(attempt);
                state = state.descend();
                continue;
            }

            match self.judge(&record, &company).await? {
                Verdict::Accept => {
                    info!("Entity is valid with no related entities");
                    attempt.decision = AttemptDecision::Accepted;
                    trace.push(attempt);
                    return Ok(SearchOutcome::Found {
                        record,
                        state,
                        trace,
                    });
                }
                Verdict::Branch(related) => {
                    info!("Searching related entity '{related}'");
                    attempt.decision = AttemptDecision::BranchToRelated {
                        name: related.clone(),
                    };
                    company = company.related(related);
                    state = state.descend();
                }
                Verdict::Reject => {
                    attempt.decision = AttemptDecision::Rejected;
                    state = match entity_number.as_deref() {
                        Some(number) => {
                            debug!("Excluding entity {number}");
                            state.excluding(number)
                        }
                        None => {
                            warn!("Rejected record has no entity number; it cannot be excluded");
                            state.descend()
                        }
                    };
                }
            }
            trace.push(attempt);
        }
    }

    /// Navigate, settle, run the agent once and parse what it reported
    async fn run_attempt(&self, company: &Company, state: &SearchState) -> Result<AgentReport> {
        self.prepare_page().await?;

        let instructions = match &self.config.agent.instructions {
            Some(instructions) => instructions.clone(),
            None => {
                let current_url = self
                    .environment
                    .current_url()
                    .await
                    .unwrap_or_else(|_| self.config.search.registry_url.clone());
                format_prompt(prompts::AGENT_INSTRUCTIONS, &[("current_url", current_url.as_str())])
            }
        };

        let client = self.provider.get_client(
            &self.config.agent.model,
            Some(self.client_options()),
            Some(instructions),
            self.remote_handler.clone(),
        )?;

        let request = TaskExecutionRequest::new(
            self.search_instruction(company, state)?,
            self.config.agent.max_steps,
        )
        .with_wait_between_actions(self.config.agent.wait_between_actions_ms)
        .with_wait_between_steps(self.config.agent.wait_between_steps_ms);

        let result = client.execute(self.environment.as_ref(), &request).await?;
        info!(
            "Agent finished after {} steps (completed: {})",
            result.steps_taken, result.completed
        );

        let malformed = || EntitySearchError::MalformedAgentOutput {
            raw: result.message.clone(),
        };
        let parsed = self.extractor.extract(&result.message).await?.ok_or_else(malformed)?;
        AgentReport::from_value(&parsed).ok_or_else(malformed)
    }

    /// Load the registry page, then reload it once so it is fully rendered
    async fn prepare_page(&self) -> Result<()> {
        let url = &self.config.search.registry_url;
        let settle = Duration::from_millis(self.config.search.settle_ms);

        if let Err(e) = self.environment.navigate_to(url).await {
            warn!("Failed to load {url}, retrying: {e}");
        }
        sleep(settle).await;
        self.environment.navigate_to(url).await?;
        sleep(settle).await;
        Ok(())
    }

    fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::new();
        if let Some(key) = &self.config.agent.api_key {
            options = options.with_api_key(key.clone());
        }
        if let Some(base_url) = &self.config.agent.base_url {
            options = options.with_base_url(base_url.clone());
        }
        options
    }

    fn search_instruction(&self, company: &Company, state: &SearchState) -> Result<String> {
        let company = serde_json::to_string(company)?;
        let tested = serde_json::to_string(state.tested_entities())?;
        let no_result = no_result_schema().to_string();
        let record = record_schema().to_string();

        Ok(format_prompt(
            prompts::ENTITY_SEARCH,
            &[
                ("company", company.as_str()),
                ("no_result_schema", no_result.as_str()),
                ("tested_entities", tested.as_str()),
                ("record_schema", record.as_str()),
            ],
        ))
    }

    /// Classify principals until a related entity shows up, then validate the record
    async fn judge(&self, record: &BusinessEntityRecord, company: &Company) -> Result<Verdict> {
        let state_name = &self.config.search.state;
        let entity_data = serde_json::to_string(&record.entity_information)?;

        let mut related = None;
        for name in record.principal_names() {
            let label = match self.classification.classify(state_name, &entity_data, name).await {
                Ok(classification) => classification.label,
                Err(e @ EntitySearchError::GateInvocation { .. }) => {
                    warn!("Classification of '{name}' inconclusive: {e}");
                    None
                }
                Err(e) => return Err(e),
            };
            info!("Classified {name} as {label:?}");

            if label == Some(ClassificationLabel::RelatedEntity) {
                related = Some(name.to_string());
                break;
            }
        }

        let registration_data = serde_json::to_string(record)?;
        let business_data = serde_json::to_string(company)?;
        let is_valid = match self
            .validation
            .validate(state_name, &registration_data, &business_data)
            .await
        {
            Ok(outcome) => outcome.is_some_and(|o| o.is_valid),
            Err(EntitySearchError::GateInvocation { gate: GateKind::Validation, detail }) => {
                warn!("Validation inconclusive: {detail}");
                false
            }
            Err(e) => return Err(e),
        };

        Ok(match related {
            None if is_valid => Verdict::Accept,
            Some(name) => Verdict::Branch(name),
            None => Verdict::Reject,
        })
    }
}
