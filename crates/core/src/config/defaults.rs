//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_AGENT_MODEL: &str = "claude-3-7-sonnet-20250219";
pub(crate) const DEFAULT_STATE: &str = "Utah";
pub(crate) const DEFAULT_REGISTRY_URL: &str =
    "https://businessregistration.utah.gov/EntitySearch/OnlineEntitySearch";
pub(crate) const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o-mini";
pub(crate) const DEFAULT_CLASSIFICATION_MODEL: &str = "gpt-4o-mini";
pub(crate) const DEFAULT_VALIDATION_MODEL: &str = "gpt-4o";

pub(crate) fn default_agent_model() -> String {
    DEFAULT_AGENT_MODEL.to_string()
}

pub(crate) fn default_max_steps() -> u32 {
    10
}

pub(crate) fn default_wait_between_actions_ms() -> u64 {
    60_000
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_state() -> String {
    DEFAULT_STATE.to_string()
}

pub(crate) fn default_registry_url() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

pub(crate) fn default_max_depth() -> u32 {
    5
}

pub(crate) fn default_settle_ms() -> u64 {
    1_000
}

pub(crate) fn default_extraction_model() -> String {
    DEFAULT_EXTRACTION_MODEL.to_string()
}

pub(crate) fn default_classification_model() -> String {
    DEFAULT_CLASSIFICATION_MODEL.to_string()
}

pub(crate) fn default_validation_model() -> String {
    DEFAULT_VALIDATION_MODEL.to_string()
}

pub(crate) fn default_temperature() -> f32 {
    0.5
}
