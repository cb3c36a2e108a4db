//! Core types for the bizreg entity-resolution system
//!
//! This crate provides the foundations shared by the agent and search crates:
//!
//! - **Configuration**: layered file + environment configuration
//! - **Error handling**: unified error type and context helpers
//!

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod error;

pub use config::{AgentConfig, Config, ModelsConfig, SearchConfig};
pub use error::{Error, Result, ResultExt};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum characters of a raw payload embedded in an error message
pub const MAX_ERROR_PAYLOAD_CHARS: usize = 500;

/// Truncate a raw payload so it can be embedded in an error message.
///
/// Cuts on a character boundary and appends the number of omitted characters.
pub fn truncate_for_error(raw: &str) -> String {
    let total = raw.chars().count();
    if total <= MAX_ERROR_PAYLOAD_CHARS {
        return raw.to_string();
    }
    let head: String = raw.chars().take(MAX_ERROR_PAYLOAD_CHARS).collect();
    format!(
        "{head}... ({} more chars)",
        total - MAX_ERROR_PAYLOAD_CHARS
    )
}
