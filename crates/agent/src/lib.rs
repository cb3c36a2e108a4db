//! Provider-polymorphic computer-use agents
//!
//! This crate drives an agent that issues actions against a browser under the
//! supervision of a remote model provider.
//!
//! # Public API
//!
//! ## Main Entry Points
//! - [`AgentProvider`] - Resolves a model name to an [`AgentType`] and builds clients
//! - [`AgentClient`] - Closed set of provider variants sharing one execution loop
//!
//! ## Request/Response Models
//! - [`TaskExecutionRequest`] - Instruction, pacing and step budget
//! - [`TaskExecutionResult`] - Message, performed actions and usage
//! - [`AgentAction`] - Provider-neutral computer action
//!
//! ## Collaborators
//! - [`BrowserEnvironment`] - The controlled browser, implemented by the caller
//! - [`ProviderTransport`] - How provider calls leave the process (direct or remote handler)
//!
//! ## Error Handling
//! - [`AgentError`] - Error types
//! - [`Result`] - Result type alias

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod client;
mod environment;
mod error;
mod provider;
mod transport;
mod types;

pub use client::{AgentClient, AnthropicAgentClient, OpenAiAgentClient};
pub use environment::{
    expand_listing, ActionDescriptor, BrowserEnvironment, Viewport, HAS_MORE_INSTRUCTION,
};
pub use error::{AgentError, Result};
pub use provider::{supported_models, AgentProvider};
pub use transport::{
    remote_handler, DirectTransport, Endpoint, ProviderRequest, ProviderTransport,
};
pub use types::{
    AgentAction, AgentType, ClientOptions, MouseButton, Point, TaskExecutionRequest,
    TaskExecutionResult, Usage,
};
