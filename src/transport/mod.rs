//! Agent transport abstraction and implementations
//!
//! The [`AgentTransport`] trait is the single seam between the session
//! controller and the remote conversational endpoint: one user message in,
//! one reply text out. Concrete implementations live in submodules:
//!
//! - [`http::HttpAgentTransport`] -- authenticated JSON POST over `reqwest`
//!
//! Every failure (network, non-2xx, authentication, malformed body) is an
//! `Err`. The session controller treats all of them identically.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod http;

pub use http::HttpAgentTransport;

/// Request body accepted by the agent endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The user's message text
    pub message: String,
}

/// Response body returned by the agent endpoint on success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    /// The agent's reply text
    pub response: String,
}

/// Request/response exchange with the remote enrollment agent.
///
/// Implementations must be cheap to share behind an `Arc` and safe to call
/// concurrently; overlapping sends are allowed.
#[async_trait]
pub trait AgentTransport: Send + Sync + std::fmt::Debug {
    /// Send one user message and wait for the agent's reply text.
    ///
    /// # Errors
    ///
    /// Returns an error on any non-success outcome of the round trip.
    async fn send(&self, message: &str) -> Result<String>;
}
