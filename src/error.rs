//! Error types for Enrollchat
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::speech::SpeechCapability;

/// Main error type for Enrollchat operations
///
/// This enum encompasses the failures that can occur while loading
/// configuration, minting identity tokens, talking to the remote agent
/// endpoint, and driving the platform speech primitives.
#[derive(Error, Debug)]
pub enum EnrollchatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failures that are not HTTP client errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// The agent endpoint answered with a non-success status
    #[error("Agent endpoint returned HTTP {status}: {body}")]
    AgentStatus {
        /// HTTP status code returned by the endpoint
        status: u16,
        /// Response body (possibly truncated) for diagnosis
        body: String,
    },

    /// The agent endpoint answered 2xx but the body was not `{ "response": string }`
    #[error("Malformed agent response: {0}")]
    MalformedResponse(String),

    /// The agent round trip did not complete in time
    #[error("Agent request timed out after {seconds}s")]
    Timeout {
        /// The configured timeout that elapsed
        seconds: u64,
    },

    /// Authentication errors (token minting failure, 401/403)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The host lacks a speech capture or synthesis capability
    #[error("{0} is not supported on this system")]
    CapabilityMissing(SpeechCapability),

    /// Platform speech primitive failures
    #[error("Speech error: {0}")]
    Speech(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl EnrollchatError {
    /// Short, stable label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::AgentStatus { .. } => "status",
            Self::MalformedResponse(_) => "malformed",
            Self::Timeout { .. } => "timeout",
            Self::Authentication(_) => "auth",
            Self::CapabilityMissing(_) => "capability",
            Self::Speech(_) => "speech",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Yaml(_) => "yaml",
            Self::Http(_) => "http",
            Self::Keyring(_) => "keyring",
        }
    }
}

/// Result type alias for Enrollchat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
