//! Enrollchat - conversational course-enrollment client library
//!
//! This library provides the conversational core of the course-registration
//! client: an ordered message history driven by a remote enrollment agent,
//! and a coordinator for spoken input and output.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: Session controller, message history, and round-trip metrics
//! - `speech`: Speech capture and synthesis coordinator and primitives
//! - `transport`: Agent transport abstraction and the HTTP implementation
//! - `auth`: Identity providers that mint bearer tokens
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: CLI command handlers
//! - `logging`: Tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use enrollchat::{Config, SessionController};
//! use enrollchat::auth::create_identity_provider;
//! use enrollchat::transport::HttpAgentTransport;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let identity = create_identity_provider(&config.identity)?;
//!     let transport = HttpAgentTransport::from_config(&config.agent, identity)?;
//!     let session = SessionController::new(
//!         Arc::new(transport),
//!         &config.session,
//!         Duration::from_secs(config.agent.request_timeout_seconds),
//!     );
//!
//!     if let Some(reply) = session.send_message("recommend a course") {
//!         reply.await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod speech;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{EnrollchatError, Result};
pub use session::{Message, MessageRole, SessionController, SessionEvent, SessionStatus};
pub use speech::{SpeechCoordinator, SpeechState};
pub use transport::AgentTransport;
