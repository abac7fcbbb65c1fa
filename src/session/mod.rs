//! Conversational session
//!
//! - [`message`] -- messages and monotonic ids
//! - [`controller`] -- the session controller and its status machine
//! - [`metrics`] -- round-trip metrics

pub mod controller;
pub mod message;
pub mod metrics;

pub use controller::{SessionController, SessionEvent, SessionStatus};
pub use message::{Message, MessageId, MessageIdGenerator, MessageRole};
