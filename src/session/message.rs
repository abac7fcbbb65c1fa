//! Conversation messages and id generation

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

/// Who wrote a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Typed or dictated by the student
    User,
    /// Returned by the enrollment agent, or the fallback apology
    Agent,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// Unique, creation-ordered message identifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct MessageId(Ulid);

impl MessageId {
    /// The underlying ULID.
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    /// Display text; may contain lightweight markup
    pub text: String,
    /// Display metadata only; history order is append order
    pub created_at: DateTime<Utc>,
}

/// Monotonic id source.
///
/// Ids generated within the same millisecond still differ and compare in
/// generation order.
///
/// # Examples
///
/// ```
/// use enrollchat::session::MessageIdGenerator;
///
/// let ids = MessageIdGenerator::new();
/// let a = ids.next_id();
/// let b = ids.next_id();
/// assert!(a < b);
/// ```
pub struct MessageIdGenerator {
    inner: Mutex<Generator>,
}

impl fmt::Debug for MessageIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageIdGenerator").finish_non_exhaustive()
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    /// Produce the next id.
    pub fn next_id(&self) -> MessageId {
        let mut generator = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match generator.generate() {
            Ok(id) => MessageId(id),
            Err(e) => {
                // Random component exhausted within one millisecond.
                tracing::warn!("Monotonic id overflow ({}); using a fresh ULID", e);
                MessageId(Ulid::new())
            }
        }
    }

    /// Build a message stamped with a fresh id and the current time.
    pub fn message(&self, role: MessageRole, text: impl Into<String>) -> Message {
        Message {
            id: self.next_id(),
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}
