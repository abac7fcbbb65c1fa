//! Session controller
//!
//! Owns the ordered message history and drives the
//! user-input -> transport -> history-append cycle:
//!
//! ```text
//! Idle --send_message--> AwaitingAgentReply --(reply|failure|timeout)--> Idle
//! ```
//!
//! The user message is appended synchronously inside
//! [`SessionController::send_message`]; the agent round trip runs on a
//! spawned task. Whatever the outcome, exactly one agent message is
//! appended per accepted send: the reply text, or the configured fallback
//! apology when the transport fails or times out. Status is derived from the
//! number of outstanding requests, which is decremented by a drop guard so
//! every exit path returns the session to idle.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{ReplyOrdering, SessionConfig};
use crate::error::{EnrollchatError, Result};
use crate::session::message::{Message, MessageIdGenerator, MessageRole};
use crate::session::metrics::RequestMetrics;
use crate::transport::AgentTransport;

/// Whether the session is waiting on the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No request outstanding
    #[default]
    Idle,
    /// At least one request outstanding
    AwaitingAgentReply,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingAgentReply => write!(f, "awaiting agent reply"),
        }
    }
}

/// Notification published to session observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A message was appended to the history
    MessageAppended(Message),
    /// The session status changed
    StatusChanged(SessionStatus),
}

#[derive(Debug, Default)]
struct SessionState {
    history: Vec<Message>,
    in_flight: usize,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        if self.in_flight > 0 {
            SessionStatus::AwaitingAgentReply
        } else {
            SessionStatus::Idle
        }
    }
}

#[derive(Debug)]
struct Shared {
    transport: Arc<dyn AgentTransport>,
    fallback_message: String,
    timeout: Duration,
    ids: MessageIdGenerator,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn append(&self, role: MessageRole, text: String) -> Message {
        let mut state = self.lock();
        // Id generated under the history lock so id order matches append order.
        let message = self.ids.message(role, text);
        state.history.push(message.clone());
        tracing::debug!(
            message_id = %message.id,
            role = %message.role,
            history_len = state.history.len(),
            "Appended message"
        );
        let _ = self
            .events
            .send(SessionEvent::MessageAppended(message.clone()));
        message
    }

    /// Count one more outstanding request.
    fn begin_request(self: &Arc<Self>) -> InFlightGuard {
        let mut state = self.lock();
        state.in_flight += 1;
        if state.in_flight == 1 {
            tracing::debug!(status = %SessionStatus::AwaitingAgentReply, "Session status changed");
            let _ = self.events.send(SessionEvent::StatusChanged(
                SessionStatus::AwaitingAgentReply,
            ));
        }
        InFlightGuard {
            shared: Arc::clone(self),
        }
    }

    /// One agent round trip; always appends exactly one agent message.
    async fn exchange(&self, text: &str) {
        let metrics = RequestMetrics::start();

        let outcome: Result<String> =
            match tokio::time::timeout(self.timeout, self.transport.send(text)).await {
                Ok(result) => result,
                Err(_) => Err(EnrollchatError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
                .into()),
            };

        let elapsed_ms = metrics.elapsed().as_millis() as u64;
        let reply = match outcome {
            Ok(reply) => {
                metrics.record_success();
                tracing::info!(elapsed_ms, "Agent replied");
                reply
            }
            Err(e) => {
                let kind = e
                    .downcast_ref::<EnrollchatError>()
                    .map(EnrollchatError::kind)
                    .unwrap_or("transport");
                metrics.record_failure(kind);
                tracing::error!(kind, elapsed_ms, error = %e, "Agent request failed");
                self.fallback_message.clone()
            }
        };

        self.append(MessageRole::Agent, reply);
    }
}

/// Decrements the outstanding-request count when dropped.
#[derive(Debug)]
struct InFlightGuard {
    shared: Arc<Shared>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            tracing::debug!(status = %SessionStatus::Idle, "Session status changed");
            let _ = self
                .shared
                .events
                .send(SessionEvent::StatusChanged(SessionStatus::Idle));
        }
    }
}

struct QueuedSend {
    text: String,
    guard: InFlightGuard,
    done: oneshot::Sender<()>,
}

async fn run_in_request_order(shared: Arc<Shared>, mut queue: mpsc::UnboundedReceiver<QueuedSend>) {
    while let Some(send) = queue.recv().await {
        shared.exchange(&send.text).await;
        drop(send.guard);
        let _ = send.done.send(());
    }
}

/// Conversational session over an [`AgentTransport`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use enrollchat::auth::NoIdentity;
/// use enrollchat::config::SessionConfig;
/// use enrollchat::session::SessionController;
/// use enrollchat::transport::HttpAgentTransport;
///
/// # async fn example() -> anyhow::Result<()> {
/// let transport = HttpAgentTransport::new(
///     url::Url::parse("http://localhost:8000/api/agent/chat")?,
///     Arc::new(NoIdentity),
///     Duration::from_secs(30),
/// )?;
/// let session = SessionController::new(
///     Arc::new(transport),
///     &SessionConfig::default(),
///     Duration::from_secs(30),
/// );
/// if let Some(reply) = session.send_message("recommend a course") {
///     reply.await?;
/// }
/// println!("{:?}", session.last_agent_message());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionController {
    shared: Arc<Shared>,
    ordering: ReplyOrdering,
    queue: Mutex<Option<mpsc::UnboundedSender<QueuedSend>>>,
}

impl SessionController {
    /// Create a session with an empty history.
    ///
    /// `timeout` bounds each agent round trip; expiry takes the failure
    /// path.
    pub fn new(
        transport: Arc<dyn AgentTransport>,
        config: &SessionConfig,
        timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                transport,
                fallback_message: config.fallback_message.clone(),
                timeout,
                ids: MessageIdGenerator::new(),
                state: Mutex::new(SessionState::default()),
                events,
            }),
            ordering: config.reply_ordering,
            queue: Mutex::new(None),
        }
    }

    /// Submit a user message.
    ///
    /// Blank input (empty or whitespace only) is ignored and returns `None`.
    /// Otherwise the user message is in the history when this returns, the
    /// session is awaiting a reply, and the returned handle resolves once
    /// the agent message has been appended. Dropping the handle does not
    /// cancel the request.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send_message(&self, text: &str) -> Option<JoinHandle<()>> {
        if text.trim().is_empty() {
            tracing::debug!("Ignoring blank message");
            return None;
        }

        let message = self.shared.append(MessageRole::User, text.to_string());
        let guard = self.shared.begin_request();
        tracing::info!(message_id = %message.id, ordering = ?self.ordering, "Sending message to agent");

        let text = text.to_string();
        let handle = match self.ordering {
            ReplyOrdering::Completion => {
                let shared = Arc::clone(&self.shared);
                tokio::spawn(async move {
                    let _guard = guard;
                    shared.exchange(&text).await;
                })
            }
            ReplyOrdering::Request => {
                let (done, finished) = oneshot::channel();
                let send = QueuedSend { text, guard, done };
                if let Err(mpsc::error::SendError(send)) = self.request_queue().send(send) {
                    // Worker gone; run inline so the send is never lost.
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        shared.exchange(&send.text).await;
                        drop(send.guard);
                    })
                } else {
                    tokio::spawn(async move {
                        let _ = finished.await;
                    })
                }
            }
        };
        Some(handle)
    }

    fn request_queue(&self) -> mpsc::UnboundedSender<QueuedSend> {
        let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(tx) = queue.as_ref().filter(|tx| !tx.is_closed()) {
            return tx.clone();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_in_request_order(Arc::clone(&self.shared), rx));
        *queue = Some(tx.clone());
        tx
    }

    /// Snapshot of the history in append order.
    pub fn history(&self) -> Vec<Message> {
        self.shared.lock().history.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().status()
    }

    /// Most recent agent message, if any.
    pub fn last_agent_message(&self) -> Option<Message> {
        self.shared
            .lock()
            .history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Agent)
            .cloned()
    }

    /// Subscribe to appended messages and status changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Wait until no request is outstanding.
    pub async fn wait_until_idle(&self) {
        let mut events = self.subscribe();
        while self.status() != SessionStatus::Idle {
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
