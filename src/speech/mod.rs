//! Speech input and output
//!
//! Platform speech primitives are event-driven: a capture session emits
//! start, result, end and error events; an utterance emits start, end and
//! error events. This module models each primitive as a trait that reports
//! its events on a channel, and the [`SpeechCoordinator`] turns those events
//! into two small state machines (capture and synthesis) so the rest of the
//! client never deals with event registration.
//!
//! - [`coordinator`] -- the coordinator and its state machines
//! - [`command`] -- primitives backed by external recognizer/synthesizer
//!   commands

use std::fmt;

use tokio::sync::mpsc;

use crate::error::Result;

pub mod command;
pub mod coordinator;

pub use command::{CommandCapture, CommandSynthesis};
pub use coordinator::SpeechCoordinator;

/// A speech capability the host may or may not provide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechCapability {
    /// Speech-to-text
    Capture,
    /// Text-to-speech
    Synthesis,
}

impl fmt::Display for SpeechCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture => write!(f, "Speech recognition"),
            Self::Synthesis => write!(f, "Speech synthesis"),
        }
    }
}

/// Combined speech status shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechState {
    /// Neither capturing nor speaking
    #[default]
    Idle,
    /// A capture session is open
    Listening,
    /// An utterance is playing
    Speaking,
}

impl fmt::Display for SpeechState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Listening => write!(f, "listening"),
            Self::Speaking => write!(f, "speaking"),
        }
    }
}

/// State of the capture machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No session open
    #[default]
    Idle,
    /// One session open
    Listening,
}

/// State of the synthesis machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynthesisState {
    /// Nothing playing
    #[default]
    Idle,
    /// An utterance is playing
    Speaking,
}

/// Settings a capture session is opened with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Spoken-language locale, e.g. `ko-KR`
    pub locale: String,
    /// Number of recognition alternatives requested
    pub max_alternatives: u32,
    /// Whether interim results are requested
    pub interim_results: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            locale: "ko-KR".to_string(),
            max_alternatives: 1,
            interim_results: false,
        }
    }
}

/// Event emitted by a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The platform started listening
    Started,
    /// A final transcript for the utterance
    Result(String),
    /// The session ended (after a result, on silence, or after an error)
    Ended,
    /// The platform reported an error
    Error(String),
}

/// Handle to an open capture session.
pub trait CaptureHandle: Send {
    /// Ask the platform to end the session early. The platform still
    /// reports [`CaptureEvent::Ended`] when it has stopped.
    fn stop(&self);
}

/// Platform speech-to-text primitive.
pub trait CaptureBackend: Send + Sync + fmt::Debug {
    /// Open a single-utterance capture session reporting to `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened at all.
    fn start(
        &self,
        options: &CaptureOptions,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureHandle>>;
}

/// One unit of text submitted to synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Coordinator-assigned id, echoed back in events
    pub id: u64,
    /// Text to speak
    pub text: String,
    /// Spoken-language locale
    pub locale: String,
}

/// Event emitted for an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    /// Playback of the utterance began
    Started(u64),
    /// Playback finished
    Ended(u64),
    /// Playback failed
    Error {
        /// Utterance id
        id: u64,
        /// Platform error text
        error: String,
    },
}

impl UtteranceEvent {
    /// Id of the utterance the event belongs to.
    pub fn utterance_id(&self) -> u64 {
        match self {
            Self::Started(id) | Self::Ended(id) => *id,
            Self::Error { id, .. } => *id,
        }
    }
}

/// Platform text-to-speech primitive with its own utterance queue.
pub trait SynthesisBackend: Send + Sync + fmt::Debug {
    /// Queue an utterance; playback order follows the platform's queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the utterance cannot be queued.
    fn enqueue(
        &self,
        utterance: Utterance,
        events: mpsc::UnboundedSender<UtteranceEvent>,
    ) -> Result<()>;

    /// Stop the current utterance and drop everything queued.
    fn cancel(&self);
}

/// Notification published by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// The combined speech state changed
    StateChanged(SpeechState),
    /// A capture session produced a transcript
    Transcript(String),
    /// A capture or synthesis error ended the respective activity
    Error {
        /// Which primitive failed
        capability: SpeechCapability,
        /// Platform error text
        message: String,
    },
}
