//! Speech I/O coordinator
//!
//! Owns the single capture handle and the synthesis queue. Capture and
//! synthesis are two independent machines:
//!
//! ```text
//! capture:   Idle --start_listening--> Listening --(result|end|error)--> Idle
//! synthesis: Idle --utterance start--> Speaking --(end|error|cancel)--> Idle
//! ```
//!
//! Backend events arrive on channels and are applied by small driver tasks.
//! Each capture session carries a generation number and each queued
//! utterance is tracked by id, so events from a session that has already
//! ended or from utterances flushed by [`SpeechCoordinator::cancel_speech`]
//! are dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, mpsc};

use crate::config::SpeechConfig;
use crate::error::{EnrollchatError, Result};
use crate::speech::{
    CaptureBackend, CaptureEvent, CaptureHandle, CaptureOptions, CaptureState, CommandCapture,
    CommandSynthesis, SpeechCapability, SpeechEvent, SpeechState, SynthesisBackend,
    SynthesisState, Utterance, UtteranceEvent,
};

const EVENT_CAPACITY: usize = 64;

struct ActiveCapture {
    generation: u64,
    handle: Box<dyn CaptureHandle>,
}

#[derive(Default)]
struct Machines {
    capture: Option<ActiveCapture>,
    capture_generation: u64,
    transcript: String,
    pending_utterances: HashSet<u64>,
    speaking: Option<u64>,
    next_utterance_id: u64,
    published: SpeechState,
}

impl Machines {
    fn derived_state(&self) -> SpeechState {
        if self.capture.is_some() {
            SpeechState::Listening
        } else if self.speaking.is_some() {
            SpeechState::Speaking
        } else {
            SpeechState::Idle
        }
    }
}

struct Inner {
    capture: Option<Arc<dyn CaptureBackend>>,
    synthesis: Option<Arc<dyn SynthesisBackend>>,
    options: CaptureOptions,
    machines: Mutex<Machines>,
    events: broadcast::Sender<SpeechEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Machines> {
        self.machines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Broadcast a state change if the derived state moved.
    fn publish_state(&self, machines: &mut Machines) {
        let state = machines.derived_state();
        if state != machines.published {
            machines.published = state;
            tracing::debug!(state = %state, "Speech state changed");
            let _ = self.events.send(SpeechEvent::StateChanged(state));
        }
    }

    fn end_capture(&self, generation: u64) {
        let mut machines = self.lock();
        if machines
            .capture
            .as_ref()
            .is_some_and(|active| active.generation == generation)
        {
            machines.capture = None;
            self.publish_state(&mut machines);
        }
    }

    fn apply_capture_event(&self, generation: u64, event: CaptureEvent) -> bool {
        let mut machines = self.lock();
        let current = machines
            .capture
            .as_ref()
            .is_some_and(|active| active.generation == generation);
        if !current {
            tracing::trace!(generation, ?event, "Ignoring event from ended capture session");
            return false;
        }

        match event {
            CaptureEvent::Started => {
                tracing::debug!(generation, "Capture session started");
                true
            }
            CaptureEvent::Result(transcript) => {
                tracing::info!(generation, "Captured utterance");
                machines.transcript = transcript.clone();
                let _ = self.events.send(SpeechEvent::Transcript(transcript));
                // One utterance per session.
                if let Some(active) = machines.capture.take() {
                    active.handle.stop();
                }
                self.publish_state(&mut machines);
                false
            }
            CaptureEvent::Ended => {
                tracing::debug!(generation, "Capture session ended");
                machines.capture = None;
                self.publish_state(&mut machines);
                false
            }
            CaptureEvent::Error(message) => {
                tracing::error!(generation, error = %message, "Speech recognition error");
                let _ = self.events.send(SpeechEvent::Error {
                    capability: SpeechCapability::Capture,
                    message,
                });
                if let Some(active) = machines.capture.take() {
                    active.handle.stop();
                }
                self.publish_state(&mut machines);
                false
            }
        }
    }

    fn apply_utterance_event(&self, event: UtteranceEvent) -> bool {
        let id = event.utterance_id();
        let mut machines = self.lock();
        if !machines.pending_utterances.contains(&id) {
            tracing::trace!(id, ?event, "Ignoring event for flushed utterance");
            return false;
        }

        match event {
            UtteranceEvent::Started(_) => {
                machines.speaking = Some(id);
                self.publish_state(&mut machines);
                true
            }
            UtteranceEvent::Ended(_) => {
                self.finish_utterance(&mut machines, id);
                false
            }
            UtteranceEvent::Error { error, .. } => {
                tracing::error!(id, error = %error, "Speech synthesis error");
                let _ = self.events.send(SpeechEvent::Error {
                    capability: SpeechCapability::Synthesis,
                    message: error,
                });
                self.finish_utterance(&mut machines, id);
                false
            }
        }
    }

    fn finish_utterance(&self, machines: &mut Machines, id: u64) {
        machines.pending_utterances.remove(&id);
        if machines.speaking == Some(id) {
            machines.speaking = None;
        }
        self.publish_state(machines);
    }
}

async fn drive_capture(
    inner: Arc<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<CaptureEvent>,
) {
    while let Some(event) = events.recv().await {
        if !inner.apply_capture_event(generation, event) {
            break;
        }
    }
    // Backend went away without reporting an end.
    inner.end_capture(generation);
}

async fn drive_utterance(
    inner: Arc<Inner>,
    id: u64,
    mut events: mpsc::UnboundedReceiver<UtteranceEvent>,
) {
    while let Some(event) = events.recv().await {
        if !inner.apply_utterance_event(event) {
            return;
        }
    }
    let mut machines = inner.lock();
    if machines.pending_utterances.contains(&id) {
        inner.finish_utterance(&mut machines, id);
    }
}

/// Single owner of the platform speech primitives.
///
/// Cheap to clone; clones share the same machines. Methods never block and
/// must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct SpeechCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SpeechCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechCoordinator")
            .field("capture", &self.inner.capture)
            .field("synthesis", &self.inner.synthesis)
            .field("options", &self.inner.options)
            .field("state", &self.state())
            .finish()
    }
}

impl SpeechCoordinator {
    /// Create a coordinator over the given primitives. A `None` backend
    /// means the host lacks that capability.
    pub fn new(
        capture: Option<Arc<dyn CaptureBackend>>,
        synthesis: Option<Arc<dyn SynthesisBackend>>,
        options: CaptureOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                capture,
                synthesis,
                options,
                machines: Mutex::new(Machines::default()),
                events,
            }),
        }
    }

    /// Build a coordinator from the `speech` configuration section.
    ///
    /// A primitive is available only when its command is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured command is invalid.
    pub fn from_config(config: &SpeechConfig) -> Result<Self> {
        let capture: Option<Arc<dyn CaptureBackend>> = if config.capture.command.is_empty() {
            None
        } else {
            Some(Arc::new(CommandCapture::new(config.capture.command.clone())?))
        };
        let synthesis: Option<Arc<dyn SynthesisBackend>> = if config.synthesis.command.is_empty()
        {
            None
        } else {
            Some(Arc::new(CommandSynthesis::new(
                config.synthesis.command.clone(),
            )?))
        };

        Ok(Self::new(
            capture,
            synthesis,
            CaptureOptions {
                locale: config.locale.clone(),
                max_alternatives: config.capture.max_alternatives,
                interim_results: config.capture.interim_results,
            },
        ))
    }

    /// Whether the host provides `capability`.
    pub fn supports(&self, capability: SpeechCapability) -> bool {
        match capability {
            SpeechCapability::Capture => self.inner.capture.is_some(),
            SpeechCapability::Synthesis => self.inner.synthesis.is_some(),
        }
    }

    /// Open a one-shot capture session.
    ///
    /// A call while a session is already open does nothing. If the backend
    /// fails to open a session the failure is logged and the machine stays
    /// idle.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollchatError::CapabilityMissing`] when capture is not
    /// available, so the caller can show a notice.
    pub fn start_listening(&self) -> Result<()> {
        let backend = self.inner.capture.as_ref().ok_or_else(|| {
            tracing::warn!("Speech recognition requested but not available");
            EnrollchatError::CapabilityMissing(SpeechCapability::Capture)
        })?;

        let mut machines = self.inner.lock();
        if machines.capture.is_some() {
            tracing::debug!("Capture session already open");
            return Ok(());
        }

        machines.capture_generation += 1;
        let generation = machines.capture_generation;
        machines.transcript.clear();

        let (tx, rx) = mpsc::unbounded_channel();
        match backend.start(&self.inner.options, tx) {
            Ok(handle) => {
                machines.capture = Some(ActiveCapture { generation, handle });
                self.inner.publish_state(&mut machines);
                drop(machines);
                tokio::spawn(drive_capture(self.inner.clone(), generation, rx));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to open capture session");
                let _ = self.inner.events.send(SpeechEvent::Error {
                    capability: SpeechCapability::Capture,
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Ask the open capture session to end early. No-op when idle.
    pub fn stop_listening(&self) {
        let machines = self.inner.lock();
        if let Some(active) = machines.capture.as_ref() {
            tracing::debug!(generation = active.generation, "Stopping capture session");
            active.handle.stop();
        }
    }

    /// Queue `text` for synthesis. Blank text is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollchatError::CapabilityMissing`] when synthesis is not
    /// available, or the backend's error if the utterance cannot be queued.
    pub fn speak(&self, text: &str) -> Result<()> {
        let backend = self.inner.synthesis.as_ref().ok_or_else(|| {
            tracing::warn!("Speech synthesis requested but not available");
            EnrollchatError::CapabilityMissing(SpeechCapability::Synthesis)
        })?;

        if text.trim().is_empty() {
            return Ok(());
        }

        let mut machines = self.inner.lock();
        machines.next_utterance_id += 1;
        let id = machines.next_utterance_id;
        machines.pending_utterances.insert(id);

        let (tx, rx) = mpsc::unbounded_channel();
        let utterance = Utterance {
            id,
            text: text.to_string(),
            locale: self.inner.options.locale.clone(),
        };
        if let Err(e) = backend.enqueue(utterance, tx) {
            machines.pending_utterances.remove(&id);
            return Err(e);
        }
        drop(machines);

        tracing::debug!(id, "Queued utterance");
        tokio::spawn(drive_utterance(self.inner.clone(), id, rx));
        Ok(())
    }

    /// Flush every queued and playing utterance. The synthesis machine is
    /// idle when this returns.
    pub fn cancel_speech(&self) {
        if let Some(backend) = self.inner.synthesis.as_ref() {
            backend.cancel();
        }
        let mut machines = self.inner.lock();
        if !machines.pending_utterances.is_empty() {
            tracing::debug!(
                flushed = machines.pending_utterances.len(),
                "Cancelled speech"
            );
        }
        machines.pending_utterances.clear();
        machines.speaking = None;
        self.inner.publish_state(&mut machines);
    }

    /// Combined state: listening wins over speaking.
    pub fn state(&self) -> SpeechState {
        self.inner.lock().derived_state()
    }

    pub fn capture_state(&self) -> CaptureState {
        if self.inner.lock().capture.is_some() {
            CaptureState::Listening
        } else {
            CaptureState::Idle
        }
    }

    pub fn synthesis_state(&self) -> SynthesisState {
        if self.inner.lock().speaking.is_some() {
            SynthesisState::Speaking
        } else {
            SynthesisState::Idle
        }
    }

    /// Last transcript; empty until a capture succeeds.
    pub fn transcript(&self) -> String {
        self.inner.lock().transcript.clone()
    }

    /// Return the last transcript and clear it.
    pub fn take_transcript(&self) -> String {
        std::mem::take(&mut self.inner.lock().transcript)
    }

    /// Subscribe to state changes, transcripts and errors.
    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until no capture session is open.
    pub async fn wait_for_capture(&self) {
        let mut events = self.subscribe();
        while self.capture_state() == CaptureState::Listening {
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaptureConfig, SynthesisConfig};
    use std::time::Duration;

    /// Capture backend whose event senders the test drives by hand.
    #[derive(Debug, Default)]
    struct ManualCapture {
        sessions: Mutex<Vec<mpsc::UnboundedSender<CaptureEvent>>>,
        stops: Arc<Mutex<usize>>,
        fail: bool,
    }

    struct ManualHandle {
        stops: Arc<Mutex<usize>>,
    }

    impl CaptureHandle for ManualHandle {
        fn stop(&self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    impl CaptureBackend for ManualCapture {
        fn start(
            &self,
            _options: &CaptureOptions,
            events: mpsc::UnboundedSender<CaptureEvent>,
        ) -> Result<Box<dyn CaptureHandle>> {
            if self.fail {
                return Err(EnrollchatError::Speech("microphone busy".to_string()).into());
            }
            self.sessions.lock().unwrap().push(events);
            Ok(Box::new(ManualHandle {
                stops: self.stops.clone(),
            }))
        }
    }

    impl ManualCapture {
        fn session(&self, index: usize) -> mpsc::UnboundedSender<CaptureEvent> {
            self.sessions.lock().unwrap()[index].clone()
        }

        fn session_count(&self) -> usize {
            self.sessions.lock().unwrap().len()
        }
    }

    #[derive(Debug, Default)]
    struct ManualSynthesis {
        queued: Mutex<Vec<(Utterance, mpsc::UnboundedSender<UtteranceEvent>)>>,
        cancels: Mutex<usize>,
    }

    impl SynthesisBackend for ManualSynthesis {
        fn enqueue(
            &self,
            utterance: Utterance,
            events: mpsc::UnboundedSender<UtteranceEvent>,
        ) -> Result<()> {
            self.queued.lock().unwrap().push((utterance, events));
            Ok(())
        }

        fn cancel(&self) {
            *self.cancels.lock().unwrap() += 1;
        }
    }

    impl ManualSynthesis {
        fn utterance(&self, index: usize) -> (Utterance, mpsc::UnboundedSender<UtteranceEvent>) {
            self.queued.lock().unwrap()[index].clone()
        }
    }

    fn coordinator() -> (SpeechCoordinator, Arc<ManualCapture>, Arc<ManualSynthesis>) {
        let capture = Arc::new(ManualCapture::default());
        let synthesis = Arc::new(ManualSynthesis::default());
        let coordinator = SpeechCoordinator::new(
            Some(capture.clone()),
            Some(synthesis.clone()),
            CaptureOptions::default(),
        );
        (coordinator, capture, synthesis)
    }

    /// Let driver tasks drain their channels.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_missing_capabilities_are_reported() {
        let coordinator = SpeechCoordinator::new(None, None, CaptureOptions::default());
        assert!(!coordinator.supports(SpeechCapability::Capture));

        let err = coordinator.start_listening().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EnrollchatError>(),
            Some(EnrollchatError::CapabilityMissing(SpeechCapability::Capture))
        ));
        let err = coordinator.speak("hello").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EnrollchatError>(),
            Some(EnrollchatError::CapabilityMissing(
                SpeechCapability::Synthesis
            ))
        ));
        assert_eq!(coordinator.state(), SpeechState::Idle);

        // Still safe to call.
        coordinator.stop_listening();
        coordinator.cancel_speech();
    }

    #[tokio::test]
    async fn test_start_listening_twice_opens_one_session() {
        let (coordinator, capture, _) = coordinator();
        coordinator.start_listening().unwrap();
        coordinator.start_listening().unwrap();

        assert_eq!(capture.session_count(), 1);
        assert_eq!(coordinator.state(), SpeechState::Listening);
        assert_eq!(coordinator.capture_state(), CaptureState::Listening);
    }

    #[tokio::test]
    async fn test_result_stores_transcript_and_ends_session() {
        let (coordinator, capture, _) = coordinator();
        let mut events = coordinator.subscribe();
        coordinator.start_listening().unwrap();

        let session = capture.session(0);
        session.send(CaptureEvent::Started).unwrap();
        session
            .send(CaptureEvent::Result("book CS101".to_string()))
            .unwrap();
        settle().await;

        assert_eq!(coordinator.transcript(), "book CS101");
        assert_eq!(coordinator.state(), SpeechState::Idle);
        assert_eq!(*capture.stops.lock().unwrap(), 1);

        assert_eq!(
            events.recv().await.unwrap(),
            SpeechEvent::StateChanged(SpeechState::Listening)
        );
        assert_eq!(
            events.recv().await.unwrap(),
            SpeechEvent::Transcript("book CS101".to_string())
        );
        assert_eq!(
            events.recv().await.unwrap(),
            SpeechEvent::StateChanged(SpeechState::Idle)
        );
    }

    #[tokio::test]
    async fn test_second_result_from_same_session_is_ignored() {
        let (coordinator, capture, _) = coordinator();
        coordinator.start_listening().unwrap();
        let session = capture.session(0);
        session.send(CaptureEvent::Result("first".into())).unwrap();
        session.send(CaptureEvent::Result("second".into())).unwrap();
        settle().await;

        assert_eq!(coordinator.transcript(), "first");
    }

    #[tokio::test]
    async fn test_start_listening_clears_previous_transcript() {
        let (coordinator, capture, _) = coordinator();
        coordinator.start_listening().unwrap();
        capture
            .session(0)
            .send(CaptureEvent::Result("old".into()))
            .unwrap();
        settle().await;
        assert_eq!(coordinator.transcript(), "old");

        coordinator.start_listening().unwrap();
        assert_eq!(coordinator.transcript(), "");
        assert_eq!(capture.session_count(), 2);
    }

    #[tokio::test]
    async fn test_stale_events_from_old_session_are_ignored() {
        let (coordinator, capture, _) = coordinator();
        coordinator.start_listening().unwrap();
        let old = capture.session(0);
        old.send(CaptureEvent::Ended).unwrap();
        settle().await;

        coordinator.start_listening().unwrap();
        let _ = old.send(CaptureEvent::Result("late".into()));
        settle().await;

        assert_eq!(coordinator.transcript(), "");
        assert_eq!(coordinator.state(), SpeechState::Listening);
    }

    #[tokio::test]
    async fn test_capture_error_resets_state_and_keeps_transcript() {
        let (coordinator, capture, _) = coordinator();
        let mut events = coordinator.subscribe();
        coordinator.start_listening().unwrap();
        capture
            .session(0)
            .send(CaptureEvent::Error("no-speech".into()))
            .unwrap();
        settle().await;

        assert_eq!(coordinator.state(), SpeechState::Idle);
        assert_eq!(coordinator.transcript(), "");

        let _listening = events.recv().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            SpeechEvent::Error {
                capability: SpeechCapability::Capture,
                message: "no-speech".into()
            }
        );

        // Can listen again after an error.
        coordinator.start_listening().unwrap();
        assert_eq!(capture.session_count(), 2);
    }

    #[tokio::test]
    async fn test_backend_start_failure_leaves_idle() {
        let capture = Arc::new(ManualCapture {
            fail: true,
            ..ManualCapture::default()
        });
        let coordinator = SpeechCoordinator::new(Some(capture), None, CaptureOptions::default());
        coordinator.start_listening().unwrap();
        assert_eq!(coordinator.state(), SpeechState::Idle);
    }

    #[tokio::test]
    async fn test_dropped_backend_sender_ends_session() {
        let (coordinator, capture, _) = coordinator();
        coordinator.start_listening().unwrap();
        capture.sessions.lock().unwrap().clear();
        settle().await;
        assert_eq!(coordinator.state(), SpeechState::Idle);
    }

    #[tokio::test]
    async fn test_stop_listening_requests_stop_and_is_idempotent() {
        let (coordinator, capture, _) = coordinator();
        coordinator.stop_listening();
        assert_eq!(*capture.stops.lock().unwrap(), 0);

        coordinator.start_listening().unwrap();
        coordinator.stop_listening();
        assert_eq!(*capture.stops.lock().unwrap(), 1);

        capture.session(0).send(CaptureEvent::Ended).unwrap();
        settle().await;
        assert_eq!(coordinator.state(), SpeechState::Idle);
        coordinator.stop_listening();
        assert_eq!(*capture.stops.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_speaking_follows_utterance_events() {
        let (coordinator, _, synthesis) = coordinator();
        coordinator.speak("Enrolled in CS101.").unwrap();
        let (utterance, events) = synthesis.utterance(0);
        assert_eq!(utterance.text, "Enrolled in CS101.");
        assert_eq!(utterance.locale, "ko-KR");
        assert_eq!(coordinator.state(), SpeechState::Idle);

        events.send(UtteranceEvent::Started(utterance.id)).unwrap();
        settle().await;
        assert_eq!(coordinator.state(), SpeechState::Speaking);
        assert_eq!(coordinator.synthesis_state(), SynthesisState::Speaking);

        events.send(UtteranceEvent::Ended(utterance.id)).unwrap();
        settle().await;
        assert_eq!(coordinator.state(), SpeechState::Idle);
    }

    #[tokio::test]
    async fn test_synthesis_error_returns_to_idle() {
        let (coordinator, _, synthesis) = coordinator();
        coordinator.speak("hello").unwrap();
        let (utterance, events) = synthesis.utterance(0);
        events.send(UtteranceEvent::Started(utterance.id)).unwrap();
        events
            .send(UtteranceEvent::Error {
                id: utterance.id,
                error: "audio-busy".into(),
            })
            .unwrap();
        settle().await;
        assert_eq!(coordinator.state(), SpeechState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_speech_is_synchronous_and_flushes_queue() {
        let (coordinator, _, synthesis) = coordinator();
        coordinator.speak("one").unwrap();
        coordinator.speak("two").unwrap();
        let (first, first_events) = synthesis.utterance(0);
        let (second, second_events) = synthesis.utterance(1);
        first_events.send(UtteranceEvent::Started(first.id)).unwrap();
        settle().await;
        assert_eq!(coordinator.state(), SpeechState::Speaking);

        coordinator.cancel_speech();
        assert_eq!(coordinator.state(), SpeechState::Idle);
        assert_eq!(*synthesis.cancels.lock().unwrap(), 1);

        // Late events from flushed utterances change nothing.
        let _ = second_events.send(UtteranceEvent::Started(second.id));
        settle().await;
        assert_eq!(coordinator.state(), SpeechState::Idle);
    }

    #[tokio::test]
    async fn test_speak_ignores_blank_text() {
        let (coordinator, _, synthesis) = coordinator();
        coordinator.speak("   ").unwrap();
        assert!(synthesis.queued.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listening_wins_over_speaking() {
        let (coordinator, _, synthesis) = coordinator();
        coordinator.speak("hello").unwrap();
        let (utterance, events) = synthesis.utterance(0);
        events.send(UtteranceEvent::Started(utterance.id)).unwrap();
        settle().await;

        coordinator.start_listening().unwrap();
        assert_eq!(coordinator.state(), SpeechState::Listening);
        assert_eq!(coordinator.synthesis_state(), SynthesisState::Speaking);
    }

    #[tokio::test]
    async fn test_take_transcript_clears_it() {
        let (coordinator, capture, _) = coordinator();
        coordinator.start_listening().unwrap();
        capture
            .session(0)
            .send(CaptureEvent::Result("drop CS101".into()))
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while coordinator.transcript().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(coordinator.take_transcript(), "drop CS101");
        assert_eq!(coordinator.transcript(), "");
    }

    #[tokio::test]
    async fn test_wait_for_capture_returns_when_session_ends() {
        let (coordinator, capture, _) = coordinator();
        coordinator.wait_for_capture().await;

        coordinator.start_listening().unwrap();
        let session = capture.session(0);
        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait_for_capture().await })
        };
        settle().await;
        assert!(!waiter.is_finished());

        session.send(CaptureEvent::Result("hi".into())).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(coordinator.transcript(), "hi");
    }

    #[test]
    fn test_from_config_without_commands_has_no_capabilities() {
        let coordinator = SpeechCoordinator::from_config(&SpeechConfig::default()).unwrap();
        assert!(!coordinator.supports(SpeechCapability::Capture));
        assert!(!coordinator.supports(SpeechCapability::Synthesis));
    }

    #[test]
    fn test_from_config_with_commands() {
        let config = SpeechConfig {
            locale: "en-US".to_string(),
            capture: CaptureConfig {
                command: vec!["recognize".into(), "{locale}".into()],
                ..CaptureConfig::default()
            },
            synthesis: SynthesisConfig {
                command: vec!["say".into(), "{text}".into()],
            },
        };
        let coordinator = SpeechCoordinator::from_config(&config).unwrap();
        assert!(coordinator.supports(SpeechCapability::Capture));
        assert!(coordinator.supports(SpeechCapability::Synthesis));
        assert_eq!(coordinator.inner.options.locale, "en-US");
    }
}
