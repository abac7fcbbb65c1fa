//! Shared fakes for integration tests
//!
//! Not every test binary uses every helper.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use enrollchat::error::{EnrollchatError, Result};
use enrollchat::speech::{
    CaptureBackend, CaptureEvent, CaptureHandle, CaptureOptions, SynthesisBackend, Utterance,
    UtteranceEvent,
};
use enrollchat::transport::AgentTransport;

pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Scripted reply for one message
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Failure,
}

/// Agent transport answering from a script.
///
/// Unscripted messages get `"ok: <message>"` immediately.
#[derive(Debug, Default)]
pub struct FakeTransport {
    script: Mutex<HashMap<String, (Duration, Reply)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, message: &str, delay: Duration, text: &str) {
        self.script.lock().unwrap().insert(
            message.to_string(),
            (delay, Reply::Text(text.to_string())),
        );
    }

    pub fn fail(&self, message: &str, delay: Duration) {
        self.script
            .lock()
            .unwrap()
            .insert(message.to_string(), (delay, Reply::Failure));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentTransport for FakeTransport {
    async fn send(&self, message: &str) -> Result<String> {
        self.calls.lock().unwrap().push(message.to_string());
        let scripted = self.script.lock().unwrap().get(message).cloned();
        match scripted {
            Some((delay, reply)) => {
                tokio::time::sleep(delay).await;
                match reply {
                    Reply::Text(text) => Ok(text),
                    Reply::Failure => {
                        Err(EnrollchatError::Transport("connection refused".to_string()).into())
                    }
                }
            }
            None => Ok(format!("ok: {message}")),
        }
    }
}

/// Capture primitive driven by the test through [`FakeCapture::emit`].
#[derive(Debug, Default)]
pub struct FakeCapture {
    sessions: Mutex<Vec<mpsc::UnboundedSender<CaptureEvent>>>,
    options: Mutex<Vec<CaptureOptions>>,
    stop_requests: Arc<Mutex<usize>>,
}

struct FakeCaptureHandle {
    stop_requests: Arc<Mutex<usize>>,
}

impl CaptureHandle for FakeCaptureHandle {
    fn stop(&self) {
        *self.stop_requests.lock().unwrap() += 1;
    }
}

impl CaptureBackend for FakeCapture {
    fn start(
        &self,
        options: &CaptureOptions,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureHandle>> {
        self.options.lock().unwrap().push(options.clone());
        self.sessions.lock().unwrap().push(events);
        Ok(Box::new(FakeCaptureHandle {
            stop_requests: self.stop_requests.clone(),
        }))
    }
}

impl FakeCapture {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn last_options(&self) -> Option<CaptureOptions> {
        self.options.lock().unwrap().last().cloned()
    }

    pub fn stop_requests(&self) -> usize {
        *self.stop_requests.lock().unwrap()
    }

    /// Deliver an event to the most recent session; ignored if it has ended.
    pub fn emit(&self, event: CaptureEvent) {
        if let Some(session) = self.sessions.lock().unwrap().last() {
            let _ = session.send(event);
        }
    }
}

/// Synthesis primitive driven by the test.
#[derive(Debug, Default)]
pub struct FakeSynthesis {
    queued: Mutex<Vec<(Utterance, mpsc::UnboundedSender<UtteranceEvent>)>>,
    cancels: Mutex<usize>,
}

impl SynthesisBackend for FakeSynthesis {
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

impl FakeSynthesis {
    pub fn queued_texts(&self) -> Vec<String> {
        self.queued
            .lock()
            .unwrap()
            .iter()
            .map(|(u, _)| u.text.clone())
            .collect()
    }

    pub fn cancels(&self) -> usize {
        *self.cancels.lock().unwrap()
    }

    pub fn start(&self, index: usize) {
        let (utterance, events) = self.queued.lock().unwrap()[index].clone();
        let _ = events.send(UtteranceEvent::Started(utterance.id));
    }

    pub fn finish(&self, index: usize) {
        let (utterance, events) = self.queued.lock().unwrap()[index].clone();
        let _ = events.send(UtteranceEvent::Ended(utterance.id));
    }
}

/// Let spawned driver tasks run.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
