//! Speech primitives backed by external commands
//!
//! The recognizer and synthesizer are configured as argv lists. Arguments
//! may contain placeholders that are substituted per invocation:
//!
//! - `{locale}` -- the configured spoken-language locale
//! - `{text}` -- the utterance text (synthesis only)
//!
//! A capture command is expected to listen for one utterance and print the
//! transcript on standard output. A synthesis command is run once per
//! utterance and is expected to exit when playback finishes.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch, Notify};

use crate::error::{EnrollchatError, Result};
use crate::speech::{
    CaptureBackend, CaptureEvent, CaptureHandle, CaptureOptions, SynthesisBackend, Utterance,
    UtteranceEvent,
};

fn split_command(command: Vec<String>, section: &str) -> Result<(String, Vec<String>)> {
    let mut parts = command.into_iter();
    let program = parts
        .next()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| EnrollchatError::Config(format!("{section} must name a program")))?;
    Ok((program, parts.collect()))
}

fn substitute(args: &[String], locale: &str, text: Option<&str>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let arg = arg.replace("{locale}", locale);
            match text {
                Some(text) => arg.replace("{text}", text),
                None => arg,
            }
        })
        .collect()
}

fn spawn(program: &str, args: &[String]) -> Result<Child> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EnrollchatError::Speech(format!("failed to spawn `{program}`: {e}")))?;

    if let Some(stderr) = child.stderr.take() {
        let program = program.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(program = %program, "speech command stderr: {}", line);
            }
        });
    }
    Ok(child)
}

/// Speech-to-text through an external recognizer command.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    program: String,
    args: Vec<String>,
}

impl CommandCapture {
    /// # Errors
    ///
    /// Returns `EnrollchatError::Config` if `command` is empty.
    pub fn new(command: Vec<String>) -> Result<Self> {
        let (program, args) = split_command(command, "speech.capture.command")?;
        Ok(Self { program, args })
    }
}

struct CommandCaptureHandle {
    stop: Arc<Notify>,
}

impl CaptureHandle for CommandCaptureHandle {
    fn stop(&self) {
        self.stop.notify_one();
    }
}

impl CaptureBackend for CommandCapture {
    fn start(
        &self,
        options: &CaptureOptions,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureHandle>> {
        let args = substitute(&self.args, &options.locale, None);
        let mut child = spawn(&self.program, &args)?;
        let stdout = child.stdout.take().ok_or_else(|| {
            EnrollchatError::Speech("recognizer stdout unavailable after spawn".into())
        })?;

        let stop = Arc::new(Notify::new());
        let stop_signal = stop.clone();
        let program = self.program.clone();
        let _ = events.send(CaptureEvent::Started);

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut stopped = false;
            let mut transcript_sent = false;

            loop {
                tokio::select! {
                    _ = stop_signal.notified() => {
                        stopped = true;
                        let _ = child.start_kill();
                        break;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if !transcript_sent && !line.is_empty() {
                                transcript_sent = true;
                                let _ = events.send(CaptureEvent::Result(line.to_string()));
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = events.send(CaptureEvent::Error(format!(
                                "failed to read recognizer output: {e}"
                            )));
                            break;
                        }
                    }
                }
            }

            match child.wait().await {
                Ok(status) if !status.success() && !stopped && !transcript_sent => {
                    let _ = events.send(CaptureEvent::Error(format!(
                        "recognizer `{program}` exited with {status}"
                    )));
                }
                Err(e) => {
                    let _ = events.send(CaptureEvent::Error(format!(
                        "failed to wait for recognizer `{program}`: {e}"
                    )));
                }
                _ => {}
            }
            let _ = events.send(CaptureEvent::Ended);
        });

        Ok(Box::new(CommandCaptureHandle { stop }))
    }
}

struct QueuedUtterance {
    utterance: Utterance,
    epoch: u64,
    events: mpsc::UnboundedSender<UtteranceEvent>,
}

/// Text-to-speech through an external synthesizer command.
///
/// Utterances play one at a time in enqueue order. [`cancel`] kills the
/// playing command and skips everything queued before the call.
///
/// [`cancel`]: SynthesisBackend::cancel
#[derive(Debug)]
pub struct CommandSynthesis {
    program: String,
    args: Vec<String>,
    epoch: watch::Sender<u64>,
    queue: Mutex<Option<mpsc::UnboundedSender<QueuedUtterance>>>,
}

impl CommandSynthesis {
    /// # Errors
    ///
    /// Returns `EnrollchatError::Config` if `command` is empty.
    pub fn new(command: Vec<String>) -> Result<Self> {
        let (program, args) = split_command(command, "speech.synthesis.command")?;
        let (epoch, _) = watch::channel(0);
        Ok(Self {
            program,
            args,
            epoch,
            queue: Mutex::new(None),
        })
    }

    fn worker(&self) -> mpsc::UnboundedSender<QueuedUtterance> {
        let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(tx) = queue.as_ref().filter(|tx| !tx.is_closed()) {
            return tx.clone();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(play_queue(
            self.program.clone(),
            self.args.clone(),
            self.epoch.subscribe(),
            rx,
        ));
        *queue = Some(tx.clone());
        tx
    }
}

impl SynthesisBackend for CommandSynthesis {
    fn enqueue(
        &self,
        utterance: Utterance,
        events: mpsc::UnboundedSender<UtteranceEvent>,
    ) -> Result<()> {
        let job = QueuedUtterance {
            utterance,
            epoch: *self.epoch.borrow(),
            events,
        };
        self.worker()
            .send(job)
            .map_err(|_| EnrollchatError::Speech("synthesis queue closed".to_string()))?;
        Ok(())
    }

    fn cancel(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
    }
}

async fn play_queue(
    program: String,
    args: Vec<String>,
    mut epoch: watch::Receiver<u64>,
    mut queue: mpsc::UnboundedReceiver<QueuedUtterance>,
) {
    while let Some(job) = queue.recv().await {
        if *epoch.borrow_and_update() != job.epoch {
            tracing::trace!(id = job.utterance.id, "Skipping cancelled utterance");
            continue;
        }

        let id = job.utterance.id;
        let argv = substitute(
            &args,
            &job.utterance.locale,
            Some(job.utterance.text.as_str()),
        );
        let mut child = match spawn(&program, &argv) {
            Ok(child) => child,
            Err(e) => {
                let _ = job.events.send(UtteranceEvent::Error {
                    id,
                    error: e.to_string(),
                });
                continue;
            }
        };
        let _ = job.events.send(UtteranceEvent::Started(id));

        let outcome = loop {
            tokio::select! {
                status = child.wait() => break Some(status),
                changed = epoch.changed() => {
                    if changed.is_err() || *epoch.borrow_and_update() != job.epoch {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        break None;
                    }
                }
            }
        };

        match outcome {
            Some(Ok(status)) if status.success() => {
                let _ = job.events.send(UtteranceEvent::Ended(id));
            }
            Some(Ok(status)) => {
                let _ = job.events.send(UtteranceEvent::Error {
                    id,
                    error: format!("synthesizer `{program}` exited with {status}"),
                });
            }
            Some(Err(e)) => {
                let _ = job.events.send(UtteranceEvent::Error {
                    id,
                    error: format!("failed to wait for synthesizer `{program}`: {e}"),
                });
            }
            None => tracing::debug!(id, "Utterance cancelled during playback"),
        }
    }
}
