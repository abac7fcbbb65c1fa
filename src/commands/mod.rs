/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `chat` - Interactive chat with voice input and output
- `send` - Send one message and print the reply
- `auth` - Manage the identity token kept in the OS keyring

These handlers are small and wire together the library components:
identity provider, agent transport, session controller and speech
coordinator.
*/

use std::sync::Arc;
use std::time::Duration;

use crate::auth::create_identity_provider;
use crate::config::Config;
use crate::error::Result;
use crate::session::SessionController;
use crate::transport::HttpAgentTransport;

// Special commands parser for the chat prompt
pub mod special_commands;

/// Build a session talking to the configured agent endpoint.
///
/// # Errors
///
/// Returns an error if the identity provider or transport cannot be built
/// from `config`.
pub fn build_session(config: &Config) -> Result<SessionController> {
    let identity = create_identity_provider(&config.identity)?;
    let transport = HttpAgentTransport::from_config(&config.agent, identity)?;
    tracing::debug!(endpoint = %transport.endpoint(), "Agent transport ready");

    Ok(SessionController::new(
        Arc::new(transport),
        &config.session,
        Duration::from_secs(config.agent.request_timeout_seconds),
    ))
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Runs a readline loop over a [`SessionController`]. Each submitted line
    //! is a message for the agent; the prompt is not shown again until the
    //! reply (or the fallback apology) has been appended. `/listen` captures
    //! one utterance whose transcript is pre-filled as the next draft so the
    //! user can edit it before pressing Enter.

    use super::*;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::error::EnrollchatError;
    use crate::session::{Message, MessageRole, SessionStatus};
    use crate::speech::{SpeechCapability, SpeechCoordinator, SpeechState};
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use enrollchat::commands::chat;
    /// use enrollchat::config::Config;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// chat::run_chat(Config::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_chat(config: Config) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let session = build_session(&config)?;
        let speech = SpeechCoordinator::from_config(&config.speech)?;

        let mut rl = DefaultEditor::new()?;
        let mut draft = String::new();

        print_welcome_banner(&config, &speech);

        loop {
            let prompt = format_prompt(speech.state());
            let line = if draft.is_empty() {
                rl.readline(&prompt)
            } else {
                let initial = std::mem::take(&mut draft);
                rl.readline_with_initial(&prompt, (&initial, ""))
            };

            match line {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::Listen) => {
                            if let Some(transcript) = listen(&speech).await {
                                draft = transcript;
                            }
                            continue;
                        }
                        Ok(SpecialCommand::Speak) => {
                            speak_last_reply(&session, &speech);
                            continue;
                        }
                        Ok(SpecialCommand::CancelSpeech) => {
                            speech.cancel_speech();
                            println!("{}", "Speech cancelled".dimmed());
                            continue;
                        }
                        Ok(SpecialCommand::ShowHistory) => {
                            print_history(&session.history());
                            continue;
                        }
                        Ok(SpecialCommand::ShowStatus) => {
                            print_status_display(&config, &session, &speech);
                            continue;
                        }
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::None) => {
                            // Regular message for the agent
                        }
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    }

                    rl.add_history_entry(trimmed)?;

                    // Input stays closed until the reply lands.
                    if let Some(reply) = session.send_message(&line) {
                        println!("{}", "…".dimmed());
                        if let Err(e) = reply.await {
                            tracing::error!("Reply task failed: {}", e);
                        }
                        if let Some(message) = session.last_agent_message() {
                            print_agent_message(&message);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        speech.stop_listening();
        speech.cancel_speech();
        if session.status() == SessionStatus::AwaitingAgentReply {
            session.wait_until_idle().await;
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Capture one utterance; Ctrl-C stops listening early.
    async fn listen(speech: &SpeechCoordinator) -> Option<String> {
        if let Err(e) = speech.start_listening() {
            print_capability_notice(&e);
            return None;
        }

        println!("{}", "Listening... (Ctrl-C to stop)".cyan());
        tokio::select! {
            _ = speech.wait_for_capture() => {}
            _ = tokio::signal::ctrl_c() => {
                speech.stop_listening();
                speech.wait_for_capture().await;
            }
        }

        let transcript = speech.take_transcript();
        if transcript.is_empty() {
            println!("{}", "Nothing was recognized".yellow());
            None
        } else {
            println!("{}", "Transcript ready; edit it and press Enter to send".dimmed());
            Some(transcript)
        }
    }

    fn speak_last_reply(session: &SessionController, speech: &SpeechCoordinator) {
        let Some(message) = session.last_agent_message() else {
            println!("{}", "No agent reply to speak yet".yellow());
            return;
        };
        if let Err(e) = speech.speak(&message.text) {
            print_capability_notice(&e);
        }
    }

    fn print_capability_notice(error: &anyhow::Error) {
        match error.downcast_ref::<EnrollchatError>() {
            Some(EnrollchatError::CapabilityMissing(capability)) => {
                eprintln!("{}", format!("{} is not available here.", capability).yellow());
                match capability {
                    SpeechCapability::Capture => eprintln!(
                        "Set speech.capture.command in the config file to enable /listen."
                    ),
                    SpeechCapability::Synthesis => eprintln!(
                        "Set speech.synthesis.command in the config file to enable /speak."
                    ),
                }
            }
            _ => eprintln!("{}", format!("Error: {}", error).red()),
        }
    }

    fn format_prompt(state: SpeechState) -> String {
        match state {
            SpeechState::Idle => format!("{} ", "you>".green().bold()),
            SpeechState::Listening => format!("{} {} ", "[mic]".cyan(), "you>".green().bold()),
            SpeechState::Speaking => {
                format!("{} {} ", "[speaking]".magenta(), "you>".green().bold())
            }
        }
    }

    fn print_agent_message(message: &Message) {
        println!("\n{} {}\n", "agent>".blue().bold(), message.text);
    }

    fn print_history(history: &[Message]) {
        if history.is_empty() {
            println!("{}", "No messages yet".dimmed());
            return;
        }
        println!();
        for message in history {
            let time = message
                .created_at
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S");
            let who = match message.role {
                MessageRole::User => "you  ".green(),
                MessageRole::Agent => "agent".blue(),
            };
            println!("{} {} {}", time.to_string().dimmed(), who, message.text);
        }
        println!();
    }

    /// Display welcome banner at the start of interactive chat mode
    fn print_welcome_banner(config: &Config, speech: &SpeechCoordinator) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║          Enrollchat - Course Registration Assistant          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Agent:  {}", config.agent.base_url.cyan());
        println!(
            "Voice:  input {}, output {}\n",
            availability(speech.supports(SpeechCapability::Capture)),
            availability(speech.supports(SpeechCapability::Synthesis)),
        );
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

    fn availability(available: bool) -> colored::ColoredString {
        if available {
            "on".green()
        } else {
            "off".dimmed()
        }
    }

    /// Display session status, called for '/status'
    fn print_status_display(config: &Config, session: &SessionController, speech: &SpeechCoordinator) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   Enrollchat Session Status                  ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Agent Endpoint:    {}{}", config.agent.base_url, config.agent.chat_path);
        println!("Identity:          {:?}", config.identity.kind);
        println!("Session Status:    {}", session.status());
        println!("Conversation Size: {} messages", session.history().len());
        println!("Speech State:      {}", speech.state());
        println!("Speech Locale:     {}", config.speech.locale);
        println!(
            "Voice Input:       {}",
            availability(speech.supports(SpeechCapability::Capture))
        );
        println!(
            "Voice Output:      {}",
            availability(speech.supports(SpeechCapability::Synthesis))
        );
        println!();
    }

}

// One-shot send handler
pub mod send {
    use super::*;

    /// Send `message`, print the reply (or the fallback text) and return.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is blank or the session cannot be
    /// built. Agent failures are not errors: the fallback text is printed.
    pub async fn run_send(config: Config, message: String) -> Result<()> {
        let session = build_session(&config)?;

        let Some(reply) = session.send_message(&message) else {
            anyhow::bail!("message must not be empty");
        };
        reply.await?;

        if let Some(reply) = session.last_agent_message() {
            println!("{}", reply.text);
        }
        Ok(())
    }
}

/// Auth command(s)
///
/// Stores, removes and inspects the bearer token used when
/// `identity.type` is `keyring`.
pub mod auth {
    use super::*;
    use crate::auth::{StoredToken, TokenStore};
    use crate::config::IdentityKind;

    /// Save `token` for the configured keyring account
    pub async fn login(config: Config, token: String, expires_in: Option<i64>) -> Result<()> {
        let account = &config.identity.account;
        tracing::info!(account = %account, "Storing identity token");

        let stored = StoredToken::new(token.trim(), expires_in);
        TokenStore.save_token(account, &stored)?;

        println!("Token stored for account '{}'.", account);
        if let Some(expires_at) = stored.expires_at {
            println!("Expires at {}.", expires_at.to_rfc3339());
        }
        if config.identity.kind != IdentityKind::Keyring {
            println!(
                "Note: identity.type is '{:?}'; set it to 'keyring' to use this token.",
                config.identity.kind
            );
        }
        Ok(())
    }

    /// Remove the stored token, if any
    pub async fn logout(config: Config) -> Result<()> {
        let account = &config.identity.account;
        TokenStore.delete_token(account)?;
        println!("Signed out of account '{}'.", account);
        Ok(())
    }

    /// Show who the configured provider signs requests as, without
    /// printing any token
    pub async fn status(config: Config) -> Result<()> {
        println!("Identity provider: {:?}", config.identity.kind);

        let provider = create_identity_provider(&config.identity)?;
        match provider.current_identity().await {
            Some(identity) => println!("Signed in as {} ({})", identity.uid, identity.role),
            None => println!("Not signed in; requests carry no credential"),
        }

        if config.identity.kind == IdentityKind::Keyring {
            let account = &config.identity.account;
            if let Some(stored) = TokenStore.load_token(account)? {
                let expiry = match stored.expires_at {
                    Some(at) if stored.is_expired() => format!("expired at {}", at.to_rfc3339()),
                    Some(at) => format!("valid until {}", at.to_rfc3339()),
                    None => "no expiry".to_string(),
                };
                println!("Keyring token for '{}': {}", account, expiry);
            }
        }
        Ok(())
    }
}
