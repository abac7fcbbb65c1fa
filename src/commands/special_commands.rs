//! Special commands parser for interactive chat mode
//!
//! Lines starting with `/` control the session instead of being sent to
//! the agent:
//! - Capture speech into the next draft
//! - Speak the last agent reply and cancel speech
//! - Show history and status
//! - Display help information
//! - Exit the session
//!
//! Commands are case-insensitive.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command does not take the argument it was given
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Open a capture session; the transcript becomes the next draft
    Listen,

    /// Speak the most recent agent reply
    Speak,

    /// Flush all queued and playing speech
    CancelSpeech,

    /// Print the conversation so far
    ShowHistory,

    /// Print session and speech status
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; the line is a message for the agent
    None,
}

/// Parse a user input line into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if the input starts with `/` but
/// names no command, and `CommandError::UnsupportedArgument` if a command
/// that takes no argument is given one.
///
/// # Examples
///
/// ```
/// use enrollchat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/listen").unwrap(), SpecialCommand::Listen);
/// assert_eq!(parse_special_command("book CS101").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/enroll").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let mut parts = lower.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    let parsed = match command {
        "/listen" | "/mic" => SpecialCommand::Listen,
        "/speak" | "/say" => SpecialCommand::Speak,
        "/cancel" | "/hush" => SpecialCommand::CancelSpeech,
        "/history" => SpecialCommand::ShowHistory,
        "/status" => SpecialCommand::ShowStatus,
        "/help" | "/?" => SpecialCommand::Help,
        "exit" | "quit" | "/exit" | "/quit" => SpecialCommand::Exit,
        other => return Err(CommandError::UnknownCommand(other.to_string())),
    };

    if !arg.is_empty() {
        return Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        });
    }

    Ok(parsed)
}

/// Display help text for special commands
///
/// # Examples
///
/// ```
/// use enrollchat::commands::special_commands::print_help;
///
/// print_help();
/// ```
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

VOICE INPUT:
  /listen         - Listen for one utterance; it becomes your next draft
  /mic            - Same as /listen
  Ctrl-C          - Stop listening early (while listening)

VOICE OUTPUT:
  /speak          - Read the last agent reply aloud
  /say            - Same as /speak
  /cancel         - Stop speaking and drop queued speech
  /hush           - Same as /cancel

SESSION INFORMATION:
  /history        - Show the conversation so far
  /status         - Show session and speech status
  /help           - Show this help message
  /?              - Same as /help

SESSION CONTROL:
  exit            - Exit interactive mode
  quit            - Same as exit

NOTES:
  - Commands are case-insensitive
  - Regular text (not starting with /) is sent to the enrollment agent
  - A transcript is never sent on its own; edit it and press Enter
  - Replies are not read aloud unless you ask with /speak
"#
    );
}
