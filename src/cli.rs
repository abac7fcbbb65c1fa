//! Command-line interface definition for Enrollchat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, one-shot messages, and
//! identity token management.

use clap::{Parser, Subcommand};

/// Enrollchat - conversational course-enrollment client
///
/// Talk to the course-registration agent by typing or speaking.
#[derive(Parser, Debug, Clone)]
#[command(name = "enrollchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Override the agent API base URL
    #[arg(long)]
    pub agent_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Enrollchat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session with the enrollment agent
    Chat,

    /// Send a single message and print the agent's reply
    Send {
        /// Message text
        message: String,
    },

    /// Manage the identity token stored in the OS keyring
    Auth {
        /// Token management subcommand
        #[command(subcommand)]
        command: AuthCommand,
    },
}

/// Keyring token subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Store an identity token
    Login {
        /// Bearer token to store
        #[arg(long)]
        token: String,

        /// Seconds until the token expires
        #[arg(long)]
        expires_in: Option<i64>,
    },

    /// Remove the stored identity token
    Logout,

    /// Show whether a usable token is stored
    Status,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            agent_url: None,
            verbose: false,
            command: Commands::Chat,
        }
    }
}
