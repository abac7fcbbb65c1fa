//! Configuration management for Enrollchat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{EnrollchatError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Apology shown in place of an agent reply when the round trip fails.
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "Sorry, I encountered an error matching your request. Please try again.";

/// Upper bound accepted for `agent.request_timeout_seconds`.
const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 600;

/// Main configuration structure for Enrollchat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote agent endpoint settings
    #[serde(default)]
    pub agent: AgentEndpointConfig,
    /// Where bearer tokens come from
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Session controller behavior
    #[serde(default)]
    pub session: SessionConfig,
    /// Speech capture and synthesis settings
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote agent endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEndpointConfig {
    /// Base URL of the course-registration API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the conversational endpoint, appended to `base_url`
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Upper bound on a single agent round trip (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_chat_path() -> String {
    "/api/agent/chat".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for AgentEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_path: default_chat_path(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl AgentEndpointConfig {
    /// Full URL of the conversational endpoint.
    ///
    /// # Errors
    ///
    /// Returns `EnrollchatError::Config` if the base URL cannot be parsed
    /// or the path cannot be joined onto it.
    ///
    /// # Examples
    ///
    /// ```
    /// use enrollchat::config::AgentEndpointConfig;
    ///
    /// let config = AgentEndpointConfig::default();
    /// let url = config.endpoint_url().unwrap();
    /// assert_eq!(url.as_str(), "http://localhost:8000/api/agent/chat");
    /// ```
    pub fn endpoint_url(&self) -> Result<url::Url> {
        let base = url::Url::parse(&self.base_url).map_err(|e| {
            EnrollchatError::Config(format!("Invalid agent.base_url {}: {}", self.base_url, e))
        })?;
        let joined = format!(
            "{}{}",
            base.as_str().trim_end_matches('/'),
            self.chat_path
        );
        url::Url::parse(&joined).map_err(|e| {
            EnrollchatError::Config(format!("Invalid agent endpoint {}: {}", joined, e)).into()
        })
    }
}

/// Which identity provider mints bearer tokens
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// No identity; requests carry no credential
    #[default]
    None,
    /// A fixed token from configuration or the environment
    Static,
    /// A token minted by running an external command on every request
    Command,
    /// A token read from the OS keyring on every request
    Keyring,
}

impl IdentityKind {
    fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "static" => Some(Self::Static),
            "command" => Some(Self::Command),
            "keyring" => Some(Self::Keyring),
            _ => None,
        }
    }
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Provider type
    #[serde(rename = "type", default)]
    pub kind: IdentityKind,

    /// Token used by the static provider
    #[serde(default)]
    pub token: Option<String>,

    /// Command (program followed by arguments) used by the command provider
    #[serde(default)]
    pub command: Vec<String>,

    /// Keyring account name used by the keyring provider
    #[serde(default = "default_keyring_account")]
    pub account: String,
}

fn default_keyring_account() -> String {
    "default".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            kind: IdentityKind::default(),
            token: None,
            command: Vec::new(),
            account: default_keyring_account(),
        }
    }
}

/// Order in which agent replies are appended when sends overlap
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOrdering {
    /// Replies are appended as their requests complete
    #[default]
    Completion,
    /// Requests run one at a time so replies follow request order
    Request,
}

impl ReplyOrdering {
    fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "completion" => Some(Self::Completion),
            "request" => Some(Self::Request),
            _ => None,
        }
    }
}

/// Session controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Text of the agent message appended when a round trip fails
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// Reply ordering under overlapping sends
    #[serde(default)]
    pub reply_ordering: ReplyOrdering,

    /// Capacity of the session event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_fallback_message() -> String {
    DEFAULT_FALLBACK_MESSAGE.to_string()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fallback_message: default_fallback_message(),
            reply_ordering: ReplyOrdering::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Speech capture and synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Spoken-language locale for both capture and synthesis
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Speech-to-text settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Text-to-speech settings
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

fn default_locale() -> String {
    "ko-KR".to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            capture: CaptureConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Recognizer command; `{locale}` is substituted. Empty disables capture.
    #[serde(default)]
    pub command: Vec<String>,

    /// Number of recognition alternatives requested
    #[serde(default = "default_max_alternatives")]
    pub max_alternatives: u32,

    /// Whether interim (non-final) results are requested
    #[serde(default)]
    pub interim_results: bool,
}

fn default_max_alternatives() -> u32 {
    1
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            max_alternatives: default_max_alternatives(),
            interim_results: false,
        }
    }
}

/// Text-to-speech configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Synthesizer command; `{locale}` and `{text}` are substituted. Empty
    /// disables synthesis.
    #[serde(default)]
    pub command: Vec<String>,
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Optional file that receives a copy of the log output
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let (config, warnings) = Self::load_with_warnings(path, cli)?;
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// Like [`Config::load`], but hands back the load-time warnings instead
    /// of logging them, for callers that install logging from the loaded
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load_with_warnings(path: &str, cli: &crate::cli::Cli) -> Result<(Self, Vec<String>)> {
        let mut warnings = Vec::new();
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            warnings.push(format!("Config file not found at {}, using defaults", path));
            Self::default()
        };

        warnings.extend(config.apply_env_vars());
        config.apply_cli_overrides(cli);

        Ok((config, warnings))
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EnrollchatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| EnrollchatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Ok(url) = std::env::var("ENROLLCHAT_AGENT_URL") {
            self.agent.base_url = url;
        }

        if let Ok(timeout) = std::env::var("ENROLLCHAT_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.agent.request_timeout_seconds = value;
            } else {
                warnings.push(format!(
                    "Invalid ENROLLCHAT_REQUEST_TIMEOUT_SECONDS: {}",
                    timeout
                ));
            }
        }

        let identity_override = std::env::var("ENROLLCHAT_IDENTITY").ok();
        if let Some(kind) = &identity_override {
            match IdentityKind::parse_str(kind) {
                Some(kind) => self.identity.kind = kind,
                None => warnings.push(format!("Invalid ENROLLCHAT_IDENTITY: {}", kind)),
            }
        }

        if let Ok(token) = std::env::var("ENROLLCHAT_ID_TOKEN") {
            self.identity.token = Some(token);
            if identity_override.is_none() {
                self.identity.kind = IdentityKind::Static;
            }
        }

        if let Ok(locale) = std::env::var("ENROLLCHAT_SPEECH_LOCALE") {
            self.speech.locale = locale;
        }

        if let Ok(ordering) = std::env::var("ENROLLCHAT_REPLY_ORDERING") {
            match ReplyOrdering::parse_str(&ordering) {
                Some(ordering) => self.session.reply_ordering = ordering,
                None => warnings.push(format!("Invalid ENROLLCHAT_REPLY_ORDERING: {}", ordering)),
            }
        }

        warnings
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(url) = &cli.agent_url {
            self.agent.base_url = url.clone();
        }
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.agent.base_url.trim().is_empty() {
            return Err(
                EnrollchatError::Config("agent.base_url cannot be empty".to_string()).into(),
            );
        }

        let base = url::Url::parse(&self.agent.base_url).map_err(|e| {
            EnrollchatError::Config(format!(
                "agent.base_url is not a valid URL: {} ({})",
                self.agent.base_url, e
            ))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(EnrollchatError::Config(format!(
                "agent.base_url must use http or https, got {}",
                base.scheme()
            ))
            .into());
        }

        if !self.agent.chat_path.starts_with('/') {
            return Err(
                EnrollchatError::Config("agent.chat_path must start with '/'".to_string()).into(),
            );
        }

        if self.agent.request_timeout_seconds == 0 {
            return Err(EnrollchatError::Config(
                "agent.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.agent.request_timeout_seconds > MAX_REQUEST_TIMEOUT_SECONDS {
            return Err(EnrollchatError::Config(format!(
                "agent.request_timeout_seconds must be less than or equal to {}",
                MAX_REQUEST_TIMEOUT_SECONDS
            ))
            .into());
        }

        match self.identity.kind {
            IdentityKind::Static => {
                let missing = self
                    .identity
                    .token
                    .as_deref()
                    .map(|t| t.trim().is_empty())
                    .unwrap_or(true);
                if missing {
                    return Err(EnrollchatError::Config(
                        "identity.token is required for the static identity provider".to_string(),
                    )
                    .into());
                }
            }
            IdentityKind::Command => {
                if self.identity.command.is_empty() {
                    return Err(EnrollchatError::Config(
                        "identity.command is required for the command identity provider"
                            .to_string(),
                    )
                    .into());
                }
            }
            IdentityKind::Keyring | IdentityKind::None => {}
        }

        if self.session.fallback_message.trim().is_empty() {
            return Err(EnrollchatError::Config(
                "session.fallback_message cannot be empty".to_string(),
            )
            .into());
        }

        if self.session.event_capacity == 0 {
            return Err(EnrollchatError::Config(
                "session.event_capacity must be greater than 0".to_string(),
            )
            .into());
        }

        if self.speech.locale.trim().is_empty() {
            return Err(
                EnrollchatError::Config("speech.locale cannot be empty".to_string()).into(),
            );
        }

        if self.speech.capture.max_alternatives == 0 {
            return Err(EnrollchatError::Config(
                "speech.capture.max_alternatives must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
