//! Logging setup
//!
//! Human-readable or JSON output on stderr, with an optional append-only
//! log file. `RUST_LOG` overrides the configured level.

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter directive used when `RUST_LOG` is not set.
///
/// A bare level applies to this crate only; anything containing `=` or `,`
/// is taken as a full directive.
///
/// # Examples
///
/// ```
/// use enrollchat::logging::default_directive;
///
/// assert_eq!(default_directive("debug"), "enrollchat=debug");
/// assert_eq!(default_directive("enrollchat=trace,reqwest=debug"), "enrollchat=trace,reqwest=debug");
/// ```
pub fn default_directive(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("enrollchat={}", level)
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid, the log file cannot be
/// opened, or a subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use enrollchat::config::LoggingConfig;
/// use enrollchat::logging::init_logging;
///
/// init_logging(&LoggingConfig::default()).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(&config.level)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json {
        let stderr_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr);

        if let Some(file_path) = &config.file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;
            let file_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(Arc::new(file));
            registry.with(stderr_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stderr_layer).try_init()?;
        }
    } else {
        let stderr_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);

        if let Some(file_path) = &config.file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;
            let file_layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            registry.with(stderr_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stderr_layer).try_init()?;
        }
    }

    Ok(())
}
