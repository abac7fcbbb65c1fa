//! Enrollchat - conversational course-enrollment client
//!
#![doc = "Enrollchat - conversational course-enrollment client"]
#![doc = "Main entry point for the enrollchat binary."]

use anyhow::Result;

use enrollchat::cli::{AuthCommand, Cli, Commands};
use enrollchat::commands;
use enrollchat::config::Config;
use enrollchat::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let (config, warnings) = Config::load_with_warnings(config_path, &cli)?;

    // Initialize logging, then report what happened while loading
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    // Validate configuration
    config.validate()?;

    enrollchat::session::metrics::init_metrics_exporter();

    // Execute command
    match cli.command {
        Commands::Chat => {
            tracing::info!("Starting interactive chat mode");
            commands::chat::run_chat(config).await?;
            Ok(())
        }
        Commands::Send { message } => {
            tracing::info!("Sending one message");
            commands::send::run_send(config, message).await?;
            Ok(())
        }
        Commands::Auth { command } => {
            tracing::info!("Starting token management command");
            match command {
                AuthCommand::Login { token, expires_in } => {
                    commands::auth::login(config, token, expires_in).await?;
                }
                AuthCommand::Logout => commands::auth::logout(config).await?,
                AuthCommand::Status => commands::auth::status(config).await?,
            }
            Ok(())
        }
    }
}
