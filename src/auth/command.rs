//! Token minting through an external command
//!
//! [`CommandIdentity`] runs a configured command (for example
//! `gcloud auth print-identity-token`) every time a token is needed and uses
//! its trimmed standard output as the bearer token.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::auth::{Identity, IdentityProvider};
use crate::error::{EnrollchatError, Result};

/// Identity provider that mints a token per call by running a command.
#[derive(Debug, Clone)]
pub struct CommandIdentity {
    program: String,
    args: Vec<String>,
}

impl CommandIdentity {
    /// Create a provider from an argv-style command line.
    ///
    /// # Errors
    ///
    /// Returns `EnrollchatError::Config` if `command` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use enrollchat::auth::CommandIdentity;
    ///
    /// let provider = CommandIdentity::new(vec!["echo".into(), "tok".into()]).unwrap();
    /// assert_eq!(provider.program(), "echo");
    /// assert!(CommandIdentity::new(Vec::new()).is_err());
    /// ```
    pub fn new(command: Vec<String>) -> Result<Self> {
        let mut parts = command.into_iter();
        let program = parts.next().filter(|p| !p.trim().is_empty()).ok_or_else(|| {
            EnrollchatError::Config("identity.command must name a program".to_string())
        })?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Program that mints tokens.
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl IdentityProvider for CommandIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        Some(Identity::new(format!("command:{}", self.program)))
    }

    async fn fresh_token(&self) -> Result<Option<String>> {
        tracing::debug!(program = %self.program, "Minting identity token");

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                EnrollchatError::Authentication(format!(
                    "failed to run token command {}: {}",
                    self.program, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnrollchatError::Authentication(format!(
                "token command {} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ))
            .into());
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(EnrollchatError::Authentication(format!(
                "token command {} produced no output",
                self.program
            ))
            .into());
        }

        Ok(Some(token))
    }
}
