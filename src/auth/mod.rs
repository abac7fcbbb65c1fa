//! Identity providers for the agent transport
//!
//! The agent endpoint expects an `Authorization: Bearer <token>` header.
//! Tokens are short-lived, so the transport asks its [`IdentityProvider`]
//! for a fresh one on every call instead of caching. Providers are passed
//! to the transport at construction, which lets tests substitute doubles.
//!
//! Implementations:
//!
//! - [`NoIdentity`] -- never signed in; requests go out without a credential
//! - [`StaticIdentity`] -- a fixed token from configuration or environment
//! - [`command::CommandIdentity`] -- runs a token-minting command per call
//! - [`KeyringIdentity`] -- reads the token saved by `enrollchat auth login`

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{IdentityConfig, IdentityKind};
use crate::error::{EnrollchatError, Result};

pub mod command;
pub mod token_store;

pub use command::CommandIdentity;
pub use token_store::{StoredToken, TokenStore};

/// Role of the signed-in user on the course-registration platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular student; the default for new accounts
    #[default]
    Student,
    /// Administrator with access to the management console
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// The currently signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier
    pub uid: String,
    /// Email address, when the provider knows it
    pub email: Option<String>,
    /// Display name, when the provider knows it
    pub display_name: Option<String>,
    /// Platform role
    pub role: Role,
}

impl Identity {
    /// Create an identity with only a uid and the default role.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            role: Role::default(),
        }
    }
}

/// Source of the current identity and its bearer tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// The signed-in identity, or `None` when nobody is signed in.
    async fn current_identity(&self) -> Option<Identity>;

    /// Mint or fetch a token for exactly one outbound call.
    ///
    /// Returns `Ok(None)` when nobody is signed in, so callers need no
    /// separate identity query before asking for a token.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollchatError::Authentication`] when a token cannot be
    /// produced for a signed-in identity.
    async fn fresh_token(&self) -> Result<Option<String>>;
}

/// Provider used when no identity is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIdentity;

#[async_trait]
impl IdentityProvider for NoIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        None
    }

    async fn fresh_token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Provider that hands out one fixed token.
#[derive(Clone)]
pub struct StaticIdentity {
    token: String,
}

impl StaticIdentity {
    /// Create a provider for the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticIdentity")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        Some(Identity::new("static"))
    }

    async fn fresh_token(&self) -> Result<Option<String>> {
        Ok(Some(self.token.clone()))
    }
}

/// Provider backed by the token saved in the OS keyring.
///
/// The keyring is read on every call so a token replaced by
/// `enrollchat auth login` is picked up without restarting the session.
#[derive(Debug, Clone)]
pub struct KeyringIdentity {
    account: String,
}

impl KeyringIdentity {
    /// Create a provider for the given keyring account.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    /// Read the stored token on the blocking pool; keyring backends do
    /// synchronous IPC.
    async fn load(&self) -> Result<Option<StoredToken>> {
        let account = self.account.clone();
        tokio::task::spawn_blocking(move || TokenStore.load_token(&account))
            .await
            .map_err(|e| EnrollchatError::Authentication(format!("keyring read failed: {}", e)))?
    }
}

#[async_trait]
impl IdentityProvider for KeyringIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        match self.load().await {
            Ok(Some(stored)) => Some(Identity {
                uid: self.account.clone(),
                email: stored.email,
                display_name: None,
                role: stored.role,
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(account = %self.account, "Failed to read keyring: {}", e);
                None
            }
        }
    }

    async fn fresh_token(&self) -> Result<Option<String>> {
        match self.load().await? {
            Some(stored) if stored.is_expired() => Err(EnrollchatError::Authentication(
                "stored token has expired; run `enrollchat auth login`".to_string(),
            )
            .into()),
            Some(stored) => Ok(Some(stored.token)),
            None => Ok(None),
        }
    }
}

/// Create an identity provider based on configuration
///
/// # Errors
///
/// Returns `EnrollchatError::Config` when the selected provider is missing
/// the settings it needs.
///
/// # Examples
///
/// ```
/// use enrollchat::auth::create_identity_provider;
/// use enrollchat::config::IdentityConfig;
///
/// let provider = create_identity_provider(&IdentityConfig::default()).unwrap();
/// assert!(format!("{:?}", provider).contains("NoIdentity"));
/// ```
pub fn create_identity_provider(config: &IdentityConfig) -> Result<Arc<dyn IdentityProvider>> {
    match config.kind {
        IdentityKind::None => Ok(Arc::new(NoIdentity)),
        IdentityKind::Static => {
            let token = config.token.clone().ok_or_else(|| {
                EnrollchatError::Config("identity.token is required".to_string())
            })?;
            Ok(Arc::new(StaticIdentity::new(token)))
        }
        IdentityKind::Command => Ok(Arc::new(CommandIdentity::new(config.command.clone())?)),
        IdentityKind::Keyring => Ok(Arc::new(KeyringIdentity::new(config.account.clone()))),
    }
}
