//! Identity token persistence via OS keyring
//!
//! Stores the bearer token used by [`super::KeyringIdentity`] in the
//! operating system's native credential store (Keychain on macOS, Secret
//! Service on Linux, Windows Credential Manager on Windows).
//!
//! One entry per account under the `enrollchat` service, holding the
//! token record as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::error::{EnrollchatError, Result};

/// Keyring service name shared by every stored account.
const SERVICE_NAME: &str = "enrollchat";

/// A stored identity token plus the identity details shown by `auth status`.
///
/// # Examples
///
/// ```
/// use enrollchat::auth::token_store::StoredToken;
///
/// let token = StoredToken::new("id-token", None);
///
/// // No expiry: usable until replaced.
/// assert!(!token.is_expired());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// The bearer token sent to the agent endpoint.
    pub token: String,

    /// UTC timestamp at which the token stops being accepted.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// Email of the signed-in user, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Role recorded at login time.
    #[serde(default)]
    pub role: Role,
}

impl StoredToken {
    /// Create a token record with the given lifetime in seconds.
    pub fn new(token: impl Into<String>, expires_in: Option<i64>) -> Self {
        Self {
            token: token.into(),
            expires_at: expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            email: None,
            role: Role::default(),
        }
    }

    /// Returns `true` when the token is expired or about to expire.
    ///
    /// A 60-second buffer is applied so a token is not sent moments before
    /// the server would reject it. Tokens with no `expires_at` value are
    /// considered perpetually valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use enrollchat::auth::token_store::StoredToken;
    ///
    /// assert!(StoredToken::new("tok", Some(-1)).is_expired());
    /// assert!(!StoredToken::new("tok", Some(3600)).is_expired());
    /// ```
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(60);
                Utc::now() >= expires_at - buffer
            }
        }
    }
}

/// Stateless accessor for the OS native keyring.
///
/// # Examples
///
/// ```no_run
/// use enrollchat::auth::token_store::{StoredToken, TokenStore};
///
/// let store = TokenStore;
/// store.save_token("default", &StoredToken::new("tok", Some(3600))).unwrap();
/// assert!(store.load_token("default").unwrap().is_some());
/// ```
pub struct TokenStore;

impl TokenStore {
    fn entry(account: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(SERVICE_NAME, account).map_err(|e| EnrollchatError::Keyring(e).into())
    }

    /// Persists a [`StoredToken`] for the given account.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollchatError::Serialization`] if JSON serialization fails
    /// or [`EnrollchatError::Keyring`] if the OS credential store rejects the
    /// write.
    pub fn save_token(&self, account: &str, token: &StoredToken) -> Result<()> {
        let json_str = serde_json::to_string(token)?;
        Self::entry(account)?
            .set_password(&json_str)
            .map_err(EnrollchatError::Keyring)?;
        Ok(())
    }

    /// Loads the stored token for the given account.
    ///
    /// Returns `Ok(None)` when nothing has been saved, so callers can tell
    /// "not signed in" apart from a genuine keyring failure.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollchatError::Keyring`] if the OS credential store returns
    /// an unexpected error, or [`EnrollchatError::Serialization`] if the
    /// stored JSON is malformed.
    pub fn load_token(&self, account: &str) -> Result<Option<StoredToken>> {
        match Self::entry(account)?.get_password() {
            Ok(json_str) => {
                let token: StoredToken = serde_json::from_str(&json_str)?;
                Ok(Some(token))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(EnrollchatError::Keyring(e).into()),
        }
    }

    /// Deletes the stored token for the given account.
    ///
    /// This is a no-op when no token exists.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollchatError::Keyring`] if the OS credential store returns
    /// an unexpected error.
    pub fn delete_token(&self, account: &str) -> Result<()> {
        match Self::entry(account)?.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(EnrollchatError::Keyring(e).into()),
        }
    }
}
