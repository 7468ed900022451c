//! Long-lived client credentials and secret wrappers.
//!
//! The API key and every bearer token live in a [`SecretString`], which is
//! zeroed on drop and redacted in `Debug`/`Display`, so neither can leak
//! through `tracing` fields or panics.
//!
//! ```rust
//! use paywire_core::credentials::{ClientCredentials, SecretString};
//!
//! let creds = ClientCredentials::new("client-123", "sk_live_abc").with_login_as("acct_42");
//! assert_eq!(format!("{:?}", creds.api_key), "[REDACTED]");
//! assert_eq!(creds.login_as.as_deref(), Some("acct_42"));
//! ```

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string that is zeroed when dropped and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Creates a new secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    ///
    /// Use the reference immediately; do not persist it.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns the length of the secret string.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the secret string is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Credentials exchanged for a bearer token at login.
///
/// Sent as `x-client-id`, `x-api-key` and, for multi-account setups,
/// `x-login-as`.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    /// Public client identifier.
    pub client_id: String,
    /// Long-lived API key.
    pub api_key: SecretString,
    /// Optional account selector for multi-account credentials.
    pub login_as: Option<String>,
}

impl ClientCredentials {
    /// Creates credentials without an account selector.
    pub fn new(client_id: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self {
            client_id: client_id.into(),
            api_key: api_key.into(),
            login_as: None,
        }
    }

    /// Sets the account selector sent as `x-login-as`.
    #[must_use]
    pub fn with_login_as(mut self, login_as: impl Into<String>) -> Self {
        self.login_as = Some(login_as.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_redacted() {
        let secret = SecretString::new("sk_live_abc");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "sk_live_abc");
        assert_eq!(secret.len(), 11);
        assert!(!secret.is_empty());
    }

    #[test]
    fn test_secret_string_conversions() {
        let from_str: SecretString = "token".into();
        let from_string: SecretString = String::from("token").into();
        assert_eq!(from_str, from_string);
        assert!(SecretString::new("").is_empty());
    }

    #[test]
    fn test_credentials_debug_hides_api_key() {
        let creds = ClientCredentials::new("client-1", "super-secret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("client-1"));
        assert!(!debug.contains("super-secret"));
        assert!(creds.login_as.is_none());
    }
}
