//! Bearer token lifecycle.
//!
//! [`TokenManager`] keeps at most one access token per client and refreshes
//! it through a [`TokenSource`] when it is missing or about to expire.
//! Refresh uses double-checked locking on a `tokio::sync::RwLock`: the write
//! lock is held across the login round-trip, so callers racing on an expired
//! token wait for the one refresh in flight instead of starting their own.

use crate::config::ClientConfig;
use crate::credentials::{ClientCredentials, SecretString};
use crate::endpoint::HttpMethod;
use crate::error::{ApiErrorDetails, Error, Result};
use crate::http_client::headers::{X_API_KEY, X_CLIENT_ID, X_LOGIN_AS};
use crate::http_client::{HttpClient, HttpRequest};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// An access token and its expiry.
#[derive(Clone, Debug)]
pub struct Token {
    /// Opaque bearer value.
    pub value: SecretString,
    /// Expiry reported by the login endpoint.
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Creates a token.
    pub fn new(value: impl Into<SecretString>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Returns `true` if the token outlives `now + buffer`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        TimeDelta::from_std(buffer)
            .ok()
            .and_then(|buffer| now.checked_add_signed(buffer))
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

/// Produces fresh tokens.
///
/// Implementations report failures as [`Error::Authentication`].
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Performs one login.
    async fn login(&self) -> Result<Token>;
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
    expires_at: Option<String>,
}

/// Logs in against the API's login endpoint.
///
/// A single attempt: no retry and no circuit breaker, since a failed login
/// says nothing about the health of the payment endpoints.
#[derive(Clone)]
pub struct HttpLogin {
    http: HttpClient,
    url: Url,
    credentials: ClientCredentials,
}

impl HttpLogin {
    /// Creates a login client for `url`.
    pub fn new(http: HttpClient, url: Url, credentials: ClientCredentials) -> Self {
        Self {
            http,
            url,
            credentials,
        }
    }

    /// Creates a login client from a client configuration.
    pub fn from_config(http: HttpClient, config: &ClientConfig) -> Result<Self> {
        let url = config.url_for(&config.login_path)?;
        Ok(Self::new(http, url, config.credentials.clone()))
    }

    fn request(&self) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(HttpMethod::Post, self.url.clone())
            .header(X_CLIENT_ID, &self.credentials.client_id)?
            .sensitive_header(X_API_KEY, self.credentials.api_key.expose_secret())?;
        if let Some(login_as) = &self.credentials.login_as {
            request = request.header(X_LOGIN_AS, login_as)?;
        }
        Ok(request)
    }
}

impl fmt::Debug for HttpLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLogin")
            .field("url", &self.url.as_str())
            .field("client_id", &self.credentials.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for HttpLogin {
    #[instrument(name = "auth_login", skip(self), fields(client_id = %self.credentials.client_id))]
    async fn login(&self) -> Result<Token> {
        let request = self
            .request()
            .map_err(|e| Error::authentication(format!("invalid login credentials: {e}")))?;

        let response = self
            .http
            .send_once(&request, &CancellationToken::new())
            .await
            .map_err(|e| Error::authentication(format!("login request failed: {e}")))?;

        if !matches!(response.status, 200 | 201) {
            let details = ApiErrorDetails::from_body(
                HttpMethod::Post.as_str(),
                self.url.path(),
                response.status,
                &response.body,
            );
            return Err(Error::authentication(format!(
                "login rejected with status {}: {}",
                details.status, details.message
            )));
        }

        let body: LoginResponse = response
            .json()
            .map_err(|e| Error::authentication(format!("malformed login response: {e}")))?;
        let value = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::authentication("login response has no token"))?;
        let expires_at = body
            .expires_at
            .ok_or_else(|| Error::authentication("login response has no expires_at"))?;
        let expires_at = crate::time::parse_expiry(&expires_at)
            .map_err(|e| Error::authentication(format!("unparsable token expiry: {e}")))?;

        Ok(Token::new(value, expires_at))
    }
}

/// Caches the current token and refreshes it on demand.
pub struct TokenManager {
    source: Arc<dyn TokenSource>,
    token: RwLock<Option<Token>>,
    refresh_buffer: Duration,
}

impl TokenManager {
    /// Creates a manager with no cached token.
    pub fn new(source: Arc<dyn TokenSource>, refresh_buffer: Duration) -> Self {
        Self {
            source,
            token: RwLock::new(None),
            refresh_buffer,
        }
    }

    /// Returns a token value that stays valid for at least the refresh buffer.
    ///
    /// Logs in only when the cached token is missing or too close to expiry.
    /// On failure the previous token, if any, is left in place.
    pub async fn ensure_valid_token(&self) -> Result<SecretString> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref()
                && token.is_valid_at(Utc::now(), self.refresh_buffer)
            {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref()
            && token.is_valid_at(Utc::now(), self.refresh_buffer)
        {
            debug!("Token refreshed by a concurrent caller");
            return Ok(token.value.clone());
        }

        debug!("Refreshing access token");
        let token = self.source.login().await.inspect_err(|e| {
            warn!(error = %e, "Login failed");
        })?;

        if !token.is_valid_at(Utc::now(), self.refresh_buffer) {
            warn!(expires_at = %token.expires_at, "Login returned a token that is already expiring");
            return Err(Error::authentication(format!(
                "login returned a token expiring at {}, within the refresh buffer",
                token.expires_at
            )));
        }

        info!(expires_at = %token.expires_at, "Access token refreshed");
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    /// Drops the cached token so the next call logs in again.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }

    /// Drops the cached token only if it is still `value`.
    ///
    /// Returns `false` when another caller already replaced or cleared it.
    pub async fn invalidate_if_current(&self, value: &SecretString) -> bool {
        let mut guard = self.token.write().await;
        if guard.as_ref().is_some_and(|token| token.value == *value) {
            *guard = None;
            true
        } else {
            false
        }
    }

    /// Snapshot of the cached token.
    pub async fn current_token(&self) -> Option<Token> {
        self.token.read().await.clone()
    }

    /// Safety buffer applied before expiry.
    pub fn refresh_buffer(&self) -> Duration {
        self.refresh_buffer
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("refresh_buffer", &self.refresh_buffer)
            .finish_non_exhaustive()
    }
}
