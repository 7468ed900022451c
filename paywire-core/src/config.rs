//! Client configuration.
//!
//! [`ClientConfig`] carries everything a [`PaywireClient`](crate::client::PaywireClient)
//! needs: where the API lives, how to log in, which API version to pin and
//! the transport settings in [`HttpConfig`].
//!
//! ```rust
//! use paywire_core::config::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .base_url("https://api.example.com")
//!     .client_id("client-123")
//!     .api_key("sk_live_abc")
//!     .timeout(Duration::from_secs(20))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.api_version, paywire_core::config::DEFAULT_API_VERSION);
//! ```

use crate::credentials::{ClientCredentials, SecretString};
use crate::error::{ConfigValidationError, Error, Result, ValidationResult};
use crate::http_client::HttpConfig;
use std::time::Duration;
use url::Url;

/// API version sent as `x-api-version` unless overridden.
pub const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Tokens closer than this to expiry are refreshed before use.
pub const DEFAULT_TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// Environment variable holding the API base URL.
pub const ENV_BASE_URL: &str = "PAYWIRE_BASE_URL";
/// Environment variable holding the client identifier.
pub const ENV_CLIENT_ID: &str = "PAYWIRE_CLIENT_ID";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "PAYWIRE_API_KEY";
/// Environment variable holding the optional account selector.
pub const ENV_LOGIN_AS: &str = "PAYWIRE_LOGIN_AS";
/// Environment variable overriding the pinned API version.
pub const ENV_API_VERSION: &str = "PAYWIRE_API_VERSION";

/// Proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy URL (e.g., "http://127.0.0.1:8080").
    pub url: String,
    /// Optional username for authentication.
    pub username: Option<String>,
    /// Optional password for authentication (zeroed on drop).
    pub password: Option<SecretString>,
}

impl ProxyConfig {
    /// Create a new proxy configuration with just a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Set credentials for the proxy.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. `https://api.example.com/v1`.
    pub base_url: Url,
    /// Credentials exchanged for a bearer token.
    pub credentials: ClientCredentials,
    /// Value of the `x-api-version` header.
    pub api_version: String,
    /// Path of the login endpoint, relative to `base_url`.
    pub login_path: String,
    /// Safety buffer before token expiry (default: 60 seconds).
    pub token_refresh_buffer: Duration,
    /// Transport, retry and circuit breaker settings.
    pub http: HttpConfig,
}

impl ClientConfig {
    /// Creates a configuration with default settings.
    pub fn new(base_url: Url, credentials: ClientCredentials) -> Self {
        Self {
            base_url,
            credentials,
            api_version: DEFAULT_API_VERSION.to_string(),
            login_path: crate::endpoint::LOGIN.path_pattern.to_string(),
            token_refresh_buffer: DEFAULT_TOKEN_REFRESH_BUFFER,
            http: HttpConfig::default(),
        }
    }

    /// Create a new configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Loads the configuration from `PAYWIRE_*` environment variables.
    ///
    /// `PAYWIRE_BASE_URL`, `PAYWIRE_CLIENT_ID` and `PAYWIRE_API_KEY` are
    /// required; `PAYWIRE_LOGIN_AS` and `PAYWIRE_API_VERSION` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::from(ConfigValidationError::missing(key)))
        };

        let mut builder = ClientConfigBuilder::new()
            .base_url(required(ENV_BASE_URL)?)
            .client_id(required(ENV_CLIENT_ID)?)
            .api_key(required(ENV_API_KEY)?);

        if let Some(login_as) = lookup(ENV_LOGIN_AS).filter(|v| !v.is_empty()) {
            builder = builder.login_as(login_as);
        }
        if let Some(version) = lookup(ENV_API_VERSION).filter(|v| !v.is_empty()) {
            builder = builder.api_version(version);
        }
        builder.build()
    }

    /// Validates the configuration.
    ///
    /// The base URL must be `https` unless `http.allow_insecure_http` is set.
    pub fn validate(&self) -> std::result::Result<ValidationResult, ConfigValidationError> {
        let mut result = ValidationResult::new();

        match self.base_url.scheme() {
            "https" => {}
            "http" if self.http.allow_insecure_http => {}
            "http" => {
                return Err(ConfigValidationError::invalid(
                    "base_url",
                    "plain http is not allowed, use https or enable allow_insecure_http",
                ));
            }
            other => {
                return Err(ConfigValidationError::invalid(
                    "base_url",
                    format!("unsupported scheme '{other}'"),
                ));
            }
        }
        if self.base_url.cannot_be_a_base() || self.base_url.host_str().is_none() {
            return Err(ConfigValidationError::invalid(
                "base_url",
                "must be an absolute URL with a host",
            ));
        }

        if self.credentials.client_id.trim().is_empty() {
            return Err(ConfigValidationError::missing("client_id"));
        }
        if self.credentials.api_key.is_empty() {
            return Err(ConfigValidationError::missing("api_key"));
        }
        if self.api_version.trim().is_empty() {
            return Err(ConfigValidationError::missing("api_version"));
        }
        if !self.login_path.starts_with('/') {
            return Err(ConfigValidationError::invalid(
                "login_path",
                "must start with '/'",
            ));
        }

        if self.token_refresh_buffer.is_zero() {
            result.add_warning("token_refresh_buffer is zero, tokens may expire in flight");
        }

        result.merge(self.http.validate()?);
        Ok(result)
    }

    /// Absolute URL for `path` under the base URL.
    ///
    /// The base URL's own path is kept as a prefix, so `https://host/v1` plus
    /// `/payers` gives `https://host/v1/payers`.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let url = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Ok(Url::parse(&url)?)
    }
}

/// Builder for [`ClientConfig`].
///
/// ```rust
/// use paywire_core::config::{ClientConfigBuilder, ProxyConfig};
///
/// let config = ClientConfigBuilder::new()
///     .base_url("https://api.example.com")
///     .client_id("client-123")
///     .api_key("sk_live_abc")
///     .login_as("acct_42")
///     .proxy(ProxyConfig::new("http://127.0.0.1:8080"))
///     .build()
///     .unwrap();
/// assert_eq!(config.credentials.login_as.as_deref(), Some("acct_42"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    client_id: Option<String>,
    api_key: Option<SecretString>,
    login_as: Option<String>,
    api_version: Option<String>,
    login_path: Option<String>,
    token_refresh_buffer: Option<Duration>,
    http: HttpConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the client identifier
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(key));
        self
    }

    /// Set the account selector sent as `x-login-as`
    pub fn login_as(mut self, login_as: impl Into<String>) -> Self {
        self.login_as = Some(login_as.into());
        self
    }

    /// Override the pinned API version
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Override the login endpoint path
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    /// Set the token safety buffer
    pub fn token_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.token_refresh_buffer = Some(buffer);
        self
    }

    /// Set the default bound for a whole logical call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout = timeout;
        self
    }

    /// Set the TCP connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.http.connect_timeout = timeout;
        self
    }

    /// Set the HTTP proxy configuration
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.http.proxy = Some(proxy);
        self
    }

    /// Allow plain `http://` base URLs (tests and local sandboxes only)
    pub fn allow_insecure_http(mut self, allow: bool) -> Self {
        self.http.allow_insecure_http = allow;
        self
    }

    /// Replace the whole transport configuration
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ClientConfig> {
        let base_url = self
            .base_url
            .ok_or_else(|| ConfigValidationError::missing("base_url"))?;
        let base_url = Url::parse(&base_url)
            .map_err(|e| ConfigValidationError::invalid("base_url", e.to_string()))?;
        let client_id = self
            .client_id
            .ok_or_else(|| ConfigValidationError::missing("client_id"))?;
        let api_key = self
            .api_key
            .ok_or_else(|| ConfigValidationError::missing("api_key"))?;

        let mut credentials = ClientCredentials::new(client_id, api_key);
        credentials.login_as = self.login_as;

        let mut config = ClientConfig::new(base_url, credentials);
        if let Some(version) = self.api_version {
            config.api_version = version;
        }
        if let Some(path) = self.login_path {
            config.login_path = path;
        }
        if let Some(buffer) = self.token_refresh_buffer {
            config.token_refresh_buffer = buffer;
        }
        config.http = self.http;

        let validation = config.validate()?;
        for warning in &validation.warnings {
            tracing::warn!(warning = %warning, "Client configuration warning");
        }
        Ok(config)
    }
}
