//! Request façade.
//!
//! [`PaywireClient`] ties the pieces together for every call: it makes sure
//! a valid bearer token exists, attaches the auth, version and idempotency
//! headers, and hands the request to the retry executor. The whole logical
//! operation runs under one deadline.
//!
//! # Example
//!
//! ```rust,no_run
//! use paywire_core::client::{CallContext, PaywireClient};
//! use paywire_core::config::ClientConfig;
//! use serde_json::json;
//!
//! # async fn demo() -> paywire_core::Result<()> {
//! let client = PaywireClient::new(ClientConfig::from_env()?)?;
//! let ctx = CallContext::new();
//!
//! let payment: serde_json::Value = client
//!     .do_json_endpoint(&ctx, "payments.create", None, Some(&json!({"amount": 1250})))
//!     .await?;
//! println!("{payment}");
//! # Ok(())
//! # }
//! ```

use crate::auth::{HttpLogin, TokenManager, TokenSource};
use crate::config::ClientConfig;
use crate::endpoint::{EndpointRegistry, HttpMethod};
use crate::error::{Error, Result};
use crate::http_client::headers::{X_API_VERSION, X_IDEMPOTENCY_KEY};
use crate::http_client::{ApiResponse, HttpClient, HttpRequest, RequestBody};
use crate::idempotency::IdempotencyPolicy;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

/// Expected statuses used by [`PaywireClient::do_json`] when none are given.
pub const DEFAULT_EXPECTED_STATUSES: &[u16] = &[200];

/// Typed "no request body" for [`PaywireClient::do_json`].
pub const NO_BODY: Option<&()> = None;

/// Per-call cancellation and deadline.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Cancels the call when triggered.
    pub cancellation: Option<CancellationToken>,
    /// Overrides the configured operation timeout.
    pub timeout: Option<Duration>,
}

impl CallContext {
    /// A context with no cancellation and the default deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Bounds the whole call by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Authenticated client for the payments API.
///
/// Cheap to clone; clones share the token, the connection pool and the
/// circuit breaker.
#[derive(Debug, Clone)]
pub struct PaywireClient {
    config: Arc<ClientConfig>,
    http: HttpClient,
    tokens: Arc<TokenManager>,
    registry: EndpointRegistry,
    idempotency: Arc<IdempotencyPolicy>,
}

impl PaywireClient {
    /// Creates a client that logs in with the configured credentials.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::new(config.http.clone())?;
        let login = HttpLogin::from_config(http.clone(), &config)?;
        Self::assemble(config, http, Arc::new(login))
    }

    /// Creates a client that obtains tokens from `source`.
    pub fn with_token_source(config: ClientConfig, source: Arc<dyn TokenSource>) -> Result<Self> {
        let http = HttpClient::new(config.http.clone())?;
        Self::assemble(config, http, source)
    }

    fn assemble(config: ClientConfig, http: HttpClient, source: Arc<dyn TokenSource>) -> Result<Self> {
        let validation = config.validate()?;
        for warning in &validation.warnings {
            warn!(warning = %warning, "Client configuration warning");
        }

        let registry = EndpointRegistry::default();
        Ok(Self {
            tokens: Arc::new(TokenManager::new(source, config.token_refresh_buffer)),
            config: Arc::new(config),
            http,
            registry,
            idempotency: Arc::new(IdempotencyPolicy::new(registry)),
        })
    }

    /// Replaces the endpoint registry and the idempotency policy built on it.
    #[must_use]
    pub fn with_registry(mut self, registry: EndpointRegistry) -> Self {
        self.registry = registry;
        self.idempotency = Arc::new(IdempotencyPolicy::new(registry));
        self
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Underlying transport, including the circuit breaker.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Token manager.
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Endpoint registry used by [`do_json_endpoint`](Self::do_json_endpoint).
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// `GET path`; returns the response for any status.
    pub async fn get(&self, ctx: &CallContext, path: &str) -> Result<ApiResponse> {
        self.send(ctx, HttpMethod::Get, path, RequestBody::Empty).await
    }

    /// `POST path` with a JSON body; returns the response for any status.
    pub async fn post<B>(&self, ctx: &CallContext, path: &str, body: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        self.send(ctx, HttpMethod::Post, path, RequestBody::json(body)?)
            .await
    }

    /// `PUT path` with a JSON body; returns the response for any status.
    pub async fn put<B>(&self, ctx: &CallContext, path: &str, body: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        self.send(ctx, HttpMethod::Put, path, RequestBody::json(body)?)
            .await
    }

    /// `DELETE path`; returns the response for any status.
    pub async fn delete(&self, ctx: &CallContext, path: &str) -> Result<ApiResponse> {
        self.send(ctx, HttpMethod::Delete, path, RequestBody::Empty)
            .await
    }

    /// Sends one logical request under the context's deadline.
    ///
    /// Fails with [`Error::Timeout`] when the deadline passes, whether during
    /// token refresh, an attempt or a backoff.
    #[instrument(
        name = "paywire_request",
        skip(self, ctx, body),
        fields(method = %method, path = %path)
    )]
    pub async fn send(
        &self,
        ctx: &CallContext,
        method: HttpMethod,
        path: &str,
        body: RequestBody,
    ) -> Result<ApiResponse> {
        let cancel = ctx.cancellation.clone().unwrap_or_default();
        let deadline = ctx.timeout.unwrap_or(self.config.http.timeout);

        match tokio::time::timeout(deadline, self.execute(method, path, body, &cancel)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = deadline.as_millis() as u64, "Operation timed out");
                Err(Error::timeout(format!(
                    "{method} {path} timed out after {deadline:?}"
                )))
            }
        }
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: RequestBody,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        let token = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::cancelled("cancelled while obtaining a token"));
            }
            token = self.tokens.ensure_valid_token() => token?,
        };
        let bearer = Zeroizing::new(format!("Bearer {}", token.expose_secret()));

        let mut request = HttpRequest::new(method, self.config.url_for(path)?)
            .sensitive_header(AUTHORIZATION, &bearer)?
            .header(X_API_VERSION, &self.config.api_version)?
            .header(CONTENT_TYPE, "application/json")?
            .body(body);

        if method == HttpMethod::Post
            && let Some(key) = self.idempotency.key_for(path)
        {
            debug!(idempotency_key = %key, "Attached idempotency key");
            request = request.header(X_IDEMPOTENCY_KEY, &key)?;
        }

        let response = self.http.execute_with_retry(&request, cancel).await?;
        if response.status == 401 && self.tokens.invalidate_if_current(&token).await {
            warn!("Token rejected, dropping it for the next call");
        }
        Ok(response)
    }

    /// Sends a request and decodes a JSON response.
    ///
    /// The body is decoded into `T` only when the status is in `expected`
    /// (`[200]` when empty). Any other status becomes an [`Error::Api`]
    /// carrying the upstream code and message. An empty success body decodes
    /// as JSON `null`, so `T = ()` works for 204 responses.
    pub async fn do_json<T, B>(
        &self,
        ctx: &CallContext,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        expected: &[u16],
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = match body {
            Some(body) => RequestBody::json(body)?,
            None => RequestBody::Empty,
        };
        let response = self.send(ctx, method, path, body).await?;

        let expected = if expected.is_empty() {
            DEFAULT_EXPECTED_STATUSES
        } else {
            expected
        };
        if !expected.contains(&response.status) {
            return Err(response.into_api_error(method.as_str(), path));
        }

        let decoded = if response.body.is_empty() {
            serde_json::from_slice(b"null").map_err(Error::from)
        } else {
            response.json()
        };
        decoded.map_err(|e| e.context(format!("Failed to decode {method} {path} response")))
    }

    /// Calls a registered endpoint by name.
    ///
    /// `id` fills the `{id}` placeholder; the descriptor supplies the method
    /// and the expected status.
    pub async fn do_json_endpoint<T, B>(
        &self,
        ctx: &CallContext,
        name: &str,
        id: Option<&str>,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let endpoint = self.registry.require(name)?;
        let path = endpoint.render(id)?;
        self.do_json(ctx, endpoint.method, &path, body, &[endpoint.expected_status])
            .await
    }
}
