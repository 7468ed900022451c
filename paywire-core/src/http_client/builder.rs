use crate::circuit_breaker::CircuitBreaker;
use crate::error::{Error, Result};
use crate::retry_strategy::RetryStrategy;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use super::config::HttpConfig;

/// Pooled HTTPS transport with status-driven retry and a circuit breaker.
///
/// Cloning is cheap and clones share the connection pool, the breaker and
/// the per-host connection limit.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
    retry_strategy: RetryStrategy,
    circuit_breaker: Arc<CircuitBreaker>,
    connection_limit: Arc<Semaphore>,
}

impl HttpClient {
    /// Creates a new HTTP client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration fails validation
    /// - The proxy URL is invalid
    /// - The TLS backend cannot be initialized
    pub fn new(config: HttpConfig) -> Result<Self> {
        let validation = config.validate()?;
        for warning in &validation.warnings {
            tracing::warn!(warning = %warning, "HTTP configuration warning");
        }

        let mut builder = Client::builder()
            .timeout(config.attempt_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .https_only(!config.allow_insecure_http)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .gzip(true)
            .user_agent(&config.user_agent);

        if let Some(proxy_config) = &config.proxy {
            let mut proxy = reqwest::Proxy::all(&proxy_config.url)
                .map_err(|e| Error::invalid_request(format!("Invalid proxy URL: {e}")))?;

            if let (Some(username), Some(password)) =
                (&proxy_config.username, &proxy_config.password)
            {
                proxy = proxy.basic_auth(username, password.expose_secret());
            }
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::network(format!("Failed to build HTTP client: {e}")))?;

        debug!(
            max_connections_per_host = config.max_connections_per_host,
            pool_max_idle_per_host = config.pool_max_idle_per_host,
            https_only = !config.allow_insecure_http,
            "HTTP client initialized"
        );

        Ok(Self {
            client,
            retry_strategy: RetryStrategy::new(config.retry_config.clone()),
            circuit_breaker: Arc::new(CircuitBreaker::new(config.circuit_breaker.clone())),
            connection_limit: Arc::new(Semaphore::new(config.max_connections_per_host)),
            config,
        })
    }

    /// Replaces the circuit breaker, e.g. to share one across clients or to
    /// attach an event channel.
    #[must_use]
    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    /// Returns the circuit breaker guarding this client.
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    /// Returns a reference to current HTTP configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry_strategy
    }

    pub(crate) fn connection_limit(&self) -> &Semaphore {
        &self.connection_limit
    }
}
