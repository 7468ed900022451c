use crate::circuit_breaker::CircuitBreakerConfig;
use crate::config::ProxyConfig;
use crate::error::{ConfigValidationError, ValidationResult};
use crate::retry_strategy::RetryConfig;
use std::time::Duration;

/// Transport and resilience configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Upper bound for a whole logical call (token refresh, every attempt and
    /// every backoff) when the caller supplies no deadline.
    ///
    /// Default: 60 seconds
    pub timeout: Duration,
    /// Timeout for a single HTTP round-trip.
    ///
    /// Default: 30 seconds
    pub attempt_timeout: Duration,
    /// TCP connection timeout.
    ///
    /// Default: 10 seconds
    pub connect_timeout: Duration,
    /// Default User-Agent header value
    pub user_agent: String,
    /// Optional proxy configuration
    pub proxy: Option<ProxyConfig>,
    /// Retry policy for 429 and 5xx responses.
    pub retry_config: RetryConfig,
    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Maximum response body size in bytes (default: 10MB).
    ///
    /// Larger responses fail with a network error instead of being buffered.
    pub max_response_size: usize,
    /// Maximum request body size in bytes (default: 10MB).
    pub max_request_size: usize,
    /// Maximum number of idle keep-alive connections per host.
    ///
    /// Default: 10
    pub pool_max_idle_per_host: usize,
    /// Idle connections older than this are closed.
    ///
    /// Default: 90 seconds
    pub pool_idle_timeout: Duration,
    /// Maximum number of concurrent in-flight requests to the API host.
    ///
    /// Default: 32
    pub max_connections_per_host: usize,
    /// Permits plain `http://` base URLs. Never enable in production.
    pub allow_insecure_http: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            attempt_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("paywire-rust/{}", crate::VERSION),
            proxy: None,
            retry_config: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            max_response_size: 10 * 1024 * 1024,
            max_request_size: 10 * 1024 * 1024,
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
            max_connections_per_host: 32,
            allow_insecure_http: false,
        }
    }
}

impl HttpConfig {
    /// Validates the HTTP configuration parameters.
    ///
    /// - `timeout` > 5 minutes is an error, < 1 second a warning
    /// - `attempt_timeout` longer than `timeout` is a warning
    /// - size limits and `max_connections_per_host` must be non-zero
    /// - nested retry and circuit breaker configs are validated too
    ///
    /// ```rust
    /// use paywire_core::http_client::HttpConfig;
    /// use std::time::Duration;
    ///
    /// assert!(HttpConfig::default().validate().is_ok());
    ///
    /// let invalid = HttpConfig { timeout: Duration::from_secs(600), ..Default::default() };
    /// assert!(invalid.validate().is_err());
    /// ```
    pub fn validate(&self) -> std::result::Result<ValidationResult, ConfigValidationError> {
        const MAX_REASONABLE_BODY_SIZE: usize = 100 * 1024 * 1024;

        let mut result = ValidationResult::new();

        if self.timeout > Duration::from_secs(300) {
            return Err(ConfigValidationError::too_high(
                "timeout",
                format!("{:?}", self.timeout),
                "5 minutes",
            ));
        }
        if self.timeout < Duration::from_secs(1) {
            result.add_warning(format!(
                "timeout {:?} is very short, may cause frequent timeouts",
                self.timeout
            ));
        }
        if self.attempt_timeout > self.timeout {
            result.add_warning(format!(
                "attempt_timeout {:?} exceeds timeout {:?}, the operation bound wins",
                self.attempt_timeout, self.timeout
            ));
        }

        for (field, size) in [
            ("max_request_size", self.max_request_size),
            ("max_response_size", self.max_response_size),
        ] {
            if size == 0 {
                return Err(ConfigValidationError::invalid(field, "cannot be zero"));
            }
            if size > MAX_REASONABLE_BODY_SIZE {
                return Err(ConfigValidationError::too_high(
                    field,
                    size,
                    "100MB (104857600 bytes)",
                ));
            }
        }

        if self.max_connections_per_host == 0 {
            return Err(ConfigValidationError::invalid(
                "max_connections_per_host",
                "max_connections_per_host must be greater than 0",
            ));
        }

        if let Some(proxy) = &self.proxy {
            url::Url::parse(&proxy.url)
                .map_err(|e| ConfigValidationError::invalid("proxy", e.to_string()))?;
        }

        if self.allow_insecure_http {
            result.add_warning("allow_insecure_http is enabled, do not use in production");
        }

        result.merge(self.retry_config.validate()?);
        result.merge(self.circuit_breaker.validate()?);
        Ok(result)
    }
}
