//! Status-driven retry policy.
//!
//! - 2xx: done.
//! - 4xx other than 429: returned as-is, never retried.
//! - 429: retried up to `max_rate_limit_retries` times for every method, with
//!   exponential backoff and jitter, or exactly the server's `Retry-After`.
//! - 5xx: retried at most once after a fixed delay, and only for
//!   GET/HEAD/OPTIONS. A mutating request that hit a 5xx may have been
//!   partially applied upstream.
//!
//! The policy is pure; the loop that sleeps and re-sends lives in
//! [`crate::http_client`].

use crate::endpoint::HttpMethod;
use crate::error::{ConfigValidationError, ValidationResult};
use rand::Rng;
use std::time::Duration;

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retries after a 429 response.
    pub max_rate_limit_retries: u32,
    /// Base delay for 429 backoff; the n-th retry waits `base * 2^n` plus jitter.
    pub rate_limit_base_delay: Duration,
    /// Maximum retries after a 5xx response to an idempotent method (0 or 1).
    pub max_server_error_retries: u32,
    /// Fixed delay before a 5xx retry.
    pub server_error_delay: Duration,
    /// Cap on computed backoff. A server-provided `Retry-After` is not capped.
    pub max_delay: Duration,
    /// Whether `Retry-After` overrides the computed 429 delay.
    pub honor_retry_after: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 3,
            rate_limit_base_delay: Duration::from_secs(1),
            max_server_error_retries: 1,
            server_error_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            honor_retry_after: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    pub fn no_retries() -> Self {
        Self {
            max_rate_limit_retries: 0,
            max_server_error_retries: 0,
            ..Self::default()
        }
    }

    /// Validates the retry configuration parameters.
    ///
    /// - `max_rate_limit_retries` must be <= 10
    /// - `max_server_error_retries` must be <= 1
    /// - `rate_limit_base_delay` and `server_error_delay` must be >= 10ms
    /// - `max_delay` below the base delay produces a warning
    ///
    /// ```rust
    /// use paywire_core::retry_strategy::RetryConfig;
    ///
    /// assert!(RetryConfig::default().validate().is_ok());
    ///
    /// let invalid = RetryConfig { max_rate_limit_retries: 15, ..Default::default() };
    /// assert!(invalid.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<ValidationResult, ConfigValidationError> {
        let mut result = ValidationResult::new();

        if self.max_rate_limit_retries > 10 {
            return Err(ConfigValidationError::too_high(
                "max_rate_limit_retries",
                self.max_rate_limit_retries,
                10,
            ));
        }

        if self.max_server_error_retries > 1 {
            return Err(ConfigValidationError::too_high(
                "max_server_error_retries",
                self.max_server_error_retries,
                1,
            ));
        }

        for (field, delay) in [
            ("rate_limit_base_delay", self.rate_limit_base_delay),
            ("server_error_delay", self.server_error_delay),
        ] {
            if delay < Duration::from_millis(10) {
                return Err(ConfigValidationError::too_low(
                    field,
                    format!("{}ms", delay.as_millis()),
                    "10ms",
                ));
            }
        }

        if self.max_delay < self.rate_limit_base_delay {
            result.add_warning(format!(
                "max_delay {:?} is below rate_limit_base_delay {:?}, backoff will not grow",
                self.max_delay, self.rate_limit_base_delay
            ));
        }

        Ok(result)
    }
}

/// How a response status is treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 1xx/2xx/3xx: terminal, counted as a breaker success when 2xx.
    Success,
    /// 4xx other than 429: terminal.
    ClientError,
    /// 429: retriable for every method.
    RateLimited,
    /// 5xx: breaker failure, retriable once for idempotent methods.
    ServerError,
}

impl StatusClass {
    /// Classifies an HTTP status code.
    pub fn of(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            400..=499 => Self::ClientError,
            500.. => Self::ServerError,
            _ => Self::Success,
        }
    }
}

/// Transient retry bookkeeping for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttemptContext {
    /// Retries already spent on 429 responses.
    pub rate_limit_retries: u32,
    /// Retries already spent on 5xx responses.
    pub server_error_retries: u32,
    /// Whether the request method may be repeated after a 5xx.
    pub idempotent_method: bool,
}

impl RetryAttemptContext {
    /// Fresh context for a request with `method`.
    pub fn new(method: HttpMethod) -> Self {
        Self {
            rate_limit_retries: 0,
            server_error_retries: 0,
            idempotent_method: method.is_idempotent(),
        }
    }

    /// Total retries performed so far.
    pub fn retries(&self) -> u32 {
        self.rate_limit_retries + self.server_error_retries
    }
}

/// Outcome of classifying one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Hand the response back to the caller.
    Stop,
    /// Wait `delay`, then send the request again.
    Retry {
        /// Time to wait before the next attempt.
        delay: Duration,
    },
}

/// Retry strategy.
#[derive(Debug, Clone, Default)]
pub struct RetryStrategy {
    config: RetryConfig,
}

impl RetryStrategy {
    /// Creates a new retry strategy with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns a reference to the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decides what to do with a response, updating `ctx` when retrying.
    ///
    /// `retry_after` is the parsed `Retry-After` header, if any.
    pub fn decide(
        &self,
        status: u16,
        retry_after: Option<Duration>,
        ctx: &mut RetryAttemptContext,
    ) -> RetryDecision {
        match StatusClass::of(status) {
            StatusClass::Success | StatusClass::ClientError => RetryDecision::Stop,
            StatusClass::RateLimited => {
                if ctx.rate_limit_retries >= self.config.max_rate_limit_retries {
                    return RetryDecision::Stop;
                }
                let delay = self.rate_limit_delay(ctx.rate_limit_retries, retry_after);
                ctx.rate_limit_retries += 1;
                RetryDecision::Retry { delay }
            }
            StatusClass::ServerError => {
                if !ctx.idempotent_method
                    || ctx.server_error_retries >= self.config.max_server_error_retries
                {
                    return RetryDecision::Stop;
                }
                ctx.server_error_retries += 1;
                RetryDecision::Retry {
                    delay: self.config.server_error_delay,
                }
            }
        }
    }

    /// Backoff before the `retry`-th (0-based) retry of a 429.
    ///
    /// A `Retry-After` value, when honored, is returned unchanged.
    pub fn rate_limit_delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        if self.config.honor_retry_after
            && let Some(server_delay) = retry_after
        {
            return server_delay;
        }
        let base = self.base_rate_limit_delay(retry);
        base + Self::jitter(base)
    }

    /// Un-jittered backoff: `rate_limit_base_delay * 2^retry`, capped at `max_delay`.
    pub fn base_rate_limit_delay(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry);
        self.config
            .rate_limit_base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }

    /// Uniform jitter in `[0, delay / 2)`.
    fn jitter(delay: Duration) -> Duration {
        #[allow(clippy::cast_possible_truncation)]
        let half_ms = (delay.as_millis() / 2) as u64;
        if half_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..half_ms))
    }
}
