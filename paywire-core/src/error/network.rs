//! Network-related error types.

use std::error::Error as StdError;
use thiserror::Error;

/// Transport failures, without leaking `reqwest::Error` into the public API.
///
/// These are surfaced to the caller as-is; the status-driven retry policy
/// never retries a request whose transport failed.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NetworkError {
    /// Request timed out at the transport level.
    #[error("Request timeout")]
    Timeout,

    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// DNS resolution failed.
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// SSL/TLS error.
    #[error("SSL/TLS error: {0}")]
    Ssl(String),

    /// Response body exceeded the configured size limit.
    #[error("Response too large: {actual} bytes exceeds limit of {limit} bytes")]
    ResponseTooLarge {
        /// Observed size in bytes
        actual: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Opaque transport error for underlying issues.
    #[error("Transport error")]
    Transport(#[source] Box<dyn StdError + Send + Sync + 'static>),
}
