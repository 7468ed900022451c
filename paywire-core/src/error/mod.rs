//! # Error Handling for paywire
//!
//! Every failure surfaced by the client core is a variant of [`Error`]. Nothing
//! on a recoverable path panics; callers get a typed error with enough context
//! (method, path, status, upstream body) to decide on their own remediation.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Error
//! ├── Network        - Transport layer failures (via NetworkError)
//! ├── Authentication - Login failed or returned an unusable token
//! ├── Api            - Non-success HTTP status (via ApiErrorDetails)
//! ├── CircuitOpen    - Breaker refused the call before any network attempt
//! ├── Parse          - JSON / timestamp decoding (via ParseError)
//! ├── Timeout        - Logical operation exceeded its deadline
//! ├── Cancelled      - Caller cancelled the operation
//! ├── InvalidRequest - Bad input, bad configuration or non-replayable body
//! ├── Config         - Configuration validation failure
//! └── Context        - Error with additional context
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use paywire_core::error::{ContextExt, Error, Result};
//!
//! fn load_payer(id: &str) -> Result<()> {
//!     if id.is_empty() {
//!         return Err(Error::invalid_request("payer id cannot be empty"));
//!     }
//!     fetch(id).with_context(|| format!("Failed to load payer {id}"))?;
//!     Ok(())
//! }
//! # fn fetch(_: &str) -> Result<()> { Ok(()) }
//! ```
//!
//! Checks such as [`Error::is_retryable`], [`Error::as_api`] or
//! [`Error::is_circuit_open`] penetrate `Context` layers, so wrapping an error
//! never hides its kind.

mod config;
mod context;
mod convert;
mod details;
mod network;
mod parse;

use std::borrow::Cow;
use std::error::Error as StdError;
use thiserror::Error;

pub use config::{ConfigValidationError, ValidationResult};
pub use context::ContextExt;
pub use details::{ApiErrorDetails, FieldError};
pub use network::NetworkError;
pub use parse::ParseError;

pub(crate) use convert::truncate_message;

/// Result type alias for all paywire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type for the paywire client core.
///
/// Large variants are boxed and message fields use `Cow<'static, str>` so the
/// enum stays small and static messages do not allocate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Network-related errors encapsulating transport layer issues.
    #[error("Network error: {0}")]
    Network(Box<NetworkError>),

    /// Login failed, was rejected, or returned an unparsable token.
    #[error("Authentication error: {0}")]
    Authentication(Cow<'static, str>),

    /// Upstream answered with a status outside the accepted set.
    #[error("API error: {0}")]
    Api(Box<ApiErrorDetails>),

    /// The circuit breaker is open; no request was sent.
    #[error("Circuit breaker is open: {0}")]
    CircuitOpen(Cow<'static, str>),

    /// Errors during response decoding.
    #[error("Parse error: {0}")]
    Parse(Box<ParseError>),

    /// Operation timeout.
    #[error("Timeout: {0}")]
    Timeout(Cow<'static, str>),

    /// Operation was cancelled through its `CancellationToken`.
    #[error("Cancelled: {0}")]
    Cancelled(Cow<'static, str>),

    /// Invalid request parameters or a request that cannot be replayed.
    #[error("Invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    /// Configuration rejected by validation.
    #[error("Configuration error: {0}")]
    Config(Box<ConfigValidationError>),

    /// Error with additional context, preserving the error chain.
    #[error("{context}")]
    Context {
        /// Context message describing what operation failed
        context: String,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    // ==================== Constructor Methods ====================

    /// Creates an API status error.
    ///
    /// ```rust
    /// use paywire_core::error::Error;
    ///
    /// let err = Error::api("GET", "/payers/p_1", 404, "payer not found");
    /// assert_eq!(err.status(), Some(404));
    /// ```
    pub fn api(
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::Api(Box::new(ApiErrorDetails::new(method, path, status, message)))
    }

    /// Creates an authentication error.
    /// Accepts both `&'static str` (zero allocation) and `String`.
    pub fn authentication(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Creates a circuit-open error.
    pub fn circuit_open(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::CircuitOpen(msg.into())
    }

    /// Creates a network error from a message.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(Box::new(NetworkError::ConnectionFailed(msg.into())))
    }

    /// Creates a cancelled error.
    ///
    /// ```rust
    /// use paywire_core::error::Error;
    ///
    /// let err = Error::cancelled("backoff interrupted");
    /// assert!(err.to_string().contains("Cancelled"));
    /// ```
    pub fn cancelled(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates an invalid request error.
    pub fn invalid_request(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a timeout error.
    pub fn timeout(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Timeout(msg.into())
    }

    // ==================== Context Methods ====================

    /// Attaches context to an existing error.
    ///
    /// ```rust
    /// use paywire_core::error::Error;
    ///
    /// let err = Error::network("Connection refused")
    ///     .context("Failed to create payment");
    /// assert!(err.report().contains("Connection refused"));
    /// ```
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    // ==================== Chain Traversal Methods ====================

    fn iter_chain(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |err| match err {
            Error::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        })
    }

    /// Returns the root cause of the error, skipping Context layers.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        self.iter_chain().last().unwrap_or(self)
    }

    /// Generates a detailed error report with the full chain.
    #[must_use]
    pub fn report(&self) -> String {
        use std::fmt::Write;
        let mut report = String::new();
        report.push_str(&self.to_string());

        let mut current: Option<&(dyn StdError + 'static)> = self.source();
        while let Some(err) = current {
            let _ = write!(report, "\nCaused by: {err}");
            current = err.source();
        }
        report
    }

    // ==================== Helper Methods (Context Penetrating) ====================

    /// Checks if a caller may reasonably retry the whole logical operation.
    ///
    /// Returns `true` for transient transport failures, timeouts, an open
    /// circuit, 429 and 5xx API errors.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.root_cause() {
            Error::Network(ne) => matches!(
                ne.as_ref(),
                NetworkError::Timeout | NetworkError::ConnectionFailed(_)
            ),
            Error::Api(details) => details.status == 429 || details.status >= 500,
            Error::Timeout(_) | Error::CircuitOpen(_) => true,
            _ => false,
        }
    }

    /// Returns the API error details, if any (penetrates Context layers).
    #[must_use]
    pub fn as_api(&self) -> Option<&ApiErrorDetails> {
        match self.root_cause() {
            Error::Api(details) => Some(details.as_ref()),
            _ => None,
        }
    }

    /// Returns the HTTP status carried by an API error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.as_api().map(|d| d.status)
    }

    /// Checks if this is an authentication error (penetrates Context layers).
    #[must_use]
    pub fn as_authentication(&self) -> Option<&str> {
        match self.root_cause() {
            Error::Authentication(msg) => Some(msg.as_ref()),
            _ => None,
        }
    }

    /// Checks if this is a cancelled error (penetrates Context layers).
    #[must_use]
    pub fn as_cancelled(&self) -> Option<&str> {
        match self.root_cause() {
            Error::Cancelled(msg) => Some(msg.as_ref()),
            _ => None,
        }
    }

    /// Returns `true` when the breaker rejected the call.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self.root_cause(), Error::CircuitOpen(_))
    }
}
