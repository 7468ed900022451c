//! Paywire Core Library
//!
//! Resilient, authenticated HTTP client core for a payments API.
//!
//! # Features
//!
//! - **Token lifecycle**: bearer tokens refreshed before expiry, one login per refresh
//! - **Retry**: status-driven retry for 429 and idempotent 5xx, honoring `Retry-After`
//! - **Circuit breaker**: consecutive upstream failures short-circuit further calls
//! - **Idempotency**: fresh `x-idempotency-key` on every financial POST, stable across retries
//! - **Error Handling**: typed errors with `thiserror`
//!
//! # Example
//!
//! ```rust,no_run
//! use paywire_core::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let config = ClientConfig::builder()
//!     .base_url("https://api.example.com")
//!     .client_id("client-123")
//!     .api_key("sk_live_abc")
//!     .build()?;
//! let client = PaywireClient::new(config)?;
//!
//! let balance: serde_json::Value = client
//!     .do_json_endpoint(&CallContext::new(), "balances.get", None, NO_BODY)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// =============================================================================
// Global Clippy Lint Suppressions
// =============================================================================
// - module_name_repetitions: e.g. CircuitBreakerConfig in circuit_breaker
// - missing_errors_doc: Too verbose to document every Result-returning function
// - missing_panics_doc: Too verbose to document every potential panic
// - must_use_candidate: Not all return values need #[must_use]
// - doc_markdown: Header names and status codes in docs don't need backticks
// - cast_possible_truncation: u128 millisecond counts logged as u64
// - return_self_not_must_use: Builder pattern methods return Self without must_use
// =============================================================================
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::return_self_not_must_use)]

// Re-exports of external dependencies
pub use serde;
pub use serde_json;

pub mod auth;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod http_client;
pub mod idempotency;
pub mod logging;
pub mod retry_strategy;
pub mod time;

pub use auth::{HttpLogin, Token, TokenManager, TokenSource};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerEvent, CircuitState};
pub use client::{CallContext, NO_BODY, PaywireClient};
pub use config::{ClientConfig, ClientConfigBuilder, ProxyConfig};
pub use credentials::{ClientCredentials, SecretString};
pub use endpoint::{EndpointDescriptor, EndpointRegistry, HttpMethod};
pub use error::{ApiErrorDetails, ContextExt, Error, NetworkError, ParseError, Result};
pub use http_client::{ApiResponse, HttpClient, HttpConfig, HttpRequest, RequestBody};
pub use idempotency::IdempotencyPolicy;
pub use retry_strategy::{RetryConfig, RetryStrategy};
// Re-export CancellationToken for convenient access
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// ```rust
/// use paywire_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::auth::{Token, TokenManager, TokenSource};
    pub use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    pub use crate::client::{CallContext, NO_BODY, PaywireClient};
    pub use crate::config::{ClientConfig, ClientConfigBuilder, ProxyConfig};
    pub use crate::credentials::{ClientCredentials, SecretString};
    pub use crate::endpoint::{EndpointRegistry, HttpMethod};
    pub use crate::error::{ContextExt, Error, Result};
    pub use crate::http_client::{ApiResponse, HttpConfig, RequestBody};
    pub use crate::logging::{LogConfig, LogFormat, LogLevel, init_logging, try_init_logging};
    pub use crate::retry_strategy::RetryConfig;
    pub use serde::{Deserialize, Serialize};
    pub use tokio_util::sync::CancellationToken;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
