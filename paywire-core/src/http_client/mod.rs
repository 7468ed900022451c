//! HTTP transport for the payments API.
//!
//! Provides:
//! - A pooled HTTPS client (TLS 1.2+, bounded idle pool, per-host connection limit)
//! - Status-driven retry as an explicit state machine
//! - Circuit breaker checks before every attempt
//! - Replayable request bodies and response size limits
//! - Cancellation of round-trips and backoff sleeps
//!
//! # Example
//!
//! ```rust,no_run
//! use paywire_core::endpoint::HttpMethod;
//! use paywire_core::http_client::{HttpClient, HttpConfig, HttpRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> paywire_core::Result<()> {
//! let client = HttpClient::new(HttpConfig::default())?;
//! let url = url::Url::parse("https://api.example.com/balances")?;
//! let response = client
//!     .execute_with_retry(&HttpRequest::new(HttpMethod::Get, url), &CancellationToken::new())
//!     .await?;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
pub mod headers;
mod request;
mod response;
mod retry;

#[cfg(test)]
mod tests;

pub use builder::HttpClient;
pub use config::HttpConfig;
pub use request::{HttpRequest, RequestBody};
pub use response::ApiResponse;
