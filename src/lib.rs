//! # Paywire Rust
//!
//! Resilient, authenticated client for the Paywire payments API.
//!
//! ## Features
//!
//! - **Async/Await**: Built on tokio, safe to share one client across tasks
//! - **Token lifecycle**: Bearer tokens refreshed ahead of expiry with a single login
//! - **Resilience**: Status-driven retry and a circuit breaker in front of every call
//! - **Idempotency**: Financial POSTs carry a key that is stable across retries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paywire::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     init_logging(&LogConfig::development());
//!
//!     let client = PaywireClient::new(ClientConfig::from_env()?)?;
//!     let payer: serde_json::Value = client
//!         .do_json_endpoint(&CallContext::new(), "payers.get", Some("p_123"), NO_BODY)
//!         .await?;
//!     println!("{payer}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Re-export core types and traits
pub use paywire_core::{
    ApiErrorDetails, ApiResponse, CallContext, CancellationToken, ClientConfig,
    ClientConfigBuilder, ClientCredentials, EndpointRegistry, HttpConfig, HttpMethod, NO_BODY,
    PaywireClient, RequestBody, RetryConfig, SecretString,
    circuit_breaker::CircuitBreakerConfig,
    error::{Error, Result},
};

/// Lower-level building blocks.
pub use paywire_core as core;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use paywire_core::prelude::*;
}
