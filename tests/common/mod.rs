//! Shared helpers for the end-to-end client tests.

// Allow clippy warnings for test helper code
#![allow(clippy::disallowed_methods)]
#![allow(dead_code)]

use chrono::{TimeDelta, Utc};
use paywire::{CircuitBreakerConfig, ClientConfig, HttpConfig, PaywireClient, RetryConfig};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const LOGIN_PATH: &str = "/auth/login";
pub const TEST_TOKEN: &str = "tok_integration";

/// Login response valid for an hour.
pub fn login_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "token": TEST_TOKEN,
        "expires_at": (Utc::now() + TimeDelta::hours(1)).to_rfc3339(),
    }))
}

/// Mounts a login endpoint that always succeeds.
pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(login_response())
        .mount(server)
        .await;
}

/// Retry settings with millisecond delays so tests stay fast.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        rate_limit_base_delay: Duration::from_millis(10),
        server_error_delay: Duration::from_millis(10),
        ..RetryConfig::default()
    }
}

/// Client pointed at `server` with the given breaker settings.
pub fn client_with_breaker(server: &MockServer, breaker: CircuitBreakerConfig) -> PaywireClient {
    let config = ClientConfig::builder()
        .base_url(server.uri())
        .client_id("client-it")
        .api_key("sk_integration")
        .http(HttpConfig {
            allow_insecure_http: true,
            retry_config: fast_retry(),
            circuit_breaker: breaker,
            ..HttpConfig::default()
        })
        .build()
        .expect("valid test configuration");
    PaywireClient::new(config).expect("client construction")
}

/// Client pointed at `server` with default breaker settings.
pub fn client(server: &MockServer) -> PaywireClient {
    client_with_breaker(server, CircuitBreakerConfig::default())
}

/// Requests received on `p`, in arrival order.
pub async fn requests_to(server: &MockServer, p: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == p)
        .collect()
}

/// Value of header `name` on `request`.
pub fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
