#![allow(clippy::disallowed_methods)] // unwrap() is acceptable in tests

use super::*;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::endpoint::HttpMethod;
use crate::error::{Error, NetworkError};
use crate::retry_strategy::RetryConfig;
use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> HttpConfig {
    HttpConfig {
        allow_insecure_http: true,
        retry_config: RetryConfig {
            rate_limit_base_delay: Duration::from_millis(10),
            server_error_delay: Duration::from_millis(10),
            ..RetryConfig::default()
        },
        ..HttpConfig::default()
    }
}

fn request(server: &MockServer, method: HttpMethod, p: &str) -> HttpRequest {
    HttpRequest::new(method, Url::parse(&format!("{}{p}", server.uri())).unwrap())
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

#[tokio::test]
async fn test_http_client_creation() {
    assert!(HttpClient::new(HttpConfig::default()).is_ok());

    let invalid = HttpConfig {
        max_connections_per_host: 0,
        ..HttpConfig::default()
    };
    assert!(matches!(HttpClient::new(invalid), Err(Error::Config(_))));
}

#[tokio::test]
async fn test_https_only_rejects_plain_http() {
    let server = MockServer::start().await;
    let client = HttpClient::new(HttpConfig::default()).unwrap();

    let result = client
        .execute_with_retry(
            &request(&server, HttpMethod::Get, "/balances"),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(Error::Network(_))));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_success_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/balances"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"available":100}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(test_config()).unwrap();
    let response = client
        .execute_with_retry(
            &request(&server, HttpMethod::Get, "/balances"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, Bytes::from_static(br#"{"available":100}"#));
    assert_eq!(client.circuit_breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_get_server_error_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payers/p_1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payers/p_1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = HttpClient::new(test_config()).unwrap();
    let response = client
        .execute_with_retry(
            &request(&server, HttpMethod::Get, "/payers/p_1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(request_count(&server).await, 2);
    // the success resets the failure recorded for the 503
    assert_eq!(client.circuit_breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_get_server_error_gives_up_after_one_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = HttpClient::new(test_config()).unwrap();
    let response = client
        .execute_with_retry(
            &request(&server, HttpMethod::Get, "/payers"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 500);
    assert_eq!(request_count(&server).await, 2);
    assert_eq!(client.circuit_breaker().failure_count(), 2);
}

#[tokio::test]
async fn test_post_server_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transfers"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = HttpClient::new(test_config()).unwrap();
    let response = client
        .execute_with_retry(
            &request(&server, HttpMethod::Post, "/transfers").body(b"{}".to_vec()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 500);
    assert_eq!(request_count(&server).await, 1);
    assert_eq!(client.circuit_breaker().failure_count(), 1);
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = HttpClient::new(test_config()).unwrap();
    let response = client
        .execute_with_retry(
            &request(&server, HttpMethod::Get, "/payers/nope"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert_eq!(request_count(&server).await, 1);
    assert_eq!(client.circuit_breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_rate_limit_retried_three_times_for_post() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = HttpClient::new(test_config()).unwrap();
    let response = client
        .execute_with_retry(
            &request(&server, HttpMethod::Post, "/payments").body(b"{}".to_vec()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 429);
    assert_eq!(request_count(&server).await, 4);
    // 429 is not an upstream failure
    assert_eq!(client.circuit_breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_retry_after_zero_retries_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = HttpConfig {
        retry_config: RetryConfig {
            rate_limit_base_delay: Duration::from_secs(10),
            ..RetryConfig::default()
        },
        ..test_config()
    };
    let client = HttpClient::new(config).unwrap();

    let started = Instant::now();
    let response = client
        .execute_with_retry(
            &request(&server, HttpMethod::Get, "/balances"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_body_replayed_on_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let payload = serde_json::json!({"amount": 1250, "currency": "EUR"});
    let client = HttpClient::new(test_config()).unwrap();
    let response = client
        .execute_with_retry(
            &request(&server, HttpMethod::Post, "/payments")
                .body(RequestBody::json(&payload).unwrap()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 201);
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    for req in &received {
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body, payload);
    }
}

#[tokio::test]
async fn test_stream_body_cannot_be_replayed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .mount(&server)
        .await;

    let stream = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
        b"{\"amount\":1}",
    ))]);
    let body = RequestBody::from_stream(stream);
    assert!(!body.is_replayable());

    let client = HttpClient::new(test_config()).unwrap();
    let result = client
        .execute_with_retry(
            &request(&server, HttpMethod::Post, "/payments").body(body),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(Error::InvalidRequest(_))));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_circuit_opens_and_blocks_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let config = HttpConfig {
        circuit_breaker: CircuitBreakerConfig::new(2, Duration::from_secs(60)),
        ..test_config()
    };
    let client = HttpClient::new(config).unwrap();
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let response = client
            .execute_with_retry(&request(&server, HttpMethod::Post, "/transfers"), &cancel)
            .await
            .unwrap();
        assert_eq!(response.status, 502);
    }
    assert!(client.circuit_breaker().is_open());

    let err = client
        .execute_with_retry(&request(&server, HttpMethod::Post, "/transfers"), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_cancel_during_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .mount(&server)
        .await;

    let client = HttpClient::new(test_config()).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = client
        .execute_with_retry(&request(&server, HttpMethod::Get, "/payers"), &cancel)
        .await
        .unwrap_err();

    assert!(err.as_cancelled().is_some());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_cancel_before_send() {
    let server = MockServer::start().await;
    let client = HttpClient::new(test_config()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client
        .execute_with_retry(&request(&server, HttpMethod::Get, "/payers"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled(_)));
}

#[tokio::test]
async fn test_response_size_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let config = HttpConfig {
        max_response_size: 1024,
        ..test_config()
    };
    let client = HttpClient::new(config).unwrap();
    let err = client
        .execute_with_retry(
            &request(&server, HttpMethod::Get, "/disputes"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        Error::Network(inner) => {
            assert!(matches!(*inner, NetworkError::ResponseTooLarge { limit: 1024, .. }));
        }
        other => panic!("expected network error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_size_limit() {
    let server = MockServer::start().await;
    let config = HttpConfig {
        max_request_size: 8,
        ..test_config()
    };
    let client = HttpClient::new(config).unwrap();
    let err = client
        .execute_with_retry(
            &request(&server, HttpMethod::Post, "/payments").body(vec![b'x'; 64]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(request_count(&server).await, 0);
}

#[test]
fn test_request_path_keeps_query() {
    let url = Url::parse("https://api.paywire.test/v2/payments?limit=10&cursor=abc").unwrap();
    let request = HttpRequest::new(HttpMethod::Get, url);
    assert_eq!(request.path(), "/v2/payments?limit=10&cursor=abc");

    let url = Url::parse("https://api.paywire.test/v2/payers/p_1").unwrap();
    assert_eq!(HttpRequest::new(HttpMethod::Get, url).path(), "/v2/payers/p_1");
}
