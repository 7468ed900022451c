//! Property-based tests for the resilience primitives.
//!
//! Covers idempotency path matching, rate-limit backoff bounds, circuit
//! breaker thresholds and idempotency key format.

use paywire_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use paywire_core::endpoint::HttpMethod;
use paywire_core::idempotency::{IdempotencyPolicy, generate_key};
use paywire_core::retry_strategy::{
    RetryAttemptContext, RetryConfig, RetryDecision, RetryStrategy,
};
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Test Generators
// ============================================================================

/// Strategy for a single, slash-free path segment.
fn segment_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,24}"
}

/// Strategy for the templated financial endpoints of the default registry.
fn financial_template_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("/payments/{}/cancel"),
        Just("/payments/{}/refund"),
        Just("/authorizations/{}/capture"),
        Just("/authorizations/{}/void"),
        Just("/disputes/{}/submit"),
    ]
}

fn strategy_with_base(base_ms: u64) -> RetryStrategy {
    RetryStrategy::new(RetryConfig {
        rate_limit_base_delay: Duration::from_millis(base_ms),
        max_delay: Duration::from_secs(3600),
        ..RetryConfig::default()
    })
}

// ============================================================================
// Idempotency path matching
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_single_segment_matches_financial_template(
        template in financial_template_strategy(),
        id in segment_strategy(),
    ) {
        let policy = IdempotencyPolicy::default();
        let path = template.replace("{}", &id);
        prop_assert!(policy.is_financial_operation(&path), "{path} should match");
    }

    #[test]
    fn prop_multi_segment_never_matches(
        template in financial_template_strategy(),
        first in segment_strategy(),
        second in segment_strategy(),
    ) {
        let policy = IdempotencyPolicy::default();
        let path = template.replace("{}", &format!("{first}/{second}"));
        prop_assert!(!policy.is_financial_operation(&path), "{path} should not match");
    }

    #[test]
    fn prop_query_string_ignored(
        template in financial_template_strategy(),
        id in segment_strategy(),
        query in "[a-z]{1,8}=[a-z0-9]{1,8}",
    ) {
        let policy = IdempotencyPolicy::default();
        let path = format!("{}?{query}", template.replace("{}", &id));
        prop_assert!(policy.is_financial_operation(&path));
    }

    #[test]
    fn prop_read_paths_never_financial(id in segment_strategy()) {
        let policy = IdempotencyPolicy::default();
        for template in ["/payers/{}", "/payments/{}", "/transfers/{}", "/disputes/{}"] {
            let path = template.replace("{}", &id);
            prop_assert!(!policy.is_financial_operation(&path), "{path} should not match");
        }
    }
}

// ============================================================================
// Rate-limit backoff
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_rate_limit_delay_within_jitter_bounds(base_ms in 10u64..2_000, retry in 0u32..3) {
        let strategy = strategy_with_base(base_ms);
        let expected = Duration::from_millis(base_ms * 2u64.pow(retry));

        prop_assert_eq!(strategy.base_rate_limit_delay(retry), expected);

        let delay = strategy.rate_limit_delay(retry, None);
        prop_assert!(delay >= expected);
        prop_assert!(delay < expected + expected / 2 + Duration::from_millis(1));
    }

    #[test]
    fn prop_retry_after_used_verbatim(base_ms in 10u64..2_000, retry in 0u32..3, secs in 0u64..600) {
        let strategy = strategy_with_base(base_ms);
        let server = Duration::from_secs(secs);
        prop_assert_eq!(strategy.rate_limit_delay(retry, Some(server)), server);
    }

    #[test]
    fn prop_rate_limit_retries_bounded(max in 0u32..=10, method_idx in 0usize..4) {
        let methods = [HttpMethod::Get, HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete];
        let strategy = RetryStrategy::new(RetryConfig {
            max_rate_limit_retries: max,
            ..RetryConfig::default()
        });
        let mut ctx = RetryAttemptContext::new(methods[method_idx]);

        let mut retries = 0;
        while let RetryDecision::Retry { .. } = strategy.decide(429, Some(Duration::ZERO), &mut ctx) {
            retries += 1;
            prop_assert!(retries <= max);
        }
        prop_assert_eq!(retries, max);
    }

    #[test]
    fn prop_server_errors_retry_only_idempotent(status in 500u16..600, method_idx in 0usize..7) {
        let methods = [
            HttpMethod::Get,
            HttpMethod::Head,
            HttpMethod::Options,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Patch,
            HttpMethod::Delete,
        ];
        let method = methods[method_idx];
        let strategy = RetryStrategy::default();
        let mut ctx = RetryAttemptContext::new(method);

        let first = strategy.decide(status, None, &mut ctx);
        prop_assert_eq!(matches!(first, RetryDecision::Retry { .. }), method.is_idempotent());
        prop_assert_eq!(strategy.decide(status, None, &mut ctx), RetryDecision::Stop);
    }
}

// ============================================================================
// Circuit breaker thresholds
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_breaker_opens_exactly_at_threshold(threshold in 1u32..20) {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::new(threshold, Duration::from_secs(60)));

        for n in 1..threshold {
            prop_assert!(!breaker.record_failure());
            prop_assert_eq!(breaker.failure_count(), n);
            prop_assert!(!breaker.is_open());
        }
        prop_assert!(breaker.record_failure());
        prop_assert!(breaker.is_open());
        prop_assert!(breaker.allow_request().is_err());

        breaker.record_success();
        prop_assert_eq!(breaker.state(), CircuitState::Closed);
        prop_assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn prop_success_interrupts_failure_streak(threshold in 2u32..20, before in 1u32..20) {
        let before = before.min(threshold - 1);
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::new(threshold, Duration::from_secs(60)));

        for _ in 0..before {
            breaker.record_failure();
        }
        breaker.record_success();
        for _ in 0..threshold - 1 {
            breaker.record_failure();
        }
        prop_assert!(!breaker.is_open());
    }
}

// ============================================================================
// Idempotency keys
// ============================================================================

#[test]
fn test_generated_keys_are_lowercase_hex_and_unique() {
    let keys: std::collections::HashSet<String> = (0..1_000).map(|_| generate_key()).collect();
    assert_eq!(keys.len(), 1_000);
    for key in &keys {
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }
}
