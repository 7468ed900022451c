//! Circuit breaker guarding the upstream payments API.
//!
//! Consecutive 5xx outcomes are counted; once the count reaches
//! `failure_threshold` the circuit opens and every call fails fast with
//! [`Error::CircuitOpen`] without touching the network.
//!
//! There is no background timer. The next `is_open()` check after
//! `reset_timeout` has elapsed since the last failure closes the circuit and
//! lets that request through; its outcome decides whether the circuit opens
//! again.
//!
//! ```text
//! ┌────────┐  failures >= threshold   ┌──────┐
//! │ Closed │ ───────────────────────▶ │ Open │
//! └────────┘                          └──────┘
//!     ▲                                   │
//!     │ success, or reset_timeout elapsed │
//!     └───────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use paywire_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//!
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
//! if breaker.allow_request().is_ok() {
//!     // ... send the request, then on a 5xx:
//!     let just_opened = breaker.record_failure();
//!     assert!(!just_opened);
//! }
//! ```

use crate::error::{ConfigValidationError, Error, Result, ValidationResult};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally; failures are counted.
    Closed,
    /// Requests are rejected until `reset_timeout` elapses.
    Open,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    ///
    /// Default: 5
    pub failure_threshold: u32,

    /// Time since the last failure after which an open circuit closes again.
    ///
    /// Default: 30 seconds
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new circuit breaker configuration.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
        }
    }

    /// Validates the circuit breaker configuration.
    ///
    /// - `failure_threshold` must be > 0
    /// - `reset_timeout` under one second produces a warning
    pub fn validate(&self) -> std::result::Result<ValidationResult, ConfigValidationError> {
        let mut result = ValidationResult::new();

        if self.failure_threshold == 0 {
            return Err(ConfigValidationError::invalid(
                "failure_threshold",
                "failure_threshold must be greater than 0",
            ));
        }

        if self.reset_timeout < Duration::from_secs(1) {
            result.add_warning(format!(
                "reset_timeout {:?} is very short, may cause rapid state transitions",
                self.reset_timeout
            ));
        }

        Ok(result)
    }
}

/// Circuit breaker events for observability.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit breaker state has changed.
    StateChanged {
        /// The previous state
        from: CircuitState,
        /// The new state
        to: CircuitState,
    },

    /// A request was rejected because the circuit is open.
    RequestRejected {
        /// Time left until the circuit may close
        remaining: Duration,
    },

    /// A failure was recorded.
    FailureRecorded {
        /// The current consecutive failure count
        count: u32,
    },
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    open: bool,
}

/// Per-client circuit breaker.
///
/// All operations are serialized by one short, I/O-free lock.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: CircuitBreakerConfig,
    event_tx: Option<mpsc::UnboundedSender<CircuitBreakerEvent>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// Creates a new circuit breaker in the Closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
            event_tx: None,
        }
    }

    /// Creates a circuit breaker that reports transitions on `event_tx`.
    ///
    /// ```rust
    /// use paywire_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerEvent};
    /// use tokio::sync::mpsc;
    ///
    /// let (tx, _rx) = mpsc::unbounded_channel::<CircuitBreakerEvent>();
    /// let breaker = CircuitBreaker::with_events(CircuitBreakerConfig::default(), tx);
    /// ```
    pub fn with_events(
        config: CircuitBreakerConfig,
        event_tx: mpsc::UnboundedSender<CircuitBreakerEvent>,
    ) -> Self {
        Self {
            event_tx: Some(event_tx),
            ..Self::new(config)
        }
    }

    /// Returns `true` while the circuit blocks requests.
    ///
    /// An open circuit whose `reset_timeout` has elapsed since the last
    /// failure is closed here and `false` is returned.
    pub fn is_open(&self) -> bool {
        self.remaining_open().is_some()
    }

    fn remaining_open(&self) -> Option<Duration> {
        let mut state = self.state.lock();
        if !state.open {
            return None;
        }

        let elapsed = state
            .last_failure
            .map_or(self.config.reset_timeout, |t| t.elapsed());
        if elapsed >= self.config.reset_timeout {
            // Keep the count: one more failure reopens the circuit.
            state.open = false;
            drop(state);
            info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Circuit breaker: reset timeout elapsed, closing circuit"
            );
            self.emit_event(CircuitBreakerEvent::StateChanged {
                from: CircuitState::Open,
                to: CircuitState::Closed,
            });
            return None;
        }

        Some(self.config.reset_timeout - elapsed)
    }

    /// Fails with [`Error::CircuitOpen`] when the circuit is open.
    pub fn allow_request(&self) -> Result<()> {
        match self.remaining_open() {
            None => Ok(()),
            Some(remaining) => {
                warn!(
                    remaining_ms = remaining.as_millis() as u64,
                    "Circuit breaker: open, rejecting request"
                );
                self.emit_event(CircuitBreakerEvent::RequestRejected { remaining });
                Err(Error::circuit_open(format!(
                    "upstream unavailable, retry after {}ms",
                    remaining.as_millis()
                )))
            }
        }
    }

    /// Records a successful outcome, closing the circuit and clearing the count.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        let was_open = state.open;
        state.consecutive_failures = 0;
        state.open = false;
        drop(state);

        if was_open {
            info!("Circuit breaker: success recorded, closing circuit");
            self.emit_event(CircuitBreakerEvent::StateChanged {
                from: CircuitState::Open,
                to: CircuitState::Closed,
            });
        }
    }

    /// Records a failed outcome.
    ///
    /// Returns `true` if this failure just opened the circuit.
    pub fn record_failure(&self) -> bool {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(Instant::now());
        let count = state.consecutive_failures;
        let just_opened = !state.open && count >= self.config.failure_threshold;
        if just_opened {
            state.open = true;
        }
        drop(state);

        debug!(
            failure_count = count,
            threshold = self.config.failure_threshold,
            "Circuit breaker: failure recorded"
        );
        self.emit_event(CircuitBreakerEvent::FailureRecorded { count });

        if just_opened {
            warn!(
                failure_count = count,
                reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                "Circuit breaker: failure threshold reached, opening circuit"
            );
            self.emit_event(CircuitBreakerEvent::StateChanged {
                from: CircuitState::Closed,
                to: CircuitState::Open,
            });
        }
        just_opened
    }

    /// Returns the current state, applying the lazy reset first.
    pub fn state(&self) -> CircuitState {
        if self.is_open() {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Returns the current consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Resets the circuit breaker to its initial state (Closed).
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let was_open = state.open;
        *state = BreakerState::default();
        drop(state);

        if was_open {
            info!("Circuit breaker: manual reset to Closed state");
            self.emit_event(CircuitBreakerEvent::StateChanged {
                from: CircuitState::Open,
                to: CircuitState::Closed,
            });
        }
    }

    fn emit_event(&self, event: CircuitBreakerEvent) {
        if let Some(ref tx) = self.event_tx {
            // receiver may have been dropped
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    fn breaker(threshold: u32, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig::new(threshold, reset))
    }

    #[test]
    fn test_config_default_and_validate() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reset_timeout, Duration::from_secs(30));
        assert!(!config.validate().unwrap().has_warnings());
    }

    #[test]
    fn test_config_validate_zero_threshold() {
        let err = CircuitBreakerConfig::new(0, Duration::from_secs(30))
            .validate()
            .unwrap_err();
        assert_eq!(err.field_name(), "failure_threshold");
    }

    #[test]
    fn test_config_validate_short_reset_warns() {
        let result = CircuitBreakerConfig::new(5, Duration::from_millis(100))
            .validate()
            .unwrap();
        assert!(result.has_warnings());
    }

    #[test]
    fn test_initial_state_closed() {
        let breaker = CircuitBreaker::default();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(!breaker.is_open());
        assert!(breaker.allow_request().is_ok());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_opens_exactly_at_threshold() {
        let breaker = breaker(3, Duration::from_secs(60));
        assert!(!breaker.record_failure());
        assert!(!breaker.record_failure());
        assert!(!breaker.is_open());
        assert!(breaker.record_failure());
        assert!(breaker.is_open());

        let err = breaker.allow_request().unwrap_err();
        assert!(err.is_circuit_open());

        // further failures do not report a fresh opening
        assert!(!breaker.record_failure());
        assert_eq!(breaker.failure_count(), 4);
    }

    #[test]
    fn test_success_resets_counter() {
        let breaker = breaker(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);
        assert!(!breaker.record_failure());
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_success_closes_open_circuit() {
        let breaker = breaker(1, Duration::from_secs(60));
        assert!(breaker.record_failure());
        assert!(breaker.is_open());
        breaker.record_success();
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_reset_after_timeout() {
        let breaker = breaker(2, Duration::from_secs(30));
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.is_open());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(breaker.is_open());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!breaker.is_open());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 2);

        // the first request after the reset succeeds
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);
        assert!(!breaker.record_failure());
        assert!(breaker.allow_request().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_reset_reopens_immediately() {
        let breaker = breaker(3, Duration::from_secs(30));
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 3);

        assert!(breaker.record_failure());
        assert!(breaker.is_open());
        assert!(breaker.allow_request().unwrap_err().is_circuit_open());

        // the reset window restarts from the latest failure
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(breaker.is_open());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!breaker.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_window_measured_from_last_failure() {
        let breaker = breaker(1, Duration::from_secs(10));
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(8)).await;
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(breaker.is_open());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_manual_reset() {
        let breaker = breaker(1, Duration::from_secs(60));
        breaker.record_failure();
        breaker.reset();
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_events_emitted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let breaker = CircuitBreaker::with_events(
            CircuitBreakerConfig::new(2, Duration::from_secs(60)),
            tx,
        );

        breaker.record_failure();
        breaker.record_failure();
        let _ = breaker.allow_request();
        breaker.record_success();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert!(matches!(events[0], CircuitBreakerEvent::FailureRecorded { count: 1 }));
        assert!(matches!(events[1], CircuitBreakerEvent::FailureRecorded { count: 2 }));
        assert!(matches!(
            events[2],
            CircuitBreakerEvent::StateChanged {
                from: CircuitState::Closed,
                to: CircuitState::Open
            }
        ));
        assert!(matches!(events[3], CircuitBreakerEvent::RequestRejected { .. }));
        assert!(matches!(
            events[4],
            CircuitBreakerEvent::StateChanged {
                from: CircuitState::Open,
                to: CircuitState::Closed
            }
        ));
    }

    #[test]
    fn test_concurrent_failures_open_once() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let breaker = Arc::new(breaker(10, Duration::from_secs(60)));
        let openings = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                let openings = Arc::clone(&openings);
                std::thread::spawn(move || {
                    if breaker.record_failure() {
                        openings.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(openings.load(Ordering::SeqCst), 1);
        assert!(breaker.is_open());
    }
}
