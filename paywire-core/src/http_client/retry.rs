use crate::error::{Error, Result};
use crate::retry_strategy::{RetryAttemptContext, RetryDecision, StatusClass};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use super::builder::HttpClient;
use super::request::HttpRequest;
use super::response::ApiResponse;

/// States of one logical call.
#[derive(Debug)]
enum RetryState {
    /// Check the breaker, then send.
    Attempt,
    /// Record the outcome and decide.
    Classify(ApiResponse),
    /// Wait before the next attempt. The previous response is already gone.
    Backoff(Duration),
    /// Hand this response back.
    Done(ApiResponse),
}

impl HttpClient {
    /// Sends `request`, retrying per the configured strategy.
    ///
    /// Returns the final response whatever its status: a 4xx, the last 429
    /// once retries are exhausted, or the last 5xx. Fails without any network
    /// traffic when the circuit breaker is open, and with
    /// [`Error::Cancelled`] when `cancel` fires during a round-trip or a
    /// backoff.
    #[instrument(
        name = "http_execute_with_retry",
        skip(self, request, cancel),
        fields(method = %request.method, path = %request.path())
    )]
    pub async fn execute_with_retry(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        let mut ctx = RetryAttemptContext::new(request.method);
        let mut attempt: u32 = 0;
        let mut state = RetryState::Attempt;

        loop {
            state = match state {
                RetryState::Attempt => {
                    self.circuit_breaker().allow_request()?;
                    attempt += 1;
                    debug!(attempt, "Sending attempt");
                    RetryState::Classify(self.send_once(request, cancel).await?)
                }
                RetryState::Classify(response) => self.classify(response, &mut ctx, attempt),
                RetryState::Backoff(delay) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            warn!(attempt, "Cancelled during retry backoff");
                            return Err(Error::cancelled("cancelled during retry backoff"));
                        }
                        () = tokio::time::sleep(delay) => RetryState::Attempt,
                    }
                }
                RetryState::Done(response) => {
                    debug!(
                        attempt,
                        status = response.status,
                        retries = ctx.retries(),
                        "Request finished"
                    );
                    return Ok(response);
                }
            };
        }
    }

    fn classify(
        &self,
        response: ApiResponse,
        ctx: &mut RetryAttemptContext,
        attempt: u32,
    ) -> RetryState {
        let status = response.status;
        match StatusClass::of(status) {
            StatusClass::Success if response.is_success() => {
                self.circuit_breaker().record_success();
            }
            StatusClass::ServerError => {
                if self.circuit_breaker().record_failure() {
                    error!(
                        status,
                        failure_threshold = self.circuit_breaker().config().failure_threshold,
                        "Circuit breaker opened after consecutive server errors"
                    );
                }
            }
            _ => {}
        }

        match self
            .retry_strategy()
            .decide(status, response.retry_after(), ctx)
        {
            RetryDecision::Stop => RetryState::Done(response),
            RetryDecision::Retry { delay } => {
                warn!(
                    attempt,
                    status,
                    delay_ms = delay.as_millis() as u64,
                    rate_limit_retries = ctx.rate_limit_retries,
                    server_error_retries = ctx.server_error_retries,
                    "Retrying after delay"
                );
                drop(response);
                RetryState::Backoff(delay)
            }
        }
    }
}
