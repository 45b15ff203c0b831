//! Resilient request client with exponential backoff and jitter.
//!
//! Each [`ResilientClient::send`] call owns its attempt counter; the client
//! itself holds no mutable retry state and can be shared across tasks.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::graphql::{GraphQlPayload, classify_response};
use crate::models::Endpoint;
use crate::traits::Transport;
use crate::util::{ensure_not_cancelled, sleep_or_cancel};

/// Backoff schedule: `min(base * 2^(n-1) * (1 ± jitter), max_delay)` before retry `n`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Relative jitter, sampled uniformly from `[-jitter, +jitter]`.
    pub jitter: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(600),
            jitter: 0.25,
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_attempts == 0 {
            return Err(AppError::ConfigError(
                "max_attempts must be at least 1".into(),
            ));
        }
        if !self.jitter.is_finite() || !(0.0..1.0).contains(&self.jitter) {
            return Err(AppError::ConfigError(format!(
                "jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }
        Ok(())
    }

    /// Delay before retrying after failed attempt `attempt` (1-indexed),
    /// for a given jitter sample in `[-jitter, +jitter]`.
    pub fn delay_for_attempt(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.base_delay.as_secs_f64() * 2f64.powi(exponent) * (1.0 + jitter_sample);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn sample_delay(&self, attempt: u32) -> Duration {
        let sample = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        self.delay_for_attempt(attempt, sample)
    }
}

/// Sends GraphQL payloads and retries transient failures.
#[derive(Clone)]
pub struct ResilientClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> ResilientClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// POST `payload` to `endpoint` and return the parsed JSON response.
    ///
    /// Retryable errors (see [`AppError::is_retryable`]) are retried up to
    /// `max_attempts` times in total; any other error is returned at once.
    /// When the budget runs out the last error is wrapped in
    /// [`AppError::RetriesExhausted`].
    pub async fn send(
        &self,
        endpoint: &Endpoint,
        payload: &GraphQlPayload,
        cancel: &CancellationToken,
    ) -> Result<Value, AppError> {
        let body = serde_json::to_value(payload)?;
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            ensure_not_cancelled(cancel)?;

            let outcome = match self.transport.post_json(endpoint, &body).await {
                Ok(response) => classify_response(response),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(data) => {
                    if attempt > 1 {
                        tracing::debug!(url = %endpoint.url, attempt, "Request succeeded after retry");
                    }
                    return Ok(data);
                }
                Err(e) if e.is_retryable() => {
                    if attempt < max_attempts {
                        let delay = self.policy.sample_delay(attempt);
                        tracing::warn!(
                            url = %endpoint.url,
                            attempt,
                            max_attempts,
                            delay_ms = %delay.as_millis(),
                            error = %e,
                            "Transient failure, backing off"
                        );
                        sleep_or_cancel(delay, cancel).await?;
                    }
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::error!(url = %endpoint.url, attempt, error = %e, "Fatal request error");
                    return Err(e);
                }
            }
        }

        let last = last_error
            .unwrap_or_else(|| AppError::ProtocolError("no request attempt was made".into()));
        tracing::error!(url = %endpoint.url, attempts = max_attempts, error = %last, "Retries exhausted");
        Err(AppError::RetriesExhausted {
            attempts: max_attempts,
            last: Box::new(last),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::GraphQlRequest;
    use crate::testutil::*;
    use crate::traits::TransportResponse;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(max_attempts)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    fn payload() -> GraphQlPayload {
        GraphQlPayload::Single(GraphQlRequest::new("{ q }", serde_json::json!({})))
    }

    fn endpoint() -> Endpoint {
        Endpoint::new("https://example.com/graphql")
    }

    #[test]
    fn test_default_policy_constants() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 8);
        assert_eq!(policy.base_delay, Duration::from_millis(600));
        assert_eq!(policy.jitter, 0.25);
        assert_eq!(policy.max_delay, Duration::from_secs(20));
    }

    fn assert_close(actual: Duration, expected_ms: u64) {
        let diff = actual.as_secs_f64() * 1000.0 - expected_ms as f64;
        assert!(diff.abs() < 0.01, "expected ~{expected_ms}ms, got {actual:?}");
    }

    #[test]
    fn test_delay_schedule_doubles() {
        let policy = RetryPolicy::default();
        assert_close(policy.delay_for_attempt(1, 0.0), 600);
        assert_close(policy.delay_for_attempt(2, 0.0), 1200);
        assert_close(policy.delay_for_attempt(3, 0.0), 2400);
    }

    #[test]
    fn test_delay_jitter_bounds() {
        let policy = RetryPolicy::default();
        assert_close(policy.delay_for_attempt(1, -0.25), 450);
        assert_close(policy.delay_for_attempt(1, 0.25), 750);

        for _ in 0..100 {
            let d = policy.sample_delay(1);
            assert!(d >= Duration::from_millis(449) && d <= Duration::from_millis(751));
        }
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(7, 0.25), Duration::from_secs(20));
        assert_eq!(policy.delay_for_attempt(200, 0.0), Duration::from_secs(20));
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::default().with_max_attempts(0).validate().is_err());
        assert!(RetryPolicy::default().with_jitter(1.5).validate().is_err());
        assert!(RetryPolicy::default().with_jitter(f64::NAN).validate().is_err());
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let transport = MockTransport::with_responses(vec![Ok(json_response(
            serde_json::json!({"data": {"ok": true}}),
        ))]);
        let client = ResilientClient::new(transport.clone(), fast_policy(8));

        let data = client
            .send(&endpoint(), &payload(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(data["data"]["ok"], true);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn transient_200_then_success_retries() {
        let transport = MockTransport::with_responses(vec![
            Ok(server_error_response()),
            Err(AppError::NetworkError("reset".into())),
            Ok(TransportResponse::new(200, "not json")),
            Ok(json_response(serde_json::json!({"data": {"ok": true}}))),
        ]);
        let client = ResilientClient::new(transport.clone(), fast_policy(8));

        let data = client
            .send(&endpoint(), &payload(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(data["data"]["ok"], true);
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    async fn http_error_with_marker_is_retried() {
        let transport = MockTransport::with_responses(vec![
            Ok(TransportResponse::new(500, "Server error.")),
            Ok(json_response(serde_json::json!({"data": {}}))),
        ]);
        let client = ResilientClient::new(transport.clone(), fast_policy(8));

        client
            .send(&endpoint(), &payload(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn http_error_without_marker_is_fatal_immediately() {
        let transport = MockTransport::with_responses(vec![
            Ok(TransportResponse::new(400, "Bad request")),
            Ok(json_response(serde_json::json!({"data": {}}))),
        ]);
        let client = ResilientClient::new(transport.clone(), fast_policy(8));

        let err = client
            .send(&endpoint(), &payload(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::HttpStatus { status: 400, .. }));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn always_transient_exhausts_exact_attempt_budget() {
        let transport = MockTransport::always(server_error_response());
        let client = ResilientClient::new(transport.clone(), fast_policy(8));

        let err = client
            .send(&endpoint(), &payload(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(transport.call_count(), 8);
        match err {
            AppError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 8);
                assert!(matches!(*last, AppError::TransientServerFault(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_token_prevents_any_request() {
        let transport = MockTransport::always(server_error_response());
        let client = ResilientClient::new(transport.clone(), fast_policy(8));
        let token = CancellationToken::new();
        token.cancel();

        let err = client.send(&endpoint(), &payload(), &token).await.unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn payload_and_endpoint_reach_transport() {
        let transport = MockTransport::always(json_response(serde_json::json!({"data": {}})));
        let client = ResilientClient::new(transport.clone(), fast_policy(1));
        let batch = GraphQlPayload::Batch(vec![GraphQlRequest::new(
            "query",
            serde_json::json!({"input": {"zoom": 7}}),
        )]);

        client
            .send(&endpoint(), &batch, &CancellationToken::new())
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://example.com/graphql");
        assert_eq!(requests[0].payload[0]["variables"]["input"]["zoom"], 7);
    }
}
