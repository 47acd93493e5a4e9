//! Timeout and bounded retry around oracle calls.
//!
//! Oracle calls are the only high-latency operations inside a case. Each
//! attempt runs under `RetryPolicy::timeout`; transport failures and timeouts
//! are retried with exponential backoff up to `max_attempts`, after which the
//! stage fails with `OracleUnavailable` and the case degrades to a
//! "Processing Error" record. Dropping the future cancels the in-flight call.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use gapwise_contracts::{
    error::{GapwiseError, GapwiseResult, OracleError},
    oracle::{OracleReply, OracleRequest},
    route::StageName,
};

use crate::traits::Oracle;

/// How hard to try before giving up on an oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Total attempts, first call included. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// An oracle handle wrapped with a retry policy. Cheap to clone.
#[derive(Clone)]
pub struct GuardedOracle {
    inner: Arc<dyn Oracle>,
    policy: RetryPolicy,
}

impl GuardedOracle {
    pub fn new(inner: Arc<dyn Oracle>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Ask the oracle on behalf of `stage`.
    ///
    /// # Errors
    ///
    /// - `SchemaViolation` if the reply answers a different task than asked.
    ///   Not retried: a confused oracle will not fix itself on the next call.
    /// - `OracleUnavailable` once every attempt has failed or timed out.
    pub async fn ask(&self, stage: StageName, request: &OracleRequest) -> GapwiseResult<OracleReply> {
        self.ask_as(stage.as_str(), request).await
    }

    /// Same as `ask`, for callers outside the graph such as the intake
    /// delta filter.
    pub async fn ask_as(&self, stage: &str, request: &OracleRequest) -> GapwiseResult<OracleReply> {
        let attempts = self.policy.attempts();
        let mut last_error: Option<OracleError> = None;

        for attempt in 1..=attempts {
            debug!(stage = %stage, task = %request.task, attempt, "calling oracle");

            let outcome = tokio::time::timeout(self.policy.timeout, self.inner.ask(request)).await;
            let error = match outcome {
                Ok(Ok(reply)) => {
                    if reply.task != request.task {
                        return Err(GapwiseError::SchemaViolation {
                            stage: stage.to_string(),
                            reason: format!(
                                "asked for '{}' but the oracle answered '{}'",
                                request.task, reply.task
                            ),
                        });
                    }
                    return Ok(reply);
                }
                Ok(Err(error)) => error,
                Err(_) => OracleError::Timeout {
                    after_ms: self.policy.timeout.as_millis() as u64,
                },
            };

            warn!(
                stage = %stage,
                task = %request.task,
                attempt,
                max_attempts = attempts,
                error = %error,
                "oracle call failed"
            );
            last_error = Some(error);

            if attempt < attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        Err(GapwiseError::OracleUnavailable {
            stage: stage.to_string(),
            attempts,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt was made".to_string()),
        })
    }
}
