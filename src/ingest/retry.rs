// src/ingest/retry.rs
//! Bounded retry with exponential backoff around one adapter call.
//!
//! Only failures the adapter marks `transient` are retried. A non-transient
//! failure ends the sequence at once. Backoff waits are `tokio::time::sleep`s,
//! so a waiting source never holds up the others.

use std::future::Future;
use std::time::Duration;

use metrics::counter;

use crate::ingest::types::AdapterError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Per-attempt deadline; expiry counts as a transient failure.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            attempt_timeout: Some(DEFAULT_ATTEMPT_TIMEOUT),
        }
    }
}

impl RetryPolicy {
    /// Same per-attempt deadline as [`Default`]; use [`Self::with_attempt_timeout`]
    /// to change or disable it.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

/// Wait after the failed attempt `attempt` (0-indexed): `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Terminal failure of one source within one pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceFailure {
    #[error("{source_id}: gave up after {attempts} attempts: {last_cause}")]
    RetryExhausted {
        source_id: String,
        attempts: u32,
        last_cause: String,
    },
    #[error("{source_id}: non-transient failure on attempt {attempts}: {cause}")]
    NonTransient {
        source_id: String,
        attempts: u32,
        cause: String,
    },
    #[error("{source_id}: cancelled before completion")]
    Cancelled { source_id: String },
    #[error("{source_id}: adapter task panicked: {detail}")]
    Panicked { source_id: String, detail: String },
}

impl SourceFailure {
    pub fn source_id(&self) -> &str {
        match self {
            Self::RetryExhausted { source_id, .. }
            | Self::NonTransient { source_id, .. }
            | Self::Cancelled { source_id }
            | Self::Panicked { source_id, .. } => source_id,
        }
    }

    /// Attempts made, when the failure happened inside the retry loop.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetryExhausted { attempts, .. } | Self::NonTransient { attempts, .. } => {
                Some(*attempts)
            }
            Self::Cancelled { .. } | Self::Panicked { .. } => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. } | Self::Cancelled { .. })
    }
}

/// Successful result plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run `call` until it succeeds, fails non-transiently, or the budget is spent.
/// Attempts are strictly sequential.
pub async fn retry<T, F, Fut>(
    source_id: &str,
    policy: &RetryPolicy,
    mut call: F,
) -> Result<Attempted<T>, SourceFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        counter!("ingest_fetch_attempts_total").increment(1);
        let result = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, call()).await {
                Ok(r) => r,
                Err(_) => Err(AdapterError::transient(
                    source_id,
                    format!("attempt timed out after {}ms", limit.as_millis()),
                )),
            },
            None => call().await,
        };

        let err = match result {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    attempts: attempt + 1,
                })
            }
            Err(e) => e,
        };

        tracing::warn!(
            target: "ingest",
            source = source_id,
            attempt = attempt + 1,
            transient = err.transient,
            error = %err.cause,
            "scrape attempt failed"
        );

        if !err.transient {
            return Err(SourceFailure::NonTransient {
                source_id: source_id.to_string(),
                attempts: attempt + 1,
                cause: err.cause,
            });
        }

        if attempt + 1 >= max_attempts {
            tracing::error!(
                target: "ingest",
                source = source_id,
                attempts = attempt + 1,
                "all retry attempts failed"
            );
            return Err(SourceFailure::RetryExhausted {
                source_id: source_id.to_string(),
                attempts: attempt + 1,
                last_cause: err.cause,
            });
        }

        let delay = backoff_delay(policy.base_delay, attempt);
        tracing::info!(
            target: "ingest",
            source = source_id,
            delay_ms = delay.as_millis() as u64,
            "retrying"
        );
        counter!("ingest_retries_total").increment(1);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
