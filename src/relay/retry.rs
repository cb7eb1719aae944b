//! Bounded retry of the status-apply step.
//!
//! One message is applied with at most `max_retries + 1` calls to
//! `set_processed(id, true)`, sleeping a fixed `retry_delay` between calls.
//! NotFound and InvalidInput end the attempt sequence at once; they can never
//! succeed. The delay is raced against the cancellation token.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::RelaySettings;
use crate::persistence::MessageStore;
use crate::utils::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Upper bound on calls made for one message.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(5000))
    }
}

impl From<&RelaySettings> for RetryPolicy {
    fn from(settings: &RelaySettings) -> Self {
        Self::new(settings.max_retries, settings.retry_delay())
    }
}

/// Terminal state of one in-flight message.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The store accepted the update on attempt `attempts`.
    Applied { attempts: u32 },
    /// Abandoned without retrying; nothing more can be done for this message.
    Skipped { kind: ErrorKind, error: Error },
    /// Every attempt failed with a retryable error; `error` is the last one.
    Exhausted { attempts: u32, error: Error },
    /// Shutdown was requested during a retry delay.
    Cancelled { attempts: u32 },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

/// Mark message `id` processed, retrying transient failures per `policy`.
pub async fn apply_with_retry(
    store: &dyn MessageStore,
    id: i64,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> ApplyOutcome {
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        let err = match store.set_processed(id, true).await {
            Ok(()) => {
                if attempt > 1 {
                    info!(id, attempt, "Message applied after retry");
                }
                return ApplyOutcome::Applied { attempts: attempt };
            }
            Err(err) => err,
        };

        match err.kind() {
            ErrorKind::NotFound => {
                warn!(id, op = err.op(), "Message not found for processing, skipping");
                return ApplyOutcome::Skipped {
                    kind: err.kind(),
                    error: err,
                };
            }
            ErrorKind::InvalidInput => {
                warn!(id, error = %err, "Invalid message id, skipping");
                return ApplyOutcome::Skipped {
                    kind: err.kind(),
                    error: err,
                };
            }
            _ => {}
        }

        if attempt >= max_attempts {
            error!(
                id,
                attempts = attempt,
                kind = %err.kind(),
                error = %err,
                "Failed to process message after retries"
            );
            return ApplyOutcome::Exhausted {
                attempts: attempt,
                error: err,
            };
        }

        warn!(
            id,
            attempt,
            max_attempts,
            kind = %err.kind(),
            error = %err,
            "Error processing message, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(id, attempt, "Retry interrupted by shutdown");
                return ApplyOutcome::Cancelled { attempts: attempt };
            }
            _ = tokio::time::sleep(policy.retry_delay) => {}
        }

        attempt += 1;
    }
}
