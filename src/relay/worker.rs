//! Asynchronous side of the relay: the consume loop.
//!
//! A single worker pulls one payload at a time from the channel, decodes the
//! envelope, and applies `processed = true` under the bounded retry policy.
//! Every message ends applied, skipped, or exhausted; none blocks the next.
//!
//! The broker read is not coupled to the apply step: a payload read just
//! before a crash is lost rather than redelivered.
//!
//! A failed read is followed by a fixed [`READ_FAILURE_PAUSE`] so a broker
//! that keeps failing costs one error log per pause, not a busy loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::retry::{ApplyOutcome, RetryPolicy, apply_with_retry};
use crate::broker::{Consumer, Envelope};
use crate::persistence::MessageStore;
use crate::utils::ErrorKind;

/// Wait after a failed broker read before reading again.
pub const READ_FAILURE_PAUSE: Duration = Duration::from_millis(100);

/// What happened to the payloads the worker saw before it stopped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    pub applied: u64,
    pub skipped: u64,
    pub exhausted: u64,
    pub malformed: u64,
    pub read_failures: u64,
}

pub struct RelayWorker {
    store: Arc<dyn MessageStore>,
    consumer: Arc<dyn Consumer>,
    channel: String,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RelayWorker {
    pub fn new(
        store: Arc<dyn MessageStore>,
        consumer: Arc<dyn Consumer>,
        channel: impl Into<String>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            consumer,
            channel: channel.into(),
            policy,
            cancel,
        }
    }

    /// Consume until the cancellation token fires.
    pub async fn run(self) -> RelayReport {
        let mut report = RelayReport::default();
        info!(channel = %self.channel, "Starting message processor");

        while !self.cancel.is_cancelled() {
            let payload = match self.consumer.consume(&self.channel, &self.cancel).await {
                Ok(payload) => payload,
                Err(err) if err.kind() == ErrorKind::Cancelled || self.cancel.is_cancelled() => {
                    break;
                }
                Err(err) => {
                    error!(error = %err, "Error reading message from broker");
                    report.read_failures += 1;
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(READ_FAILURE_PAUSE) => continue,
                    }
                }
            };

            match self.process(&payload).await {
                Some(ApplyOutcome::Applied { .. }) => report.applied += 1,
                Some(ApplyOutcome::Skipped { .. }) => report.skipped += 1,
                Some(ApplyOutcome::Exhausted { .. }) => report.exhausted += 1,
                Some(ApplyOutcome::Cancelled { .. }) => break,
                None => report.malformed += 1,
            }
        }

        info!(?report, "Message processor shutting down");
        report
    }

    /// Decode and apply one payload; `None` means the payload was dropped as
    /// malformed.
    pub async fn process(&self, payload: &[u8]) -> Option<ApplyOutcome> {
        let envelope = match Envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(error = %err, bytes = payload.len(), "Error decoding message, dropping");
                return None;
            }
        };

        info!(id = envelope.id, "Processing message");
        let outcome =
            apply_with_retry(self.store.as_ref(), envelope.id, self.policy, &self.cancel).await;

        match &outcome {
            ApplyOutcome::Applied { attempts } => {
                info!(id = envelope.id, attempts, "Successfully processed message");
            }
            ApplyOutcome::Skipped { kind, .. } => {
                warn!(id = envelope.id, %kind, "Message abandoned without retry");
            }
            ApplyOutcome::Exhausted { .. } | ApplyOutcome::Cancelled { .. } => {}
        }

        Some(outcome)
    }
}
