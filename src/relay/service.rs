//! Synchronous side of the relay: submit, mark processed, and read-only
//! projections over the store.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::broker::{Envelope, Producer};
use crate::persistence::{MessageStore, Record, Statistics};
use crate::utils::{Error, ErrorKind, Result};

/// Why a submit did not return an id.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Nothing was stored.
    #[error(transparent)]
    Rejected(Error),
    /// The record exists but was never queued, so it will not be processed
    /// automatically.
    #[error("message {id} stored but not queued for processing: {source}")]
    NotQueued { id: i64, source: Error },
}

impl SubmitError {
    /// Classification of the underlying failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmitError::Rejected(err) => err.kind(),
            SubmitError::NotQueued { source, .. } => source.kind(),
        }
    }
}

/// Entry point for inbound requests. Cheap to clone.
#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn MessageStore>,
    producer: Arc<dyn Producer>,
    channel: String,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        producer: Arc<dyn Producer>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            store,
            producer,
            channel: channel.into(),
        }
    }

    /// Store `content`, publish its envelope, and return the new id.
    ///
    /// Runs once with no retry. A failed publish is not retried because
    /// envelopes carry no idempotency key.
    pub async fn submit(&self, content: &str) -> std::result::Result<i64, SubmitError> {
        let record = self.store.create(content).await.map_err(|err| {
            error!(op = err.op(), kind = %err.kind(), error = %err, "Failed to store message");
            SubmitError::Rejected(err)
        })?;
        info!(id = record.id, "Stored message");

        let payload = Envelope::from(&record)
            .encode()
            .map_err(|source| SubmitError::NotQueued {
                id: record.id,
                source,
            })?;

        debug!(id = record.id, channel = %self.channel, "Publishing message");
        if let Err(source) = self.producer.publish(&self.channel, payload).await {
            error!(id = record.id, error = %source, "Failed to publish message");
            return Err(SubmitError::NotQueued {
                id: record.id,
                source,
            });
        }

        info!(id = record.id, "Queued message for processing");
        Ok(record.id)
    }

    /// Mark message `id` processed directly; idempotent.
    pub async fn mark_processed(&self, id: i64) -> Result<()> {
        self.store.set_processed(id, true).await?;
        info!(id, "Marked message processed");
        Ok(())
    }

    /// Counts re-derived from the store on every call.
    pub async fn statistics(&self) -> Result<Statistics> {
        self.store.statistics().await
    }

    pub async fn get_message(&self, id: i64) -> Result<Record> {
        self.store.get_by_id(id).await
    }

    /// Every message, newest first.
    pub async fn list_messages(&self) -> Result<Vec<Record>> {
        self.store.list_all().await
    }
}
