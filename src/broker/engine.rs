//! Broker engine
//!
//! In-process broker implementing both [`Producer`] and [`Consumer`]:
//! - topics are created on first publish or consume
//! - each topic is a FIFO queue; one successful consume takes one payload
//! - `close()` rejects further publishes and, once a topic is drained, fails
//!   waiting consumers with `Unavailable`
//!
//! Concurrency and usage notes:
//! - The topic map sits behind a synchronous lock that is only held to look
//!   up or create a topic, never across an await point.
//! - Waiting consumers hold their topic's receiver lock while blocked, so
//!   consumers of one topic are served one at a time.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::topic::{SharedReceiver, Topic};
use super::{Consumer, Producer};
use crate::utils::{Error, Result};

#[derive(Debug, Default)]
pub struct Broker {
    topics: Mutex<HashMap<String, Topic>>,
    closed: CancellationToken,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting publishes and release waiting consumers once drained.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.topics
            .lock()
            .map(|topics| topics.contains_key(name))
            .unwrap_or(false)
    }

    /// Run `f` against the topic named `name`, creating it if needed.
    fn with_topic<T>(
        &self,
        op: &'static str,
        name: &str,
        f: impl FnOnce(&Topic) -> T,
    ) -> Result<T> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| Error::unknown(op, "topic registry lock poisoned"))?;
        let topic = topics
            .entry(name.to_string())
            .or_insert_with(|| Topic::new(name));
        Ok(f(topic))
    }

    fn receiver(&self, name: &str) -> Result<SharedReceiver> {
        self.with_topic("consume", name, Topic::receiver)
    }
}

#[async_trait]
impl Producer for Broker {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::unavailable("publish", "broker is closed"));
        }

        self.with_topic("publish", channel, |topic| topic.push(payload))?
            .map_err(|_| {
                warn!(channel, "Topic receiver closed, dropping payload");
                Error::unavailable("publish", format!("topic '{channel}' is closed"))
            })?;

        debug!(channel, "Published payload");
        Ok(())
    }
}

#[async_trait]
impl Consumer for Broker {
    async fn consume(&self, channel: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let receiver = self.receiver(channel)?;

        let mut receiver = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::cancelled("consume")),
            guard = receiver.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::cancelled("consume")),
            payload = receiver.recv() => payload.ok_or_else(|| {
                Error::unavailable("consume", format!("topic '{channel}' is closed"))
            }),
            _ = self.closed.cancelled() => {
                Err(Error::unavailable("consume", "broker is closed"))
            }
        }
    }
}
