//! The `broker` module is the client side of the message broker: an
//! append-only publish facet and a pull-based consume facet, each addressed by
//! channel (topic) name.
//!
//! Neither facet retries internally. A successful `consume` hands one payload
//! to exactly one caller; there is no acknowledgment or offset commit beyond
//! that read, so a payload read and then lost by its consumer is gone.
//!
//! Backends:
//! - [`Broker`]: in-process topics backed by unbounded queues.
//! - `kafka::KafkaProducer` / `kafka::KafkaConsumer` (feature `kafka`).

pub mod engine;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod message;
pub mod topic;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::utils::Result;

pub use engine::Broker;
pub use message::Envelope;

/// Publish facet. Fails with `Unavailable` on transport failure.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()>;
}

/// Consume facet.
///
/// Blocks until a payload is available. Fails with `Cancelled` when `cancel`
/// fires while waiting, and with `Unavailable` on transport failure.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn consume(&self, channel: &str, cancel: &CancellationToken) -> Result<Vec<u8>>;
}
