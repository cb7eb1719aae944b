//! The `persistence` module is the durable record store: the status of record
//! for every submitted message.
//!
//! [`MessageStore`] is the capability set the relay depends on. Two backends
//! implement it:
//!
//! - [`SledStore`]: `sled` as an embedded, durable key-value store.
//! - [`MemoryStore`]: an in-process map, for tests and throwaway runs.
//!
//! Backends own their concurrency safety; callers share them behind an `Arc`.

pub mod memory_store;
pub mod sled_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::Result;

pub use memory_store::MemoryStore;
pub use sled_store::SledStore;

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub content: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub(crate) fn new(id: i64, content: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            content: content.to_string(),
            processed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the processed flag and bump `updated_at`, never below `created_at`.
    pub(crate) fn mark(&mut self, processed: bool, now: DateTime<Utc>) {
        self.processed = processed;
        self.updated_at = now.max(self.created_at);
    }
}

/// Message counts derived from the store at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "total_messages")]
    pub total: u64,
    #[serde(rename = "processed_messages")]
    pub processed: u64,
    #[serde(rename = "unprocessed_messages")]
    pub unprocessed: u64,
}

impl Statistics {
    /// Tally processed flags; `processed + unprocessed == total` by construction.
    pub fn tally<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        flags.into_iter().fold(Self::default(), |mut stats, processed| {
            stats.total += 1;
            if processed {
                stats.processed += 1;
            } else {
                stats.unprocessed += 1;
            }
            stats
        })
    }
}

/// Durable record store.
///
/// Failures are classified with the failing operation name: `create`,
/// `get_by_id`, `set_processed`, `list_all`, `statistics`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Validate `content`, assign a fresh id and timestamps, and persist.
    async fn create(&self, content: &str) -> Result<Record>;

    async fn get_by_id(&self, id: i64) -> Result<Record>;

    /// Idempotent; setting the same value again still bumps `updated_at`.
    async fn set_processed(&self, id: i64, processed: bool) -> Result<()>;

    /// Snapshot of every record, newest `created_at` first.
    async fn list_all(&self) -> Result<Vec<Record>>;

    async fn statistics(&self) -> Result<Statistics>;
}
