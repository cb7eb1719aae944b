//! Queue envelope
//!
//! The payload published for every submitted message is the full record as
//! it was at creation time, serialized as JSON:
//! `{"id", "content", "processed", "created_at", "updated_at"}`.
//!
//! Consumers trust only `id`; the store is authoritative for everything else,
//! so decoding requires `id` and tolerates the other fields being absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persistence::Record;
use crate::utils::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: i64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::from_json("encode envelope", e))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            Error::invalid_input("decode envelope", format!("malformed payload: {e}"))
                .with_source(e)
        })
    }
}

impl From<&Record> for Envelope {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id,
            content: record.content.clone(),
            processed: record.processed,
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
        }
    }
}
