//! In-process record store.
//!
//! Holds every record in an id-keyed map behind one async `RwLock`, so each
//! read sees a single consistent state. Nothing survives the process.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{MessageStore, Record, Statistics};
use crate::utils::{Error, Result};
use crate::validation::MessageValidator;

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    records: BTreeMap<i64, Record>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    validator: MessageValidator,
}

impl MemoryStore {
    pub fn new(validator: MessageValidator) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            validator,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, content: &str) -> Result<Record> {
        self.validator
            .validate_content(content)
            .map_err(|e| e.into_error("create"))?;

        let mut inner = self.inner.write().await;
        let id = inner.last_id + 1;
        if inner.records.contains_key(&id) {
            return Err(Error::duplicate_entry(
                "create",
                format!("message {id} already exists"),
            ));
        }

        let record = Record::new(id, content, Utc::now());
        inner.last_id = id;
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> Result<Record> {
        self.validator
            .validate_id(id)
            .map_err(|e| e.into_error("get_by_id"))?;

        self.inner
            .read()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("get_by_id", format!("message {id} does not exist")))
    }

    async fn set_processed(&self, id: i64, processed: bool) -> Result<()> {
        self.validator
            .validate_id(id)
            .map_err(|e| e.into_error("set_processed"))?;

        let mut inner = self.inner.write().await;
        let record = inner.records.get_mut(&id).ok_or_else(|| {
            Error::not_found("set_processed", format!("message {id} does not exist"))
        })?;
        record.mark(processed, Utc::now());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        let inner = self.inner.read().await;
        let mut listed: Vec<Record> = inner.records.values().cloned().collect();
        listed.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(listed)
    }

    async fn statistics(&self) -> Result<Statistics> {
        let inner = self.inner.read().await;
        Ok(Statistics::tally(
            inner.records.values().map(|record| record.processed),
        ))
    }
}
