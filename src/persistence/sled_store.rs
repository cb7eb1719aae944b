//! Record store backed by `sled`
//!
//! Records live in the `messages` tree keyed by big-endian id, serialized as
//! JSON. A second tree, `messages_by_created_at`, holds one empty-valued key
//! per record made of the creation timestamp (microseconds) followed by the
//! id, so iterating it in reverse yields newest-first listings.
//!
//! Ids come from a `last_id` counter in the `meta` tree, bumped in the same
//! transaction that writes the record. They start at 1, stay dense, and are
//! never reused, even across restarts.

use async_trait::async_trait;
use chrono::Utc;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use tracing::debug;

use super::{MessageStore, Record, Statistics};
use crate::utils::{Error, Result};
use crate::validation::MessageValidator;

const RECORDS_TREE: &str = "messages";
const CREATED_AT_INDEX_TREE: &str = "messages_by_created_at";
const META_TREE: &str = "meta";
const LAST_ID_KEY: &[u8] = b"last_id";

/// Reasons a transaction body gives up.
#[derive(Debug)]
enum Abort {
    NotFound,
    Duplicate(i64),
    Corrupt(serde_json::Error),
    BadCounter,
    IdSpaceExhausted,
}

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    records: Tree,
    by_created_at: Tree,
    meta: Tree,
    validator: MessageValidator,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str, validator: MessageValidator) -> Result<Self> {
        let db = sled::open(path).map_err(|e| Error::from_sled("open", e))?;
        Self::with_db(db, validator)
    }

    /// Temporary database removed on drop.
    pub fn temporary(validator: MessageValidator) -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| Error::from_sled("open", e))?;
        Self::with_db(db, validator)
    }

    fn with_db(db: Db, validator: MessageValidator) -> Result<Self> {
        let records = db
            .open_tree(RECORDS_TREE)
            .map_err(|e| Error::from_sled("open", e))?;
        let by_created_at = db
            .open_tree(CREATED_AT_INDEX_TREE)
            .map_err(|e| Error::from_sled("open", e))?;
        let meta = db
            .open_tree(META_TREE)
            .map_err(|e| Error::from_sled("open", e))?;

        Ok(Self {
            db,
            records,
            by_created_at,
            meta,
            validator,
        })
    }

    /// Flush dirty pages to disk.
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| Error::from_sled("flush", e))?;
        Ok(())
    }

    fn decode(op: &'static str, bytes: &[u8]) -> Result<Record> {
        serde_json::from_slice(bytes).map_err(|e| Error::from_json(op, e))
    }
}

fn record_key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

fn index_key(record: &Record) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&record.created_at.timestamp_micros().to_be_bytes());
    key[8..].copy_from_slice(&record.id.to_be_bytes());
    key
}

/// Decode the stored `last_id`; a missing counter means no record was ever
/// created.
fn last_id(raw: Option<&[u8]>) -> std::result::Result<i64, Abort> {
    let Some(raw) = raw else {
        return Ok(0);
    };
    let bytes: [u8; 8] = raw.try_into().map_err(|_| Abort::BadCounter)?;
    Ok(i64::from_be_bytes(bytes))
}

fn id_from_index_key(key: &[u8]) -> Option<i64> {
    let id: [u8; 8] = key.get(8..16)?.try_into().ok()?;
    Some(i64::from_be_bytes(id))
}

fn classify(op: &'static str, id: i64, err: TransactionError<Abort>) -> Error {
    match err {
        TransactionError::Abort(Abort::NotFound) => {
            Error::not_found(op, format!("message {id} does not exist"))
        }
        TransactionError::Abort(Abort::Duplicate(id)) => {
            Error::duplicate_entry(op, format!("message {id} already exists"))
        }
        TransactionError::Abort(Abort::Corrupt(e)) => Error::from_json(op, e),
        TransactionError::Abort(Abort::BadCounter) => {
            Error::unknown(op, "malformed last_id counter")
        }
        TransactionError::Abort(Abort::IdSpaceExhausted) => {
            Error::unknown(op, "id space exhausted")
        }
        TransactionError::Storage(e) => Error::from_sled(op, e),
    }
}

#[async_trait]
impl MessageStore for SledStore {
    async fn create(&self, content: &str) -> Result<Record> {
        self.validator
            .validate_content(content)
            .map_err(|e| e.into_error("create"))?;

        let now = Utc::now();
        let record = (&self.records, &self.by_created_at, &self.meta)
            .transaction(|(records, by_created_at, meta)| {
                let last = last_id(meta.get(LAST_ID_KEY)?.as_deref())
                    .map_err(ConflictableTransactionError::Abort)?;
                let id = last
                    .checked_add(1)
                    .ok_or(ConflictableTransactionError::Abort(Abort::IdSpaceExhausted))?;

                let key = record_key(id);
                if records.get(key)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(Abort::Duplicate(id)));
                }

                let record = Record::new(id, content, now);
                let bytes = serde_json::to_vec(&record)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Corrupt(e)))?;
                records.insert(&key[..], bytes)?;
                by_created_at.insert(&index_key(&record)[..], &[] as &[u8])?;
                meta.insert(LAST_ID_KEY, &id.to_be_bytes()[..])?;
                Ok(record)
            })
            .map_err(|e| classify("create", 0, e))?;

        debug!(id = record.id, "Stored message");
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> Result<Record> {
        self.validator
            .validate_id(id)
            .map_err(|e| e.into_error("get_by_id"))?;

        match self
            .records
            .get(record_key(id))
            .map_err(|e| Error::from_sled("get_by_id", e))?
        {
            Some(bytes) => Self::decode("get_by_id", &bytes),
            None => Err(Error::not_found(
                "get_by_id",
                format!("message {id} does not exist"),
            )),
        }
    }

    async fn set_processed(&self, id: i64, processed: bool) -> Result<()> {
        self.validator
            .validate_id(id)
            .map_err(|e| e.into_error("set_processed"))?;

        let key = record_key(id);
        self.records
            .transaction(|records| {
                let Some(bytes) = records.get(key)? else {
                    return Err(ConflictableTransactionError::Abort(Abort::NotFound));
                };
                let mut record: Record = serde_json::from_slice(&bytes)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Corrupt(e)))?;
                record.mark(processed, Utc::now());
                let updated = serde_json::to_vec(&record)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Corrupt(e)))?;
                records.insert(&key[..], updated)?;
                Ok(())
            })
            .map_err(|e| classify("set_processed", id, e))
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        let mut listed = Vec::with_capacity(self.by_created_at.len());

        for entry in self.by_created_at.iter().rev() {
            let (key, _) = entry.map_err(|e| Error::from_sled("list_all", e))?;
            let Some(id) = id_from_index_key(&key) else {
                return Err(Error::unknown("list_all", "malformed creation-time index key"));
            };
            // A record written between the index scan and this read is skipped,
            // never half-read.
            if let Some(bytes) = self
                .records
                .get(record_key(id))
                .map_err(|e| Error::from_sled("list_all", e))?
            {
                listed.push(Self::decode("list_all", &bytes)?);
            }
        }

        Ok(listed)
    }

    async fn statistics(&self) -> Result<Statistics> {
        let mut flags = Vec::with_capacity(self.records.len());
        for entry in self.records.iter() {
            let (_, bytes) = entry.map_err(|e| Error::from_sled("statistics", e))?;
            flags.push(Self::decode("statistics", &bytes)?.processed);
        }
        Ok(Statistics::tally(flags))
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .field("validator", &self.validator)
            .finish()
    }
}
