// Ledger store - versioned key-value storage using sled
//
// Every record carries a version. Writes name the version they expect to
// replace; a stale expectation fails with `Conflict` instead of overwriting.
// Batches are applied inside a single sled transaction: all or nothing.

use crate::storage::record::{Put, Record, RecordKey, RecordKind, TypedRecord, Versioned};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors from storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {key}")]
    NotFound { key: RecordKey },

    #[error("Version conflict on {key}: expected {expected}, found {actual}")]
    Conflict {
        key: RecordKey,
        expected: u64,
        actual: u64,
    },

    #[error("Batch writes {0} more than once")]
    DuplicateKey(RecordKey),

    #[error("Record {key} is not a {expected}")]
    KindMismatch { key: RecordKey, expected: RecordKind },

    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of records in the database
    pub key_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Port to the versioned record store
///
/// Handlers receive the store explicitly; nothing reaches for a global registry.
pub trait LedgerStore: Send + Sync {
    /// Read a record and the version it is stored at
    fn get(&self, key: &RecordKey) -> Result<Versioned<Record>, StoreError>;

    /// Apply every put or none of them. Returns the new version of each put,
    /// in order.
    fn commit_batch(&self, ops: Vec<Put>) -> Result<Vec<u64>, StoreError>;

    /// List every record of one kind
    fn scan(&self, kind: RecordKind) -> Result<Vec<Versioned<Record>>, StoreError>;

    /// Write a single record if it is still at `expected_version`
    fn put(&self, record: Record, expected_version: u64) -> Result<u64, StoreError> {
        let versions = self.commit_batch(vec![Put::new(record, expected_version)])?;
        versions
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::DatabaseError("empty commit result".to_string()))
    }

    /// Read a record as its concrete type
    fn fetch<T: TypedRecord>(&self, key: &RecordKey) -> Result<Versioned<T>, StoreError>
    where
        Self: Sized,
    {
        self.get(key)?.into_typed(key)
    }

    /// Like [`fetch`](LedgerStore::fetch), but absent records are `None`
    fn fetch_optional<T: TypedRecord>(
        &self,
        key: &RecordKey,
    ) -> Result<Option<Versioned<T>>, StoreError>
    where
        Self: Sized,
    {
        match self.fetch(key) {
            Ok(found) => Ok(Some(found)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A put with its key and value already encoded
struct PreparedPut {
    key: RecordKey,
    key_bytes: Vec<u8>,
    value: Vec<u8>,
    expected: u64,
}

/// Versioned record store backed by sled
///
/// Uses sled for crash-safe, embedded storage.
/// All writes are atomic and durable after flush.
pub struct SledLedger {
    db: sled::Db,
}

impl SledLedger {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Open a throwaway store that is deleted on drop
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            key_count: self.db.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    fn prepare(ops: Vec<Put>) -> Result<Vec<PreparedPut>, StoreError> {
        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(ops.len());

        for op in ops {
            let key = op.key();
            if !seen.insert(key.clone()) {
                return Err(StoreError::DuplicateKey(key));
            }
            let next = op.next_version();
            let expected = op.expected_version();
            let value = Versioned::new(next, op.record().clone()).to_bytes()?;
            prepared.push(PreparedPut {
                key_bytes: key.to_bytes(),
                key,
                value,
                expected,
            });
        }

        Ok(prepared)
    }
}

impl LedgerStore for SledLedger {
    fn get(&self, key: &RecordKey) -> Result<Versioned<Record>, StoreError> {
        match self.db.get(key.to_bytes())? {
            Some(bytes) => Versioned::from_bytes(&bytes),
            None => Err(StoreError::NotFound { key: key.clone() }),
        }
    }

    fn commit_batch(&self, ops: Vec<Put>) -> Result<Vec<u64>, StoreError> {
        let prepared = Self::prepare(ops)?;

        // sled re-runs the closure when it loses a race with another
        // transaction, so the version checks always see committed state.
        let result = self.db.transaction(|tx| {
            for op in &prepared {
                let actual = match tx.get(&op.key_bytes)? {
                    Some(bytes) => Versioned::from_bytes(&bytes)
                        .map_err(ConflictableTransactionError::Abort)?
                        .version,
                    None => 0,
                };
                if actual != op.expected {
                    return Err(ConflictableTransactionError::Abort(StoreError::Conflict {
                        key: op.key.clone(),
                        expected: op.expected,
                        actual,
                    }));
                }
                tx.insert(op.key_bytes.as_slice(), op.value.as_slice())?;
            }
            Ok(())
        });

        match result {
            Ok(()) => Ok(prepared.iter().map(|op| op.expected + 1).collect()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    fn scan(&self, kind: RecordKind) -> Result<Vec<Versioned<Record>>, StoreError> {
        let mut records = Vec::new();
        for result in self.db.scan_prefix(kind.prefix().as_bytes()) {
            let (_, value) = result?;
            records.push(Versioned::from_bytes(&value)?);
        }
        Ok(records)
    }
}
