// Storage module - PERSISTENCE
// Versioned records with optimistic concurrency, persisted using sled

mod record;
mod retry;
mod store;

pub use record::{Put, Record, RecordKey, RecordKind, TypedRecord, Versioned};
pub(crate) use retry::backoff;
pub use store::{LedgerStore, SledLedger, StorageStats, StoreError};
