//! Supply-chain custody ledger
//!
//! Packages move manufacturer -> shipper -> wholesaleperson -> retailer. Each
//! hand-off is one atomic batch against a versioned store: the package owner,
//! both wallets and the shipment contract change together or not at all.
//! Committed transfers produce an ownership event that is delivered to
//! subscribers after the fact. Sensor readings are appended to each package's
//! history alongside.

pub mod engine;
pub mod events;
pub mod model;
pub mod registry;
pub mod sensor;
pub mod storage;

pub use engine::{TransferEngine, TransferError, TransferKind, TransferRequest};
pub use events::{EventEmitter, OwnershipChanged};
pub use sensor::SensorIngestor;
pub use storage::{LedgerStore, SledLedger};
