// Engine module - SETTLEMENT
// Atomic custody transfers with wallet settlement and optimistic retries

mod request;
mod transfer;

pub use request::{TransferKind, TransferReceipt, TransferRequest};
pub use transfer::{EngineConfig, TransferEngine, TransferError};
