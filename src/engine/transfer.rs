// Transfer Engine - Custody change plus wallet settlement as one atomic unit
//
// Each attempt reads the package, both parties and the contract with their
// versions, validates everything, then commits all four records in a single
// batch. A version conflict means someone else wrote first: re-read and try
// again, up to `max_retries` times.

use crate::engine::{TransferKind, TransferReceipt, TransferRequest};
use crate::events::{EventQueue, OwnershipChanged};
use crate::model::{
    Contract, ContractId, ContractStatus, PackageId, Package, Participant, ParticipantId, Role,
};
use crate::storage::{self, LedgerStore, Put, RecordKey, RecordKind, StoreError, Versioned};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Configuration for the transfer engine
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Extra attempts after a version conflict before giving up with `Busy`
    pub max_retries: u32,
    /// Backoff per attempt in milliseconds (multiplied by the attempt number)
    pub backoff_base_ms: u64,
    /// Upper bound of random jitter added to each backoff, in milliseconds
    pub backoff_jitter_ms: u64,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_backoff_base_ms(mut self, ms: u64) -> Self {
        self.backoff_base_ms = ms;
        self
    }

    pub fn with_backoff_jitter_ms(mut self, ms: u64) -> Self {
        self.backoff_jitter_ms = ms;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.backoff_base_ms > 10_000 || self.backoff_jitter_ms > 10_000 {
            return Err(TransferError::InvalidConfig(
                "backoff must stay under 10s per attempt".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base_ms: 1,
            backoff_jitter_ms: 4,
        }
    }
}

// ============================================================================
// TRANSFER ERROR
// ============================================================================

/// Errors from a transfer. Apart from `Store`, nothing was written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Stale owner for package {package}: request names {expected}, current owner is {actual}")]
    StaleOwner {
        package: PackageId,
        expected: ParticipantId,
        actual: ParticipantId,
    },

    #[error("Participant {participant} is a {actual}, a {kind} transfer needs a {expected}")]
    WrongRole {
        participant: ParticipantId,
        kind: TransferKind,
        expected: Role,
        actual: Role,
    },

    #[error("Insufficient funds: {participant} holds {available}, transfer needs {required}")]
    InsufficientFunds {
        participant: ParticipantId,
        available: u64,
        required: u64,
    },

    #[error("Invalid state transition on contract {contract}: {from} -> {to}")]
    InvalidStateTransition {
        contract: ContractId,
        from: ContractStatus,
        to: ContractStatus,
    },

    #[error("Contract {contract} names {expected} as {role}, not {actual}")]
    CounterpartyMismatch {
        contract: ContractId,
        role: Role,
        expected: ParticipantId,
        actual: ParticipantId,
    },

    #[error("Wallet of {participant} would overflow")]
    BalanceOverflow { participant: ParticipantId },

    #[error("Package {package} still contended after {attempts} attempts")]
    Busy { package: PackageId, attempts: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key } => TransferError::NotFound {
                kind: key.kind(),
                id: key.id().to_string(),
            },
            other => TransferError::Store(other),
        }
    }
}

// ============================================================================
// TRANSFER ENGINE
// ============================================================================

/// Everything one attempt wants to write, computed from a consistent read
struct Settlement {
    ops: Vec<Put>,
    event: OwnershipChanged,
    seller_wallet: u64,
    buyer_wallet: u64,
}

/// Executes ship, wholesale and retail transfers against a ledger store
pub struct TransferEngine<S: LedgerStore> {
    store: Arc<S>,
    events: EventQueue,
    config: EngineConfig,
}

impl<S: LedgerStore> TransferEngine<S> {
    /// Create an engine with the default config
    pub fn new(store: Arc<S>, events: EventQueue) -> Self {
        Self::with_config(store, events, EngineConfig::default())
    }

    pub fn with_config(store: Arc<S>, events: EventQueue, config: EngineConfig) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    /// Move a package to its next custodian and settle the face value
    ///
    /// The buyer pays, the seller is credited, the contract advances one
    /// stage, and an [`OwnershipChanged`] event is queued after commit.
    pub fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            debug!(
                package = %request.package(),
                kind = %request.kind(),
                attempt = attempts,
                "transfer attempt"
            );

            let settlement = self.plan(request)?;

            match self.store.commit_batch(settlement.ops) {
                Ok(_) => {
                    let event = settlement.event;
                    info!(
                        package = %event.package(),
                        from = %event.old_owner(),
                        to = %event.new_owner(),
                        status = %event.status(),
                        face_value = event.face_value(),
                        "transfer committed"
                    );

                    let event_queued = match self.events.publish(event.clone()) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!("transfer committed but event not queued: {}", e);
                            false
                        }
                    };

                    return Ok(TransferReceipt::new(
                        event,
                        settlement.seller_wallet,
                        settlement.buyer_wallet,
                        attempts,
                        event_queued,
                    ));
                }
                Err(e) if e.is_conflict() => {
                    if attempts > self.config.max_retries {
                        warn!(package = %request.package(), attempts, "giving up on contended transfer");
                        return Err(TransferError::Busy {
                            package: request.package().clone(),
                            attempts,
                        });
                    }
                    warn!(package = %request.package(), attempt = attempts, "{}, retrying", e);
                    storage::backoff(
                        attempts,
                        self.config.backoff_base_ms,
                        self.config.backoff_jitter_ms,
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read current state and compute the batch. Fails before any write.
    fn plan(&self, request: &TransferRequest) -> Result<Settlement, TransferError> {
        let kind = request.kind();
        let target = kind.target_status();

        let package: Versioned<Package> = self.store.fetch(&RecordKey::package(request.package()))?;
        if package.record.owner() != request.from_owner() {
            return Err(TransferError::StaleOwner {
                package: request.package().clone(),
                expected: request.from_owner().clone(),
                actual: package.record.owner().clone(),
            });
        }

        let seller = self.fetch_party(request.from_owner(), kind.seller_role(), kind)?;
        let buyer = self.fetch_party(request.to_owner(), kind.buyer_role(), kind)?;

        let contract_id = ContractId::for_package(request.package());
        let existing: Option<Versioned<Contract>> =
            self.store.fetch_optional(&RecordKey::contract(&contract_id))?;

        let (mut contract, contract_version) = match (kind, existing) {
            (TransferKind::Ship, None) => {
                let mut contract = Contract::new(
                    request.package().clone(),
                    seller.record.id().clone(),
                    buyer.record.id().clone(),
                    request.timestamp(),
                );
                // Designated parties must exist with the role of their leg
                if let Some(w) = request.wholesaleperson() {
                    self.fetch_party(w, Role::Wholesaleperson, kind)?;
                    contract = contract.with_wholesaleperson(w.clone());
                }
                if let Some(r) = request.retailer() {
                    self.fetch_party(r, Role::Retailer, kind)?;
                    contract = contract.with_retailer(r.clone());
                }
                (contract, 0)
            }
            (TransferKind::Ship, Some(found)) => {
                return Err(TransferError::InvalidStateTransition {
                    contract: contract_id,
                    from: found.record.status(),
                    to: target,
                });
            }
            (_, None) => {
                return Err(TransferError::NotFound {
                    kind: RecordKind::Contract,
                    id: contract_id.to_string(),
                });
            }
            (_, Some(found)) => (found.record, found.version),
        };

        if let Err(current) = contract.advance(target) {
            return Err(TransferError::InvalidStateTransition {
                contract: contract_id,
                from: current,
                to: target,
            });
        }

        Self::bind_counterparty(&mut contract, kind, request.to_owner())?;

        let amount = request.face_value().unwrap_or(package.record.face_value());

        let mut buyer_record = buyer.record;
        let available = buyer_record.wallet();
        let buyer_wallet = buyer_record
            .debit(amount)
            .ok_or_else(|| TransferError::InsufficientFunds {
                participant: request.to_owner().clone(),
                available,
                required: amount,
            })?;

        let mut seller_record = seller.record;
        let seller_wallet = seller_record
            .credit(amount)
            .ok_or_else(|| TransferError::BalanceOverflow {
                participant: request.from_owner().clone(),
            })?;

        let mut package_record = package.record;
        package_record.set_owner(request.to_owner().clone());

        let event = OwnershipChanged::new(
            request.package().clone(),
            contract_id,
            request.from_owner().clone(),
            request.to_owner().clone(),
            kind,
            target,
            amount,
            request.timestamp(),
        );

        let ops = vec![
            Put::new(package_record, package.version),
            Put::new(seller_record, seller.version),
            Put::new(buyer_record, buyer.version),
            Put::new(contract, contract_version),
        ];

        Ok(Settlement {
            ops,
            event,
            seller_wallet,
            buyer_wallet,
        })
    }

    fn fetch_party(
        &self,
        id: &ParticipantId,
        expected: Role,
        kind: TransferKind,
    ) -> Result<Versioned<Participant>, TransferError> {
        let party: Versioned<Participant> = self.store.fetch(&RecordKey::participant(id))?;
        if party.record.role() != expected {
            return Err(TransferError::WrongRole {
                participant: id.clone(),
                kind,
                expected,
                actual: party.record.role(),
            });
        }
        Ok(party)
    }

    /// Check the buyer against the party the contract designated for this
    /// leg, or record the buyer if none was designated
    fn bind_counterparty(
        contract: &mut Contract,
        kind: TransferKind,
        buyer: &ParticipantId,
    ) -> Result<(), TransferError> {
        let designated = match kind {
            TransferKind::Ship => return Ok(()),
            TransferKind::Wholesale => contract.wholesaleperson().cloned(),
            TransferKind::Retail => contract.retailer().cloned(),
        };

        match designated {
            Some(expected) if &expected != buyer => Err(TransferError::CounterpartyMismatch {
                contract: contract.id().clone(),
                role: kind.buyer_role(),
                expected,
                actual: buyer.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                match kind {
                    TransferKind::Wholesale => contract.set_wholesaleperson(buyer.clone()),
                    TransferKind::Retail => contract.set_retailer(buyer.clone()),
                    TransferKind::Ship => {}
                }
                Ok(())
            }
        }
    }
}
