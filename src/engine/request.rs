use crate::events::OwnershipChanged;
use crate::model::{ContractStatus, PackageId, ParticipantId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three custody legs of the supply chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferKind {
    /// Manufacturer -> shipper. Opens the contract.
    Ship,
    /// Shipper -> wholesaleperson
    Wholesale,
    /// Wholesaleperson -> retailer. Closes the contract.
    Retail,
}

impl TransferKind {
    /// Role the current owner must hold
    pub fn seller_role(&self) -> Role {
        match self {
            TransferKind::Ship => Role::Manufacturer,
            TransferKind::Wholesale => Role::Shipper,
            TransferKind::Retail => Role::Wholesaleperson,
        }
    }

    /// Role the new owner must hold
    pub fn buyer_role(&self) -> Role {
        match self {
            TransferKind::Ship => Role::Shipper,
            TransferKind::Wholesale => Role::Wholesaleperson,
            TransferKind::Retail => Role::Retailer,
        }
    }

    /// Contract status once this leg commits
    pub fn target_status(&self) -> ContractStatus {
        match self {
            TransferKind::Ship => ContractStatus::Shipped,
            TransferKind::Wholesale => ContractStatus::Wholesale,
            TransferKind::Retail => ContractStatus::RetailStore,
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferKind::Ship => "ship",
            TransferKind::Wholesale => "wholesale",
            TransferKind::Retail => "retail",
        };
        f.write_str(name)
    }
}

/// A request to move a package to its next custodian
#[derive(Clone, Debug)]
pub struct TransferRequest {
    kind: TransferKind,
    package: PackageId,
    from_owner: ParticipantId,
    to_owner: ParticipantId,
    face_value: Option<u64>,
    wholesaleperson: Option<ParticipantId>,
    retailer: Option<ParticipantId>,
    timestamp: DateTime<Utc>,
}

impl TransferRequest {
    pub fn new(
        kind: TransferKind,
        package: PackageId,
        from_owner: ParticipantId,
        to_owner: ParticipantId,
    ) -> Self {
        Self {
            kind,
            package,
            from_owner,
            to_owner,
            face_value: None,
            wholesaleperson: None,
            retailer: None,
            timestamp: Utc::now(),
        }
    }

    pub fn ship(package: &str, manufacturer: &str, shipper: &str) -> Self {
        Self::new(TransferKind::Ship, package.into(), manufacturer.into(), shipper.into())
    }

    pub fn wholesale(package: &str, shipper: &str, wholesaleperson: &str) -> Self {
        Self::new(TransferKind::Wholesale, package.into(), shipper.into(), wholesaleperson.into())
    }

    pub fn retail(package: &str, wholesaleperson: &str, retailer: &str) -> Self {
        Self::new(TransferKind::Retail, package.into(), wholesaleperson.into(), retailer.into())
    }

    /// Settle at this amount instead of the package's recorded face value
    pub fn with_face_value(mut self, face_value: u64) -> Self {
        self.face_value = Some(face_value);
        self
    }

    /// Name the wholesaleperson on the contract opened by a ship transfer
    pub fn with_wholesaleperson(mut self, id: &str) -> Self {
        self.wholesaleperson = Some(id.into());
        self
    }

    /// Name the retailer on the contract opened by a ship transfer
    pub fn with_retailer(mut self, id: &str) -> Self {
        self.retailer = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    pub fn package(&self) -> &PackageId {
        &self.package
    }

    pub fn from_owner(&self) -> &ParticipantId {
        &self.from_owner
    }

    pub fn to_owner(&self) -> &ParticipantId {
        &self.to_owner
    }

    pub fn face_value(&self) -> Option<u64> {
        self.face_value
    }

    pub fn wholesaleperson(&self) -> Option<&ParticipantId> {
        self.wholesaleperson.as_ref()
    }

    pub fn retailer(&self) -> Option<&ParticipantId> {
        self.retailer.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Outcome of a committed transfer
#[derive(Clone, Debug)]
pub struct TransferReceipt {
    event: OwnershipChanged,
    seller_wallet: u64,
    buyer_wallet: u64,
    attempts: u32,
    event_queued: bool,
}

impl TransferReceipt {
    pub(crate) fn new(
        event: OwnershipChanged,
        seller_wallet: u64,
        buyer_wallet: u64,
        attempts: u32,
        event_queued: bool,
    ) -> Self {
        Self {
            event,
            seller_wallet,
            buyer_wallet,
            attempts,
            event_queued,
        }
    }

    /// The ownership event produced by this transfer
    pub fn event(&self) -> &OwnershipChanged {
        &self.event
    }

    pub fn status(&self) -> ContractStatus {
        self.event.status()
    }

    /// Seller balance after settlement
    pub fn seller_wallet(&self) -> u64 {
        self.seller_wallet
    }

    /// Buyer balance after settlement
    pub fn buyer_wallet(&self) -> u64 {
        self.buyer_wallet
    }

    /// Read/compute/commit cycles used, including the successful one
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// False if the event could not be handed to the emitter
    pub fn event_queued(&self) -> bool {
        self.event_queued
    }
}
