use crate::engine::TransferKind;
use crate::model::{ContractId, ContractStatus, PackageId, ParticipantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emitted once for every committed custody transfer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipChanged {
    package: PackageId,
    contract: ContractId,
    old_owner: ParticipantId,
    new_owner: ParticipantId,
    kind: TransferKind,
    status: ContractStatus,
    face_value: u64,
    timestamp: DateTime<Utc>,
}

impl OwnershipChanged {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        package: PackageId,
        contract: ContractId,
        old_owner: ParticipantId,
        new_owner: ParticipantId,
        kind: TransferKind,
        status: ContractStatus,
        face_value: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            package,
            contract,
            old_owner,
            new_owner,
            kind,
            status,
            face_value,
            timestamp,
        }
    }

    pub fn package(&self) -> &PackageId {
        &self.package
    }

    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    pub fn old_owner(&self) -> &ParticipantId {
        &self.old_owner
    }

    pub fn new_owner(&self) -> &ParticipantId {
        &self.new_owner
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// Contract status after the transfer
    pub fn status(&self) -> ContractStatus {
        self.status
    }

    pub fn face_value(&self) -> u64 {
        self.face_value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
