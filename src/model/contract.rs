// Shipment contract - records which stage of the chain a package has reached

use crate::model::{ContractId, PackageId, ParticipantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a shipment contract
///
/// Moves strictly forward: CREATED -> SHIPPED -> WHOLESALE -> RETAIL_STORE.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    Created,
    Shipped,
    Wholesale,
    RetailStore,
}

impl Default for ContractStatus {
    fn default() -> Self {
        Self::Created
    }
}

impl ContractStatus {
    /// The only status this one may advance to
    pub fn next(&self) -> Option<ContractStatus> {
        match self {
            Self::Created => Some(Self::Shipped),
            Self::Shipped => Some(Self::Wholesale),
            Self::Wholesale => Some(Self::RetailStore),
            Self::RetailStore => None,
        }
    }

    /// Check if transition to another status is valid
    pub fn can_transition_to(&self, target: &ContractStatus) -> bool {
        self.next().as_ref() == Some(target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RetailStore)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "CREATED",
            Self::Shipped => "SHIPPED",
            Self::Wholesale => "WHOLESALE",
            Self::RetailStore => "RETAIL_STORE",
        };
        f.write_str(name)
    }
}

/// The shipment agreement between the four parties handling a package
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    id: ContractId,
    package: PackageId,
    manufacturer: ParticipantId,
    shipper: ParticipantId,
    wholesaleperson: Option<ParticipantId>,
    retailer: Option<ParticipantId>,
    status: ContractStatus,
    start_time: DateTime<Utc>,
}

impl Contract {
    /// Draw up a contract at CREATED for a package leaving its manufacturer
    pub fn new(
        package: PackageId,
        manufacturer: ParticipantId,
        shipper: ParticipantId,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ContractId::for_package(&package),
            package,
            manufacturer,
            shipper,
            wholesaleperson: None,
            retailer: None,
            status: ContractStatus::Created,
            start_time,
        }
    }

    /// Designate the wholesaleperson expected on the wholesale leg
    pub fn with_wholesaleperson(mut self, id: ParticipantId) -> Self {
        self.wholesaleperson = Some(id);
        self
    }

    /// Designate the retailer expected on the retail leg
    pub fn with_retailer(mut self, id: ParticipantId) -> Self {
        self.retailer = Some(id);
        self
    }

    pub fn id(&self) -> &ContractId {
        &self.id
    }

    pub fn package(&self) -> &PackageId {
        &self.package
    }

    pub fn manufacturer(&self) -> &ParticipantId {
        &self.manufacturer
    }

    pub fn shipper(&self) -> &ParticipantId {
        &self.shipper
    }

    pub fn wholesaleperson(&self) -> Option<&ParticipantId> {
        self.wholesaleperson.as_ref()
    }

    pub fn retailer(&self) -> Option<&ParticipantId> {
        self.retailer.as_ref()
    }

    pub fn status(&self) -> ContractStatus {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Advance to `target`. Returns the previous status, or `Err(current)` when
    /// `target` is not the immediate successor.
    pub(crate) fn advance(&mut self, target: ContractStatus) -> Result<ContractStatus, ContractStatus> {
        if !self.status.can_transition_to(&target) {
            return Err(self.status);
        }
        let previous = self.status;
        self.status = target;
        Ok(previous)
    }

    pub(crate) fn set_wholesaleperson(&mut self, id: ParticipantId) {
        self.wholesaleperson = Some(id);
    }

    pub(crate) fn set_retailer(&mut self, id: ParticipantId) {
        self.retailer = Some(id);
    }
}
