use crate::model::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a participant in the supply chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Manufacturer,
    Shipper,
    Wholesaleperson,
    Retailer,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Manufacturer,
        Role::Shipper,
        Role::Wholesaleperson,
        Role::Retailer,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Manufacturer => "manufacturer",
            Role::Shipper => "shipper",
            Role::Wholesaleperson => "wholesaleperson",
            Role::Retailer => "retailer",
        };
        f.write_str(name)
    }
}

/// Postal address of a participant
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub zip: String,
    pub state: String,
}

/// A party that can hold packages and a wallet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    id: ParticipantId,
    role: Role,
    first_name: String,
    last_name: String,
    address: Address,
    /// Unsigned, so a negative balance is unrepresentable
    wallet: u64,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        role: Role,
        first_name: String,
        last_name: String,
        address: Address,
        wallet: u64,
    ) -> Self {
        Self {
            id,
            role,
            first_name,
            last_name,
            address,
            wallet,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn wallet(&self) -> u64 {
        self.wallet
    }

    /// Add funds, returning the new balance or `None` on overflow
    pub(crate) fn credit(&mut self, amount: u64) -> Option<u64> {
        self.wallet = self.wallet.checked_add(amount)?;
        Some(self.wallet)
    }

    /// Remove funds, returning the new balance or `None` if the wallet cannot cover it
    pub(crate) fn debit(&mut self, amount: u64) -> Option<u64> {
        self.wallet = self.wallet.checked_sub(amount)?;
        Some(self.wallet)
    }
}
