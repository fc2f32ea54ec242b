use crate::model::{Address, Package, PackageId, Participant, ParticipantId, Role};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur when building a record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Missing id: record id is required")]
    MissingId,

    #[error("Missing owner: package owner is required")]
    MissingOwner,

    #[error("Missing role: participant role is required")]
    MissingRole,

    #[error("Invalid field: {0}")]
    InvalidField(String),
}

/// Builder for new packages, filled with the onboarding defaults
pub struct PackageBuilder {
    id: Option<PackageId>,
    shipment_id: String,
    owner: Option<ParticipantId>,
    face_value: u64,
    unit_count: u32,
    mean_temperature: f64,
    expiry_date: Option<NaiveDate>,
}

impl PackageBuilder {
    pub const DEFAULT_SHIPMENT_ID: &'static str = "314f";
    pub const DEFAULT_FACE_VALUE: u64 = 500;
    pub const DEFAULT_UNIT_COUNT: u32 = 5000;
    pub const DEFAULT_MEAN_TEMPERATURE: f64 = 5.0;

    pub fn new() -> Self {
        Self {
            id: None,
            shipment_id: Self::DEFAULT_SHIPMENT_ID.to_string(),
            owner: None,
            face_value: Self::DEFAULT_FACE_VALUE,
            unit_count: Self::DEFAULT_UNIT_COUNT,
            mean_temperature: Self::DEFAULT_MEAN_TEMPERATURE,
            expiry_date: None,
        }
    }

    /// Set the package id (required)
    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the owning manufacturer (required)
    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn shipment_id(mut self, shipment_id: &str) -> Self {
        self.shipment_id = shipment_id.to_string();
        self
    }

    pub fn face_value(mut self, face_value: u64) -> Self {
        self.face_value = face_value;
        self
    }

    pub fn unit_count(mut self, unit_count: u32) -> Self {
        self.unit_count = unit_count;
        self
    }

    pub fn mean_temperature(mut self, celsius: f64) -> Self {
        self.mean_temperature = celsius;
        self
    }

    pub fn expiry_date(mut self, date: NaiveDate) -> Self {
        self.expiry_date = Some(date);
        self
    }

    pub fn build(self) -> Result<Package, BuildError> {
        let id = self.id.ok_or(BuildError::MissingId)?;
        let owner = self.owner.ok_or(BuildError::MissingOwner)?;

        if id.as_str().is_empty() {
            return Err(BuildError::MissingId);
        }
        if !self.mean_temperature.is_finite() {
            return Err(BuildError::InvalidField(
                "mean temperature must be finite".to_string(),
            ));
        }

        Ok(Package::new(
            id,
            self.shipment_id,
            owner,
            self.face_value,
            self.unit_count,
            self.mean_temperature,
            self.expiry_date,
        ))
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for new participants
pub struct ParticipantBuilder {
    id: Option<ParticipantId>,
    role: Option<Role>,
    first_name: String,
    last_name: String,
    address: Address,
    wallet: u64,
}

impl ParticipantBuilder {
    pub const DEFAULT_WALLET: u64 = 2000;

    pub fn new() -> Self {
        Self {
            id: None,
            role: None,
            first_name: String::new(),
            last_name: String::new(),
            address: Address::default(),
            wallet: Self::DEFAULT_WALLET,
        }
    }

    /// Set the participant id (required)
    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the role (required)
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn name(mut self, first: &str, last: &str) -> Self {
        self.first_name = first.to_string();
        self.last_name = last.to_string();
        self
    }

    pub fn address(mut self, city: &str, zip: &str, state: &str) -> Self {
        self.address = Address {
            city: city.to_string(),
            zip: zip.to_string(),
            state: state.to_string(),
        };
        self
    }

    pub fn wallet(mut self, wallet: u64) -> Self {
        self.wallet = wallet;
        self
    }

    pub fn build(self) -> Result<Participant, BuildError> {
        let id = self.id.ok_or(BuildError::MissingId)?;
        let role = self.role.ok_or(BuildError::MissingRole)?;

        if id.as_str().is_empty() {
            return Err(BuildError::MissingId);
        }

        Ok(Participant::new(
            id,
            role,
            self.first_name,
            self.last_name,
            self.address,
            self.wallet,
        ))
    }
}

impl Default for ParticipantBuilder {
    fn default() -> Self {
        Self::new()
    }
}
