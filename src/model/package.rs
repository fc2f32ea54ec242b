use crate::model::{PackageId, ParticipantId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A shipment batch moving through the supply chain
///
/// Sensor telemetry lives in a sibling [`SensorHistory`](crate::model::SensorHistory)
/// record so readings and custody changes never contend on the same version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Package {
    id: PackageId,
    shipment_id: String,
    owner: ParticipantId,
    face_value: u64,
    unit_count: u32,
    mean_temperature: f64,
    expiry_date: Option<NaiveDate>,
}

impl Package {
    pub fn new(
        id: PackageId,
        shipment_id: String,
        owner: ParticipantId,
        face_value: u64,
        unit_count: u32,
        mean_temperature: f64,
        expiry_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id,
            shipment_id,
            owner,
            face_value,
            unit_count,
            mean_temperature,
            expiry_date,
        }
    }

    pub fn id(&self) -> &PackageId {
        &self.id
    }

    pub fn shipment_id(&self) -> &str {
        &self.shipment_id
    }

    /// Current custodian
    pub fn owner(&self) -> &ParticipantId {
        &self.owner
    }

    pub fn face_value(&self) -> u64 {
        self.face_value
    }

    pub fn unit_count(&self) -> u32 {
        self.unit_count
    }

    pub fn mean_temperature(&self) -> f64 {
        self.mean_temperature
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    /// Hand the package to a new custodian
    pub(crate) fn set_owner(&mut self, owner: ParticipantId) {
        self.owner = owner;
    }
}
