// Model module - THE RECORDS
// Packages, participants, contracts and the sensor readings attached to packages

mod contract;
mod ids;
mod package;
mod participant;
mod reading;

pub use contract::{Contract, ContractStatus};
pub use ids::{ContractId, PackageId, ParticipantId};
pub use package::Package;
pub use participant::{Address, Participant, Role};
pub use reading::{Measurement, ReadingKind, SensorHistory, SensorReading};
