// Stored records - the typed values the ledger keeps under versioned keys

use crate::model::{
    Contract, ContractId, Package, PackageId, Participant, ParticipantId, SensorHistory,
};
use crate::storage::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of record, which also names its key namespace
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Package,
    Participant,
    Contract,
    History,
}

impl RecordKind {
    /// Key prefix for this kind, including the separator
    pub fn prefix(&self) -> &'static str {
        match self {
            RecordKind::Package => "package:",
            RecordKind::Participant => "participant:",
            RecordKind::Contract => "contract:",
            RecordKind::History => "history:",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Package => "package",
            RecordKind::Participant => "participant",
            RecordKind::Contract => "contract",
            RecordKind::History => "sensor history",
        };
        f.write_str(name)
    }
}

/// Address of a record in the store
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordKey {
    kind: RecordKind,
    id: String,
}

impl RecordKey {
    pub fn new(kind: RecordKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn package(id: &PackageId) -> Self {
        Self::new(RecordKind::Package, id.as_str())
    }

    pub fn participant(id: &ParticipantId) -> Self {
        Self::new(RecordKind::Participant, id.as_str())
    }

    pub fn contract(id: &ContractId) -> Self {
        Self::new(RecordKind::Contract, id.as_str())
    }

    /// Sensor history is keyed by the package it belongs to
    pub fn history(package: &PackageId) -> Self {
        Self::new(RecordKind::History, package.as_str())
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw key bytes: `<prefix><id>`
    pub fn to_bytes(&self) -> Vec<u8> {
        [self.kind.prefix().as_bytes(), self.id.as_bytes()].concat()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.id)
    }
}

/// Any record the ledger stores
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Package(Package),
    Participant(Participant),
    Contract(Contract),
    History(SensorHistory),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Package(_) => RecordKind::Package,
            Record::Participant(_) => RecordKind::Participant,
            Record::Contract(_) => RecordKind::Contract,
            Record::History(_) => RecordKind::History,
        }
    }

    pub fn key(&self) -> RecordKey {
        match self {
            Record::Package(p) => RecordKey::package(p.id()),
            Record::Participant(p) => RecordKey::participant(p.id()),
            Record::Contract(c) => RecordKey::contract(c.id()),
            Record::History(h) => RecordKey::history(h.package()),
        }
    }
}

impl From<Package> for Record {
    fn from(package: Package) -> Self {
        Record::Package(package)
    }
}

impl From<Participant> for Record {
    fn from(participant: Participant) -> Self {
        Record::Participant(participant)
    }
}

impl From<Contract> for Record {
    fn from(contract: Contract) -> Self {
        Record::Contract(contract)
    }
}

impl From<SensorHistory> for Record {
    fn from(history: SensorHistory) -> Self {
        Record::History(history)
    }
}

/// Typed view over [`Record`] variants
pub trait TypedRecord: Sized + Into<Record> {
    const KIND: RecordKind;

    fn from_record(record: Record) -> Option<Self>;
}

impl TypedRecord for Package {
    const KIND: RecordKind = RecordKind::Package;

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Package(p) => Some(p),
            _ => None,
        }
    }
}

impl TypedRecord for Participant {
    const KIND: RecordKind = RecordKind::Participant;

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Participant(p) => Some(p),
            _ => None,
        }
    }
}

impl TypedRecord for Contract {
    const KIND: RecordKind = RecordKind::Contract;

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Contract(c) => Some(c),
            _ => None,
        }
    }
}

impl TypedRecord for SensorHistory {
    const KIND: RecordKind = RecordKind::History;

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::History(h) => Some(h),
            _ => None,
        }
    }
}

/// A record together with the version it was stored at
///
/// Versions start at 1 and grow by one on every write. Version 0 is never
/// stored; as an expected version it means "must not exist yet".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

impl<T> Versioned<T> {
    pub fn new(version: u64, record: T) -> Self {
        Self { version, record }
    }

    pub fn into_inner(self) -> T {
        self.record
    }
}

impl Versioned<Record> {
    /// Narrow to a typed record, failing if the stored kind differs
    pub fn into_typed<T: TypedRecord>(self, key: &RecordKey) -> Result<Versioned<T>, StoreError> {
        let version = self.version;
        T::from_record(self.record)
            .map(|record| Versioned::new(version, record))
            .ok_or_else(|| StoreError::KindMismatch {
                key: key.clone(),
                expected: T::KIND,
            })
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        postcard::to_allocvec(self).map_err(|e| StoreError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
    }
}

/// One write in a batch: store `record` if its current version is `expected_version`
#[derive(Clone, Debug)]
pub struct Put {
    record: Record,
    expected_version: u64,
}

impl Put {
    pub fn new(record: impl Into<Record>, expected_version: u64) -> Self {
        Self {
            record: record.into(),
            expected_version,
        }
    }

    /// A put that only succeeds if the key is absent
    pub fn create(record: impl Into<Record>) -> Self {
        Self::new(record, 0)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn key(&self) -> RecordKey {
        self.record.key()
    }

    pub fn expected_version(&self) -> u64 {
        self.expected_version
    }

    /// Version the record will carry once committed
    pub fn next_version(&self) -> u64 {
        self.expected_version + 1
    }
}
