// Onboarding - creates records once and answers typed lookups
//
// Creation goes through create-only puts (expected version 0), so a second
// onboarding of the same id fails instead of resetting a wallet or owner.

use crate::model::{
    Contract, ContractId, Package, PackageId, Participant, ParticipantId, Role, SensorHistory,
};
use crate::registry::{BuildError, PackageBuilder, ParticipantBuilder};
use crate::storage::{LedgerStore, Put, Record, RecordKey, RecordKind, StoreError, TypedRecord, Versioned};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors from onboarding and lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Record already exists: {0}")]
    AlreadyExists(RecordKey),

    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Package {package} is owned by unknown participant {owner}")]
    UnknownOwner {
        package: PackageId,
        owner: ParticipantId,
    },

    #[error("{0} records are written by transfers and readings, not onboarded")]
    NotOnboardable(RecordKind),

    #[error("Build failed: {0}")]
    BuildFailed(#[from] BuildError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { key, expected: 0, .. } => RegistryError::AlreadyExists(key),
            StoreError::NotFound { key } => RegistryError::NotFound {
                kind: key.kind(),
                id: key.id().to_string(),
            },
            other => RegistryError::Store(other),
        }
    }
}

/// Typed access to the records of a ledger store
pub struct Registry<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Registry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create every record in one atomic batch. Fails if any already exists.
    /// Only packages and participants can be onboarded.
    pub fn add_all(&self, records: Vec<Record>) -> Result<Vec<u64>, RegistryError> {
        if let Some(record) = records
            .iter()
            .find(|r| matches!(r, Record::Contract(_) | Record::History(_)))
        {
            return Err(RegistryError::NotOnboardable(record.kind()));
        }

        let incoming: HashSet<ParticipantId> = records
            .iter()
            .filter_map(|r| match r {
                Record::Participant(p) => Some(p.id().clone()),
                _ => None,
            })
            .collect();

        for record in &records {
            if let Record::Package(package) = record {
                let owner = package.owner();
                if !incoming.contains(owner) && !self.exists(&RecordKey::participant(owner))? {
                    return Err(RegistryError::UnknownOwner {
                        package: package.id().clone(),
                        owner: owner.clone(),
                    });
                }
            }
        }

        let count = records.len();
        let versions = self
            .store
            .commit_batch(records.into_iter().map(Put::create).collect())?;
        info!(count, "records onboarded");
        Ok(versions)
    }

    /// Create a single record
    pub fn add(&self, record: impl Into<Record>) -> Result<u64, RegistryError> {
        let versions = self.add_all(vec![record.into()])?;
        Ok(versions.first().copied().unwrap_or(1))
    }

    pub fn package(&self, id: &PackageId) -> Result<Versioned<Package>, RegistryError> {
        Ok(self.store.fetch(&RecordKey::package(id))?)
    }

    pub fn participant(&self, id: &ParticipantId) -> Result<Versioned<Participant>, RegistryError> {
        Ok(self.store.fetch(&RecordKey::participant(id))?)
    }

    pub fn contract(&self, id: &ContractId) -> Result<Versioned<Contract>, RegistryError> {
        Ok(self.store.fetch(&RecordKey::contract(id))?)
    }

    /// The contract tracking a package, if it has shipped
    pub fn contract_for(&self, package: &PackageId) -> Result<Option<Versioned<Contract>>, RegistryError> {
        let key = RecordKey::contract(&ContractId::for_package(package));
        Ok(self.store.fetch_optional(&key)?)
    }

    /// Sensor history of a package, if any reading was recorded
    pub fn history(&self, package: &PackageId) -> Result<Option<Versioned<SensorHistory>>, RegistryError> {
        Ok(self.store.fetch_optional(&RecordKey::history(package))?)
    }

    pub fn packages(&self) -> Result<Vec<Package>, RegistryError> {
        self.list()
    }

    /// All participants, optionally only those holding `role`
    pub fn participants(&self, role: Option<Role>) -> Result<Vec<Participant>, RegistryError> {
        let all: Vec<Participant> = self.list()?;
        Ok(all
            .into_iter()
            .filter(|p| role.map_or(true, |r| p.role() == r))
            .collect())
    }

    pub fn contracts(&self) -> Result<Vec<Contract>, RegistryError> {
        self.list()
    }

    fn list<T: TypedRecord>(&self) -> Result<Vec<T>, RegistryError> {
        Ok(self
            .store
            .scan(T::KIND)?
            .into_iter()
            .filter_map(|v| T::from_record(v.record))
            .collect())
    }

    fn exists(&self, key: &RecordKey) -> Result<bool, RegistryError> {
        match self.store.get(key) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// The sample network: one participant per role, 2000 in every wallet, and
/// package BAT_0001 held by the manufacturer.
pub fn demo_network() -> Result<Vec<Record>, BuildError> {
    let manufacturer = ParticipantBuilder::new()
        .id("MAN_0001")
        .role(Role::Manufacturer)
        .name("ABC", "DEF")
        .address("XYZ", "111111", "PQR")
        .build()?;
    let shipper = ParticipantBuilder::new()
        .id("SH_0001")
        .role(Role::Shipper)
        .name("AAA", "BBB")
        .address("XXX", "000000", "PPP")
        .build()?;
    let wholesaleperson = ParticipantBuilder::new()
        .id("W_0001")
        .role(Role::Wholesaleperson)
        .name("CCC", "DDD")
        .address("YYY", "222222", "QQQ")
        .build()?;
    let retailer = ParticipantBuilder::new()
        .id("RE_0001")
        .role(Role::Retailer)
        .name("EEE", "FFF")
        .address("ZZZ", "333333", "RRR")
        .build()?;
    let package = PackageBuilder::new().id("BAT_0001").owner("MAN_0001").build()?;

    Ok(vec![
        manufacturer.into(),
        shipper.into(),
        wholesaleperson.into(),
        retailer.into(),
        package.into(),
    ])
}
