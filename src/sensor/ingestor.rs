// Sensor Ingestor - Appends telemetry to a package's history
//
// History is its own record, so appends never touch the package version and
// never contend with transfers. Concurrent appends to the same history do
// contend; the loser re-reads and appends again.

use crate::model::{Measurement, Package, PackageId, SensorHistory, SensorReading};
use crate::storage::{self, LedgerStore, RecordKey, RecordKind, StoreError, Versioned};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration for the sensor ingestor
#[derive(Clone, Debug)]
pub struct IngestConfig {
    /// Extra attempts after a version conflict before giving up with `Busy`
    pub max_retries: u32,
    /// Backoff per attempt in milliseconds (multiplied by the attempt number)
    pub backoff_base_ms: u64,
    /// Upper bound of random jitter added to each backoff, in milliseconds
    pub backoff_jitter_ms: u64,
}

impl IngestConfig {
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
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            backoff_base_ms: 1,
            backoff_jitter_ms: 4,
        }
    }
}

/// Errors from recording a reading
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Package not found: {0}")]
    NotFound(PackageId),

    #[error("History of package {package} still contended after {attempts} attempts")]
    Busy { package: PackageId, attempts: u32 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Where a reading landed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedReading {
    /// Position of the reading in the package history
    pub index: usize,
    /// Version of the history record after the append
    pub version: u64,
}

/// Appends sensor readings to package histories
pub struct SensorIngestor<S: LedgerStore> {
    store: Arc<S>,
    config: IngestConfig,
}

impl<S: LedgerStore> SensorIngestor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, IngestConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: IngestConfig) -> Self {
        Self { store, config }
    }

    /// Append one reading to the package's history
    pub fn record(
        &self,
        package: &PackageId,
        measurement: Measurement,
        timestamp: DateTime<Utc>,
    ) -> Result<RecordedReading, IngestError> {
        self.ensure_package(package)?;

        info!(
            package = %package,
            kind = %measurement.kind(),
            "Adding {} {} to shipment {}",
            measurement.kind(),
            measurement,
            package
        );

        let key = RecordKey::history(package);
        let reading = SensorReading::new(package.clone(), measurement, timestamp);
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let (mut history, version) = match self.store.fetch_optional::<SensorHistory>(&key)? {
                Some(found) => (found.record, found.version),
                None => (SensorHistory::new(package.clone()), 0),
            };
            let index = history.push(reading.clone());

            match self.store.put(history.into(), version) {
                Ok(version) => {
                    debug!(package = %package, index, version, "reading stored");
                    return Ok(RecordedReading { index, version });
                }
                Err(e) if e.is_conflict() => {
                    if attempts > self.config.max_retries {
                        return Err(IngestError::Busy {
                            package: package.clone(),
                            attempts,
                        });
                    }
                    warn!(package = %package, attempt = attempts, "{}, retrying", e);
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

    /// The package's readings so far. Empty if none were recorded.
    pub fn history(&self, package: &PackageId) -> Result<SensorHistory, IngestError> {
        self.ensure_package(package)?;
        Ok(self
            .store
            .fetch_optional::<SensorHistory>(&RecordKey::history(package))?
            .map(Versioned::into_inner)
            .unwrap_or_else(|| SensorHistory::new(package.clone())))
    }

    fn ensure_package(&self, package: &PackageId) -> Result<(), IngestError> {
        match self.store.fetch::<Package>(&RecordKey::package(package)) {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { key }) if key.kind() == RecordKind::Package => {
                Err(IngestError::NotFound(package.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
