// Sensor readings - telemetry attached to a package while it travels

use crate::model::PackageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of sensor reading
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadingKind {
    Temperature,
    Humidity,
    Location,
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadingKind::Temperature => "temperature",
            ReadingKind::Humidity => "humidity",
            ReadingKind::Location => "location",
        };
        f.write_str(name)
    }
}

/// A measured value, tagged with its kind
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Measurement {
    /// Mean temperature in degrees Celsius
    Temperature(f64),
    /// Mean relative humidity in percent
    Humidity(f64),
    /// Geographic coordinate, free-form
    Location(String),
}

impl Measurement {
    pub fn kind(&self) -> ReadingKind {
        match self {
            Measurement::Temperature(_) => ReadingKind::Temperature,
            Measurement::Humidity(_) => ReadingKind::Humidity,
            Measurement::Location(_) => ReadingKind::Location,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Temperature(celsius) => write!(f, "{celsius}C"),
            Measurement::Humidity(percent) => write!(f, "{percent}%"),
            Measurement::Location(coordinate) => f.write_str(coordinate),
        }
    }
}

/// One immutable telemetry reading
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    package: PackageId,
    measurement: Measurement,
    timestamp: DateTime<Utc>,
}

impl SensorReading {
    pub fn new(package: PackageId, measurement: Measurement, timestamp: DateTime<Utc>) -> Self {
        Self {
            package,
            measurement,
            timestamp,
        }
    }

    pub fn package(&self) -> &PackageId {
        &self.package
    }

    pub fn kind(&self) -> ReadingKind {
        self.measurement.kind()
    }

    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Append-only telemetry of one package, in submission order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorHistory {
    package: PackageId,
    readings: Vec<SensorReading>,
}

impl SensorHistory {
    pub fn new(package: PackageId) -> Self {
        Self {
            package,
            readings: Vec::new(),
        }
    }

    pub fn package(&self) -> &PackageId {
        &self.package
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// All readings, oldest first
    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    /// Readings of a single kind, oldest first
    pub fn of_kind(&self, kind: ReadingKind) -> impl Iterator<Item = &SensorReading> {
        self.readings.iter().filter(move |r| r.kind() == kind)
    }

    pub fn temperature(&self) -> impl Iterator<Item = &SensorReading> {
        self.of_kind(ReadingKind::Temperature)
    }

    pub fn humidity(&self) -> impl Iterator<Item = &SensorReading> {
        self.of_kind(ReadingKind::Humidity)
    }

    pub fn location(&self) -> impl Iterator<Item = &SensorReading> {
        self.of_kind(ReadingKind::Location)
    }

    /// Append a reading, returning its position in the history
    pub(crate) fn push(&mut self, reading: SensorReading) -> usize {
        self.readings.push(reading);
        self.readings.len() - 1
    }
}
