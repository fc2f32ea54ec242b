// Sensor module - TELEMETRY
// Temperature, humidity and location readings appended to package history

mod ingestor;

pub use ingestor::{IngestConfig, IngestError, RecordedReading, SensorIngestor};
