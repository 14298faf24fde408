//! # Bandvakt Telemetry
//!
//! Logging, metrics and the CSV event sink.

pub mod logging;
pub mod metrics;
pub mod sink;

use thiserror::Error;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
pub use sink::CsvEventSink;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
