use std::time::Duration;

use thiserror::Error;

/// Failure to read cumulative interface counters. Fatal to a running monitor.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("Network counters unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed counter data: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Device enumeration failure. Never fatal; the sampler degrades to zero devices.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Device scan timed out after {0:?}")]
    Timeout(Duration),

    #[error("Scan command failed: {0}")]
    Command(String),

    #[error("Scan output could not be parsed: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append failure on one of the event sink streams.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink rejected record: {0}")]
    Rejected(String),
}
