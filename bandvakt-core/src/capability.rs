//! Capabilities the sampler depends on. Live adapters live in
//! `bandvakt-capture` and `bandvakt-telemetry`; fakes live in
//! `bandvakt-simulator`.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CounterError, ScanError, SinkError};
use crate::events::{AlertRecord, CounterSnapshot, DeviceScanResult, SampleDerived, TrafficSample};

/// Source of cumulative host byte counters.
///
/// `read` is synchronous and runs on the sampling task, so implementations
/// must return promptly (an in-memory file such as `/proc/net/dev`, not a
/// network round trip).
pub trait CounterSource: Send + Sync {
    fn read(&self) -> Result<CounterSnapshot, CounterError>;
}

/// Enumerates devices visible on the local network.
///
/// Implementations should respect `timeout`; the sampler enforces it as well.
#[async_trait]
pub trait DeviceScanner: Send + Sync {
    async fn scan(&self, timeout: Duration) -> Result<DeviceScanResult, ScanError>;
}

/// Append-only persistence with one stream for samples and one for alerts.
///
/// A single controller never calls a sink concurrently, but one sink may be
/// shared by several controllers.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record_sample(
        &self,
        sample: &TrafficSample,
        derived: &SampleDerived,
    ) -> Result<(), SinkError>;

    async fn record_alert(&self, alert: &AlertRecord) -> Result<(), SinkError>;
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn record_sample(&self, _: &TrafficSample, _: &SampleDerived) -> Result<(), SinkError> {
        Ok(())
    }

    async fn record_alert(&self, _: &AlertRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
