//! Per-tick data types: counter snapshots, derived rates, alerts and the
//! bundled [`SampleEvent`] every consumer receives.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::score::SecurityScore;

/// Reason attached to every threshold breach.
pub const ALERT_REASON: &str = "abnormal traffic detected";

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Cumulative interface byte counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub received_bytes: u64,
    pub sent_bytes: u64,
    pub taken_at: DateTime<Utc>,
}

impl CounterSnapshot {
    #[inline]
    pub fn new(received_bytes: u64, sent_bytes: u64, taken_at: DateTime<Utc>) -> Self {
        Self {
            received_bytes,
            sent_bytes,
            taken_at,
        }
    }
}

/// Throughput derived from two consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub received_per_sec: f64,
    pub sent_per_sec: f64,
    pub total_per_sec: f64,
    pub taken_at: DateTime<Utc>,
}

/// Values derived alongside a sample that the sink persists with it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleDerived {
    pub max_observed: f64,
    pub average: f64,
    pub dynamic_threshold: f64,
}

/// A threshold breach. Repeated breaches produce repeated records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub received_per_sec: f64,
    pub sent_per_sec: f64,
}

impl AlertRecord {
    pub fn abnormal_traffic(sample: &TrafficSample) -> Self {
        Self {
            timestamp: sample.taken_at,
            reason: ALERT_REASON.to_string(),
            received_per_sec: sample.received_per_sec,
            sent_per_sec: sample.sent_per_sec,
        }
    }
}

/// One device seen by a scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub address: IpAddr,
    pub mac: Option<String>,
    pub interface: Option<String>,
}

/// Result of a successful device enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceScanResult {
    pub devices: Vec<DeviceEntry>,
    pub raw_text: String,
}

/// What a tick saw of the local network. On scan failure `devices` is empty,
/// `raw_text` holds a readable description and `error` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub devices: Vec<DeviceEntry>,
    pub raw_text: String,
    pub error: Option<String>,
}

impl DeviceSnapshot {
    pub fn from_result(result: DeviceScanResult) -> Self {
        Self {
            devices: result.devices,
            raw_text: result.raw_text,
            error: None,
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            devices: Vec::new(),
            raw_text: format!("Error performing device scan: {description}"),
            error: Some(description),
        }
    }

    #[inline]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

/// The complete output of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEvent {
    /// Position in the tick sequence of the controller run, starting at 1.
    pub sequence: u64,
    pub sample: TrafficSample,
    pub dynamic_threshold: f64,
    pub alert: Option<AlertRecord>,
    pub max_observed: f64,
    pub average: f64,
    pub security_score: SecurityScore,
    pub devices: DeviceSnapshot,
}

impl SampleEvent {
    #[inline]
    pub fn is_alert(&self) -> bool {
        self.alert.is_some()
    }

    pub fn derived(&self) -> SampleDerived {
        SampleDerived {
            max_observed: self.max_observed,
            average: self.average,
            dynamic_threshold: self.dynamic_threshold,
        }
    }

    /// Human readable rendering of the tick, one line per concern.
    pub fn summary(&self) -> SampleSummary<'_> {
        SampleSummary(self)
    }
}

/// Display adapter returned by [`SampleEvent::summary`].
pub struct SampleSummary<'a>(&'a SampleEvent);

impl fmt::Display for SampleSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let event = self.0;
        writeln!(
            f,
            "Received: {:.2} KB/s, Sent: {:.2} KB/s",
            event.sample.received_per_sec / KIB,
            event.sample.sent_per_sec / KIB
        )?;
        writeln!(
            f,
            "Dynamic threshold: {:.2} MB/s",
            event.dynamic_threshold / MIB
        )?;
        if let Some(alert) = &event.alert {
            writeln!(
                f,
                "Alert: {}. Received: {:.2} MB/s, Sent: {:.2} MB/s",
                alert.reason,
                alert.received_per_sec / MIB,
                alert.sent_per_sec / MIB
            )?;
        }
        write!(
            f,
            "Max traffic: {:.2} bytes/s, Average: {:.2} bytes/s, Devices: {}, Security score: {}",
            event.max_observed,
            event.average,
            event.devices.device_count(),
            event.security_score
        )
    }
}
