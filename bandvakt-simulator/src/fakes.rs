//! Scanner and sink stand-ins for simulation and tests.

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use bandvakt_core::events::{AlertRecord, DeviceEntry, DeviceScanResult, SampleDerived, TrafficSample};
use bandvakt_core::{DeviceScanner, EventSink, ScanError, SinkError};

/// What a scripted scan does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanBehavior {
    /// Report this many devices.
    Devices(usize),
    /// Fail with the given message.
    Fail(String),
    /// Never complete; the caller's timeout decides.
    Stall,
}

/// Largest list [`synthetic_devices`] hands out; hosts stay inside 10.0.0.0/16.
pub const MAX_SYNTHETIC_DEVICES: usize = 65_534;

/// Synthetic device list `10.0.0.1 ..` with locally administered MACs.
/// Counts above [`MAX_SYNTHETIC_DEVICES`] are clamped.
pub fn synthetic_devices(count: usize) -> Vec<DeviceEntry> {
    (1..=count.min(MAX_SYNTHETIC_DEVICES) as u32)
        .map(|host| {
            DeviceEntry {
                address: IpAddr::V4(Ipv4Addr::from(u32::from(Ipv4Addr::new(10, 0, 0, 0)) + host)),
                mac: Some(format!(
                    "02:00:00:{:02x}:{:02x}:{:02x}",
                    (host >> 16) & 0xff,
                    (host >> 8) & 0xff,
                    host & 0xff
                )),
                interface: Some("sim0".into()),
            }
        })
        .collect()
}

/// Scanner that plays queued behaviours, then repeats `fallback`.
pub struct ScriptedScanner {
    queue: Mutex<VecDeque<ScanBehavior>>,
    fallback: ScanBehavior,
}

impl ScriptedScanner {
    pub fn new(fallback: ScanBehavior) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    /// Always reports `count` devices.
    pub fn fixed(count: usize) -> Self {
        Self::new(ScanBehavior::Devices(count))
    }

    pub fn then(self, behavior: ScanBehavior) -> Self {
        self.queue.lock().push_back(behavior);
        self
    }

    pub fn push(&self, behavior: ScanBehavior) {
        self.queue.lock().push_back(behavior);
    }

    /// Drops queued behaviours that were never consumed.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    fn next_behavior(&self) -> ScanBehavior {
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl DeviceScanner for ScriptedScanner {
    async fn scan(&self, _timeout: Duration) -> Result<DeviceScanResult, ScanError> {
        match self.next_behavior() {
            ScanBehavior::Devices(count) => {
                let devices = synthetic_devices(count);
                let raw_text = devices
                    .iter()
                    .map(|d| {
                        format!(
                            "? ({}) at {} [ether] on sim0",
                            d.address,
                            d.mac.as_deref().unwrap_or("<incomplete>")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(DeviceScanResult { devices, raw_text })
            }
            ScanBehavior::Fail(message) => Err(ScanError::Command(message)),
            ScanBehavior::Stall => std::future::pending().await,
        }
    }
}

/// Sink that keeps everything in memory. Either stream can be made to fail.
#[derive(Default)]
pub struct MemorySink {
    samples: Mutex<Vec<(TrafficSample, SampleDerived)>>,
    alerts: Mutex<Vec<AlertRecord>>,
    fail_samples: Mutex<bool>,
    fail_alerts: Mutex<bool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_samples(&self, fail: bool) {
        *self.fail_samples.lock() = fail;
    }

    pub fn fail_alerts(&self, fail: bool) {
        *self.fail_alerts.lock() = fail;
    }

    pub fn samples(&self) -> Vec<(TrafficSample, SampleDerived)> {
        self.samples.lock().clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.lock().clone()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn record_sample(
        &self,
        sample: &TrafficSample,
        derived: &SampleDerived,
    ) -> Result<(), SinkError> {
        if *self.fail_samples.lock() {
            return Err(SinkError::Rejected("sample stream unavailable".into()));
        }
        self.samples.lock().push((*sample, *derived));
        Ok(())
    }

    async fn record_alert(&self, alert: &AlertRecord) -> Result<(), SinkError> {
        if *self.fail_alerts.lock() {
            return Err(SinkError::Rejected("alert stream unavailable".into()));
        }
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}
