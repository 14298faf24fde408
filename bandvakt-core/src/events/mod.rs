//! ## bandvakt-core::events
//! **Per-tick output types and the subscriber bus**

pub mod bus;
pub mod sample;

use std::sync::Arc;

use crate::sampler::SinkFailure;

pub use bus::{EventBus, EventError, Subscription};
pub use sample::{
    AlertRecord, CounterSnapshot, DeviceEntry, DeviceScanResult, DeviceSnapshot, SampleDerived,
    SampleEvent, TrafficSample, ALERT_REASON,
};

/// Everything a subscriber can observe from a running monitor.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// One completed tick.
    Sample(Arc<SampleEvent>),
    /// A sink append failed; the tick was still published.
    SinkWarning(SinkFailure),
    /// The loop ended because `stop` was requested.
    Stopped,
    /// The loop ended because counters became unavailable.
    Failed { reason: String },
}

impl MonitorEvent {
    /// True for the last event a loop run publishes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorEvent::Stopped | MonitorEvent::Failed { .. })
    }

    pub fn as_sample(&self) -> Option<&SampleEvent> {
        match self {
            MonitorEvent::Sample(event) => Some(event),
            _ => None,
        }
    }
}
