//! Traffic sampler: turns successive counter readings into [`SampleEvent`]s.
//!
//! State carried across ticks is the previous snapshot, the moving window and
//! the running maximum. The sampler is driven by exactly one caller; it takes
//! `&mut self` and never runs two ticks at once.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::capability::{CounterSource, DeviceScanner, EventSink};
use crate::error::{CounterError, ScanError};
use crate::events::{
    AlertRecord, CounterSnapshot, DeviceSnapshot, SampleEvent, TrafficSample,
};
use crate::score::{ScoreThresholds, SecurityScorer};
use crate::time::elapsed_seconds;
use crate::window::MovingWindow;

/// Tunables for the threshold and scan behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Bytes per second added to the smoothed average.
    pub base_threshold: f64,
    pub window_size: usize,
    pub sensitivity_factor: f64,
    pub scan_timeout: Duration,
    pub score: ScoreThresholds,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            base_threshold: 1024.0 * 1024.0,
            window_size: 10,
            sensitivity_factor: 0.5,
            scan_timeout: Duration::from_secs(3),
            score: ScoreThresholds::default(),
        }
    }
}

impl SamplerSettings {
    /// `base + average * sensitivity`.
    #[inline]
    pub fn dynamic_threshold(&self, average: f64) -> f64 {
        self.base_threshold + average * self.sensitivity_factor
    }
}

/// Which sink stream an append failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkStream {
    Samples,
    Alerts,
}

/// A non-fatal append failure observed during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkFailure {
    pub stream: SinkStream,
    pub sequence: u64,
    pub error: String,
}

/// A completed tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub event: SampleEvent,
    pub sink_failures: Vec<SinkFailure>,
}

/// A tick dropped because wall-clock time did not advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkippedTick {
    pub at: DateTime<Utc>,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Sampled(TickReport),
    Skipped(SkippedTick),
}

impl TickOutcome {
    pub fn event(&self) -> Option<&SampleEvent> {
        match self {
            TickOutcome::Sampled(report) => Some(&report.event),
            TickOutcome::Skipped(_) => None,
        }
    }
}

pub struct TrafficSampler {
    settings: SamplerSettings,
    counters: Arc<dyn CounterSource>,
    scanner: Arc<dyn DeviceScanner>,
    sink: Arc<dyn EventSink>,
    scorer: SecurityScorer,
    last_snapshot: CounterSnapshot,
    last_tick: DateTime<Utc>,
    window: MovingWindow,
    max_observed: f64,
    sequence: u64,
}

impl TrafficSampler {
    /// Creates a sampler primed with one counter reading taken at `now`.
    /// The priming read produces no event.
    pub fn new(
        settings: SamplerSettings,
        counters: Arc<dyn CounterSource>,
        scanner: Arc<dyn DeviceScanner>,
        sink: Arc<dyn EventSink>,
        now: DateTime<Utc>,
    ) -> Result<Self, CounterError> {
        let last_snapshot = counters.read()?;
        debug!(
            received = last_snapshot.received_bytes,
            sent = last_snapshot.sent_bytes,
            "Sampler primed"
        );

        Ok(Self {
            scorer: SecurityScorer::new(settings.score),
            window: MovingWindow::with_capacity(settings.window_size),
            settings,
            counters,
            scanner,
            sink,
            last_snapshot,
            last_tick: now,
            max_observed: 0.0,
            sequence: 0,
        })
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    pub fn window(&self) -> &MovingWindow {
        &self.window
    }

    pub fn max_observed(&self) -> f64 {
        self.max_observed
    }

    pub fn average(&self) -> f64 {
        self.window.average()
    }

    pub fn last_tick(&self) -> DateTime<Utc> {
        self.last_tick
    }

    /// Runs one sampling cycle.
    ///
    /// Returns `Err` only when the counter source fails; scan and sink
    /// failures are folded into the report.
    #[instrument(level = "debug", skip(self), fields(seq = self.sequence + 1))]
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, CounterError> {
        let current = self.counters.read()?;

        let elapsed = elapsed_seconds(self.last_tick, now);
        if elapsed <= 0.0 {
            debug!(elapsed, "Clock did not advance, skipping tick");
            return Ok(TickOutcome::Skipped(SkippedTick {
                at: now,
                elapsed_secs: elapsed,
            }));
        }

        let received = counter_delta(
            "received",
            self.last_snapshot.received_bytes,
            current.received_bytes,
        );
        let sent = counter_delta("sent", self.last_snapshot.sent_bytes, current.sent_bytes);

        let received_per_sec = received as f64 / elapsed;
        let sent_per_sec = sent as f64 / elapsed;
        let sample = TrafficSample {
            received_per_sec,
            sent_per_sec,
            total_per_sec: received_per_sec + sent_per_sec,
            taken_at: now,
        };

        self.window.push(sample.total_per_sec);
        let average = self.window.average();
        let dynamic_threshold = self.settings.dynamic_threshold(average);
        self.max_observed = self.max_observed.max(sample.total_per_sec);

        let alert = (received_per_sec > dynamic_threshold || sent_per_sec > dynamic_threshold)
            .then(|| AlertRecord::abnormal_traffic(&sample));

        let devices = self.scan_devices().await;
        let security_score = self.scorer.score(devices.device_count());

        self.sequence += 1;
        let event = SampleEvent {
            sequence: self.sequence,
            sample,
            dynamic_threshold,
            alert,
            max_observed: self.max_observed,
            average,
            security_score,
            devices,
        };

        let sink_failures = self.persist(&event).await;

        self.last_tick = now;
        self.last_snapshot = current;

        Ok(TickOutcome::Sampled(TickReport {
            event,
            sink_failures,
        }))
    }

    async fn scan_devices(&self) -> DeviceSnapshot {
        let budget = self.settings.scan_timeout;
        let outcome = match tokio::time::timeout(budget, self.scanner.scan(budget)).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout(budget)),
        };

        match outcome {
            Ok(result) => DeviceSnapshot::from_result(result),
            Err(e) => {
                warn!("Device scan failed: {e}");
                DeviceSnapshot::failed(e.to_string())
            }
        }
    }

    /// Appends the sample and, if present, the alert. Each stream is attempted
    /// regardless of the other's outcome.
    async fn persist(&self, event: &SampleEvent) -> Vec<SinkFailure> {
        let mut failures = Vec::new();

        if let Err(e) = self.sink.record_sample(&event.sample, &event.derived()).await {
            warn!("Failed to persist sample: {e}");
            failures.push(SinkFailure {
                stream: SinkStream::Samples,
                sequence: event.sequence,
                error: e.to_string(),
            });
        }

        if let Some(alert) = &event.alert {
            if let Err(e) = self.sink.record_alert(alert).await {
                warn!("Failed to persist alert: {e}");
                failures.push(SinkFailure {
                    stream: SinkStream::Alerts,
                    sequence: event.sequence,
                    error: e.to_string(),
                });
            }
        }

        failures
    }
}

/// Counters can go backwards when an interface is reset; treat that as zero
/// traffic for the interval.
fn counter_delta(direction: &str, previous: u64, current: u64) -> u64 {
    if current < previous {
        warn!(direction, previous, current, "Counter decreased, assuming reset");
    }
    current.saturating_sub(previous)
}
