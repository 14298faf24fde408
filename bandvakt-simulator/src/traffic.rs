//! Counter sources that do not touch the host.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use bandvakt_config::TrafficModelConfig;
use bandvakt_core::events::CounterSnapshot;
use bandvakt_core::time::elapsed_seconds;
use bandvakt_core::{Clock, CounterError, CounterSource};

/// Baseline throughput with multiplicative noise and occasional bursts.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficModel {
    pub baseline_received: f64,
    pub baseline_sent: f64,
    pub jitter: f64,
    pub burst_probability: f64,
    pub burst_multiplier: f64,
}

impl From<&TrafficModelConfig> for TrafficModel {
    fn from(config: &TrafficModelConfig) -> Self {
        Self {
            baseline_received: config.baseline_received as f64,
            baseline_sent: config.baseline_sent as f64,
            jitter: config.jitter.clamp(0.0, 1.0),
            burst_probability: config.burst_probability.clamp(0.0, 1.0),
            burst_multiplier: config.burst_multiplier.max(1.0),
        }
    }
}

impl Default for TrafficModel {
    fn default() -> Self {
        Self::from(&TrafficModelConfig::default())
    }
}

impl TrafficModel {
    /// Draws one interval's received and sent rates in bytes per second.
    fn draw(&self, rng: &mut StdRng) -> (f64, f64, bool) {
        let burst = rng.random_bool(self.burst_probability);
        let scale = if burst { self.burst_multiplier } else { 1.0 };
        let mut noisy = |baseline: f64| {
            let noise = 1.0 + rng.random_range(-self.jitter..=self.jitter);
            (baseline * scale * noise).max(0.0)
        };
        let received = noisy(self.baseline_received);
        let sent = noisy(self.baseline_sent);
        (received, sent, burst)
    }
}

struct TrafficState {
    rng: StdRng,
    received: u64,
    sent: u64,
    last_read: DateTime<Utc>,
    bursts: u64,
}

/// Seeded synthetic traffic. Each read credits the bytes a freshly drawn
/// rate would have moved since the previous read, as measured by `clock`.
pub struct SyntheticTraffic {
    model: TrafficModel,
    clock: Arc<dyn Clock>,
    state: Mutex<TrafficState>,
}

impl SyntheticTraffic {
    pub fn new(model: TrafficModel, seed: u64, clock: Arc<dyn Clock>) -> Self {
        let last_read = clock.now();
        Self {
            model,
            clock,
            state: Mutex::new(TrafficState {
                rng: StdRng::seed_from_u64(seed),
                received: 0,
                sent: 0,
                last_read,
                bursts: 0,
            }),
        }
    }

    /// Intervals drawn as bursts so far.
    pub fn bursts(&self) -> u64 {
        self.state.lock().bursts
    }
}

impl CounterSource for SyntheticTraffic {
    fn read(&self) -> Result<CounterSnapshot, CounterError> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let elapsed = elapsed_seconds(state.last_read, now);
        if elapsed > 0.0 {
            let (received, sent, burst) = self.model.draw(&mut state.rng);
            state.received = state.received.saturating_add((received * elapsed) as u64);
            state.sent = state.sent.saturating_add((sent * elapsed) as u64);
            if burst {
                state.bursts += 1;
                trace!(received, sent, "Synthetic burst");
            }
            state.last_read = now;
        }

        Ok(CounterSnapshot::new(state.received, state.sent, now))
    }
}

/// Replays per-interval byte deltas. The first read (the sampler's priming
/// read) returns zero; each later read adds the next delta. Once the script
/// runs out the counters either freeze or, with [`ScriptedCounters::fail_when_exhausted`],
/// report the source as unavailable.
pub struct ScriptedCounters {
    deltas: Mutex<VecDeque<(u64, u64)>>,
    totals: Mutex<Option<(u64, u64)>>,
    fail_when_exhausted: bool,
}

impl ScriptedCounters {
    pub fn from_deltas(deltas: impl IntoIterator<Item = (u64, u64)>) -> Self {
        Self {
            deltas: Mutex::new(deltas.into_iter().collect()),
            totals: Mutex::new(None),
            fail_when_exhausted: false,
        }
    }

    pub fn fail_when_exhausted(mut self) -> Self {
        self.fail_when_exhausted = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.deltas.lock().len()
    }
}

impl CounterSource for ScriptedCounters {
    fn read(&self) -> Result<CounterSnapshot, CounterError> {
        let mut totals = self.totals.lock();
        let (received, sent) = match *totals {
            None => (0, 0),
            Some((received, sent)) => match self.deltas.lock().pop_front() {
                Some((dr, ds)) => (received.saturating_add(dr), sent.saturating_add(ds)),
                None if self.fail_when_exhausted => {
                    return Err(CounterError::Unavailable("script exhausted".into()))
                }
                None => (received, sent),
            },
        };
        *totals = Some((received, sent));
        Ok(CounterSnapshot::new(received, sent, Utc::now()))
    }
}
