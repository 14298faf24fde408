/*!
# Bandvakt Simulator

Deterministic simulation and replay for the traffic sampler. Time is virtual,
counters come from a seeded traffic model or a scripted scenario, and every
tick is folded into a BLAKE3 state hash so two runs can be compared.

## Key Components:
- **Virtual Clock:** Simulated wall time with nanosecond precision.
- **Traffic Models:** Seeded baseline-plus-burst traffic and scripted deltas.
- **Fakes:** Scripted device scanner and an in-memory event sink.
- **Scenarios:** YAML scripts with an optional expected state hash.
*/

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use blake3::Hasher;
use serde::Serialize;
use tracing::{debug, info};

use bandvakt_config::SimulatorConfig;
use bandvakt_core::sampler::TickOutcome;
use bandvakt_core::{Clock, CounterSource, SamplerSettings, TrafficSampler};

pub mod error;
pub mod fakes;
pub mod scenario;
pub mod traffic;
pub mod virtual_clock;

pub use error::SimulationError;
pub use fakes::{MemorySink, ScanBehavior, ScriptedScanner};
pub use scenario::{Scenario, ScenarioStep};
pub use traffic::{ScriptedCounters, SyntheticTraffic, TrafficModel};
pub use virtual_clock::VirtualClock;

/// One planned tick: how far to move the clock and, optionally, what the
/// scan should do.
#[derive(Debug, Clone)]
struct PlannedTick {
    advance: Duration,
    scan: Option<ScanBehavior>,
}

/// Aggregate outcome of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub ticks: usize,
    pub samples: usize,
    pub skipped: usize,
    pub alerts: usize,
    pub scan_failures: usize,
    pub sink_failures: usize,
    pub max_observed: f64,
    pub average: f64,
    /// Sequence numbers of the ticks that alerted.
    pub alert_sequences: Vec<u64>,
    pub state_hash: String,
}

/// Drives a [`TrafficSampler`] against virtual time.
pub struct Simulator {
    clock: VirtualClock,
    sampler: TrafficSampler,
    scanner: Arc<ScriptedScanner>,
    sink: Arc<MemorySink>,
    interval: Duration,
    plan: VecDeque<PlannedTick>,
    pub state_hasher: Hasher,
    report: SimulationReport,
}

impl Simulator {
    /// Seeded synthetic traffic with a fixed device count, one tick per second.
    pub fn synthetic(
        config: &SimulatorConfig,
        settings: SamplerSettings,
    ) -> Result<Self, SimulationError> {
        let clock = VirtualClock::new(0);
        let counters = SyntheticTraffic::new(
            TrafficModel::from(&config.traffic),
            config.seed,
            Arc::new(clock.clone()),
        );
        Self::build(
            clock,
            Arc::new(counters),
            ScriptedScanner::fixed(config.devices),
            settings,
            Duration::from_secs(1),
            VecDeque::new(),
        )
    }

    /// Replays a scripted scenario; `base` supplies whatever the scenario
    /// does not override.
    pub fn from_scenario(
        scenario: &Scenario,
        base: &SamplerSettings,
    ) -> Result<Self, SimulationError> {
        let counters = ScriptedCounters::from_deltas(scenario.steps.iter().map(|s| (s.received, s.sent)));
        let plan = scenario
            .steps
            .iter()
            .zip(scenario.advances())
            .map(|(step, advance_ms)| PlannedTick {
                advance: Duration::from_millis(advance_ms),
                scan: step.scan.clone(),
            })
            .collect();

        Self::build(
            VirtualClock::new(0),
            Arc::new(counters),
            ScriptedScanner::fixed(scenario.devices),
            scenario.settings(base),
            Duration::from_millis(scenario.interval_ms),
            plan,
        )
    }

    fn build(
        clock: VirtualClock,
        counters: Arc<dyn CounterSource>,
        scanner: ScriptedScanner,
        settings: SamplerSettings,
        interval: Duration,
        plan: VecDeque<PlannedTick>,
    ) -> Result<Self, SimulationError> {
        let scanner = Arc::new(scanner);
        let sink = Arc::new(MemorySink::new());
        let sampler = TrafficSampler::new(
            settings,
            counters,
            scanner.clone(),
            sink.clone(),
            clock.now(),
        )?;

        Ok(Self {
            clock,
            sampler,
            scanner,
            sink,
            interval,
            plan,
            state_hasher: Hasher::new(),
            report: SimulationReport {
                ticks: 0,
                samples: 0,
                skipped: 0,
                alerts: 0,
                scan_failures: 0,
                sink_failures: 0,
                max_observed: 0.0,
                average: 0.0,
                alert_sequences: Vec::new(),
                state_hash: String::new(),
            },
        })
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn sink(&self) -> &MemorySink {
        &self.sink
    }

    /// Ticks left in a scripted plan.
    pub fn remaining_steps(&self) -> usize {
        self.plan.len()
    }

    /// Advances virtual time and runs one tick.
    pub async fn step(&mut self) -> Result<TickOutcome, SimulationError> {
        let planned = self.plan.pop_front().unwrap_or(PlannedTick {
            advance: self.interval,
            scan: None,
        });
        if let Some(behavior) = planned.scan {
            self.scanner.push(behavior);
        }
        self.clock.advance_by(planned.advance);

        let outcome = self.sampler.tick(self.clock.now()).await?;
        self.record(&outcome);
        Ok(outcome)
    }

    /// Runs `ticks` ticks and returns the report with the final state hash.
    pub async fn run(&mut self, ticks: usize) -> Result<SimulationReport, SimulationError> {
        for _ in 0..ticks {
            self.step().await?;
        }
        let report = self.report();
        info!(
            ticks = report.ticks,
            alerts = report.alerts,
            hash = %report.state_hash,
            "Simulation complete"
        );
        Ok(report)
    }

    /// Runs every remaining scripted step.
    pub async fn run_plan(&mut self) -> Result<SimulationReport, SimulationError> {
        let steps = self.plan.len();
        self.run(steps).await
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            max_observed: self.sampler.max_observed(),
            average: self.sampler.average(),
            state_hash: hex::encode(self.state_hasher.finalize().as_bytes()),
            ..self.report.clone()
        }
    }

    fn record(&mut self, outcome: &TickOutcome) {
        self.report.ticks += 1;
        match outcome {
            TickOutcome::Skipped(skipped) => {
                self.scanner.clear();
                self.report.skipped += 1;
                self.state_hasher.update(b"SKIPPED");
                self.state_hasher
                    .update(&skipped.elapsed_secs.to_le_bytes());
            }
            TickOutcome::Sampled(tick) => {
                let event = &tick.event;
                self.report.samples += 1;
                self.report.sink_failures += tick.sink_failures.len();
                if event.is_alert() {
                    self.report.alerts += 1;
                    self.report.alert_sequences.push(event.sequence);
                }
                if event.devices.error.is_some() {
                    self.report.scan_failures += 1;
                }
                debug!(seq = event.sequence, total = event.sample.total_per_sec, "Simulated tick");

                self.state_hasher.update(&event.sequence.to_le_bytes());
                self.state_hasher
                    .update(&event.sample.received_per_sec.to_le_bytes());
                self.state_hasher
                    .update(&event.sample.sent_per_sec.to_le_bytes());
                self.state_hasher
                    .update(&event.dynamic_threshold.to_le_bytes());
                self.state_hasher.update(&[event.is_alert() as u8]);
                self.state_hasher
                    .update(&event.security_score.value().to_le_bytes());
                self.state_hasher
                    .update(&(event.devices.device_count() as u64).to_le_bytes());
            }
        }
    }
}

impl SimulationReport {
    /// Fails unless the run reproduced `expected`.
    pub fn verify(&self, expected: &str) -> Result<(), SimulationError> {
        if self.state_hash.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(SimulationError::HashMismatch {
                expected: expected.trim().to_string(),
                actual: self.state_hash.clone(),
            })
        }
    }
}
