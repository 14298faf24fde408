/*!
# Runtime

Wires configuration to capabilities and provides the entry points the
frontends share: the live monitor, deterministic simulation and a
one-shot device scan.
*/

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tracing::{error, info, instrument, warn};

use bandvakt_capture::{
    ArpCommandScanner, DisabledScanner, IgnoreList, ProcArpScanner, ProcNetDevSource,
    StaticScanner,
};
use bandvakt_config::{BandvaktConfig, CounterMode, ScannerConfig, ScannerKind, SinkConfig};
use bandvakt_core::events::DeviceSnapshot;
use bandvakt_core::{
    CounterSource, DeviceScanner, EventSink, MonitorEvent, NullSink, SamplerSettings,
    ScanError, ScoreThresholds, SecurityScore, SecurityScorer, SystemClock,
};
use bandvakt_simulator::{Scenario, SimulationReport, Simulator, SyntheticTraffic, TrafficModel};
use bandvakt_telemetry::{CsvEventSink, EventLogger, MetricsRecorder};

use crate::controller::{Capabilities, ControllerOptions, LiveStats, MonitorController};
use crate::error::MonitorError;

pub fn sampler_settings(config: &BandvaktConfig) -> SamplerSettings {
    SamplerSettings {
        base_threshold: config.monitor.base_threshold,
        window_size: config.monitor.window_size,
        sensitivity_factor: config.monitor.sensitivity_factor,
        scan_timeout: Duration::from_millis(config.monitor.scan_timeout_ms),
        score: ScoreThresholds {
            medium_above: config.score.medium_above,
            low_above: config.score.low_above,
        },
    }
}

pub fn controller_options(config: &BandvaktConfig) -> ControllerOptions {
    ControllerOptions {
        sampler: sampler_settings(config),
        interval: Duration::from_secs(config.monitor.interval_secs),
        subscriber_buffer: config.monitor.subscriber_buffer,
    }
}

pub fn build_counter_source(config: &BandvaktConfig) -> Arc<dyn CounterSource> {
    match config.capture.counters {
        CounterMode::Procfs => Arc::new(
            ProcNetDevSource::new(&config.capture.proc_path)
                .with_interfaces(config.capture.interfaces.clone())
                .exclude_loopback(config.capture.exclude_loopback),
        ),
        CounterMode::Simulated => Arc::new(SyntheticTraffic::new(
            TrafficModel::from(&config.simulator.traffic),
            config.simulator.seed,
            Arc::new(SystemClock),
        )),
    }
}

pub fn build_scanner(config: &ScannerConfig) -> Arc<dyn DeviceScanner> {
    let ignore = IgnoreList::new(config.ignore.clone());
    match config.kind {
        ScannerKind::Arp => Arc::new(
            ArpCommandScanner::new(config.command.clone(), config.args.clone()).with_ignore(ignore),
        ),
        ScannerKind::Proc => Arc::new(ProcArpScanner::new(&config.proc_path).with_ignore(ignore)),
        ScannerKind::Static => Arc::new(StaticScanner::new(config.static_devices.clone())),
        ScannerKind::Disabled => Arc::new(DisabledScanner),
    }
}

pub fn build_sink(config: &SinkConfig) -> Arc<dyn EventSink> {
    if config.enabled {
        Arc::new(CsvEventSink::new(&config.history_path, &config.alerts_path))
    } else {
        Arc::new(NullSink)
    }
}

pub fn build_capabilities(config: &BandvaktConfig) -> Capabilities {
    Capabilities {
        counters: build_counter_source(config),
        scanner: build_scanner(&config.scanner),
        sink: build_sink(&config.sink),
    }
}

/// Runs the live monitor until Ctrl-C or until the counters fail.
/// Every published event is handed to `on_event`.
#[instrument(level = "info", name = "run_live_mode", skip_all)]
pub async fn run_live_mode<F>(
    config: &BandvaktConfig,
    metrics: Option<Arc<MetricsRecorder>>,
    mut on_event: F,
) -> Result<LiveStats, MonitorError>
where
    F: FnMut(&MonitorEvent),
{
    let mut builder = MonitorController::builder(controller_options(config), build_capabilities(config));
    if let Some(metrics) = metrics {
        builder = builder.metrics(metrics);
    }
    let controller = builder.build()?;

    let mut events = controller.subscribe();
    controller.start().await?;
    info!(
        counters = ?config.capture.counters,
        scanner = ?config.scanner.kind,
        "Live monitoring started"
    );

    let mut failure = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, stopping monitor");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                on_event(&event);
                if let MonitorEvent::Failed { reason } = &event {
                    failure = Some(reason.clone());
                }
                if event.is_terminal() {
                    break;
                }
            }
        }
    }

    controller.stop().await?;
    let stats = controller.stats();
    if stats.dropped_events > 0 {
        warn!(dropped = stats.dropped_events, "Events were dropped for slow subscribers");
    }

    match failure {
        Some(reason) => Err(MonitorError::Failed(reason)),
        None => Ok(stats),
    }
}

/// Runs a deterministic simulation, replaying `scenario_path` when given and
/// synthetic traffic otherwise. A scenario's own `expected_hash` is checked
/// unless `validate_hash` overrides it.
#[instrument(level = "info", name = "run_simulation_mode", skip(config))]
pub async fn run_simulation_mode(
    config: &BandvaktConfig,
    scenario_path: Option<&Path>,
    ticks: Option<usize>,
    seed: Option<u64>,
    validate_hash: Option<&str>,
) -> Result<SimulationReport, MonitorError> {
    let settings = sampler_settings(config);

    let (report, expected) = match scenario_path {
        Some(path) => {
            info!("Replaying scenario from file: {}", path.display());
            let scenario = Scenario::load(path)?;
            let mut simulator = Simulator::from_scenario(&scenario, &settings)?;
            let report = match ticks {
                Some(ticks) => simulator.run(ticks).await?,
                None => simulator.run_plan().await?,
            };
            let expected = validate_hash
                .map(str::to_string)
                .or(scenario.expected_hash);
            (report, expected)
        }
        None => {
            let mut sim_config = config.simulator.clone();
            if let Some(seed) = seed {
                sim_config.seed = seed;
            }
            let mut simulator = Simulator::synthetic(&sim_config, settings)?;
            let report = simulator.run(ticks.unwrap_or(sim_config.ticks)).await?;
            (report, validate_hash.map(str::to_string))
        }
    };

    if let Some(expected) = expected {
        if let Err(e) = report.verify(&expected) {
            error!("Simulation error: {e}");
            return Err(e.into());
        }
        info!("State hash validated");
    }

    EventLogger::log_event(
        "simulation_complete",
        vec![
            KeyValue::new("ticks", report.ticks as i64),
            KeyValue::new("alerts", report.alerts as i64),
            KeyValue::new("final_hash", report.state_hash.clone()),
        ],
    )
    .await;

    Ok(report)
}

/// One scan with the configured scanner, scored with the configured
/// boundaries. Failures are folded into the snapshot as during monitoring.
#[instrument(level = "info", name = "scan_once", skip(config))]
pub async fn scan_once(config: &BandvaktConfig) -> (DeviceSnapshot, SecurityScore) {
    let scanner = build_scanner(&config.scanner);
    let budget = Duration::from_millis(config.monitor.scan_timeout_ms);

    let outcome = match tokio::time::timeout(budget, scanner.scan(budget)).await {
        Ok(result) => result,
        Err(_) => Err(ScanError::Timeout(budget)),
    };
    let snapshot = match outcome {
        Ok(result) => DeviceSnapshot::from_result(result),
        Err(e) => {
            warn!("Device scan failed: {e}");
            DeviceSnapshot::failed(e.to_string())
        }
    };

    let scorer = SecurityScorer::new(sampler_settings(config).score);
    let score = scorer.score(snapshot.device_count());
    (snapshot, score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn settings_follow_config() {
        let mut config = BandvaktConfig::default();
        config.monitor.base_threshold = 1000.0;
        config.monitor.scan_timeout_ms = 250;
        config.score.low_above = 20;

        let options = controller_options(&config);
        assert_eq!(options.sampler.base_threshold, 1000.0);
        assert_eq!(options.sampler.scan_timeout, Duration::from_millis(250));
        assert_eq!(options.sampler.score.low_above, 20);
        assert_eq!(options.interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn static_scan_is_scored() {
        let mut config = BandvaktConfig::default();
        config.scanner.kind = ScannerKind::Static;
        config.scanner.static_devices = (1..=7)
            .map(|i| format!("192.168.1.{i}").parse().unwrap())
            .collect();

        let (snapshot, score) = scan_once(&config).await;
        assert_eq!(snapshot.device_count(), 7);
        assert_eq!(score, SecurityScore::Medium);
    }

    #[tokio::test]
    async fn failing_scan_scores_high() {
        let mut config = BandvaktConfig::default();
        config.scanner.kind = ScannerKind::Proc;
        config.scanner.proc_path = "/nonexistent/arp".into();

        let (snapshot, score) = scan_once(&config).await;
        assert_eq!(score, SecurityScore::High);
        assert!(snapshot.error.is_some());
        assert!(snapshot.raw_text.starts_with("Error performing device scan"));
    }

    #[tokio::test]
    async fn synthetic_simulation_validates_hash() {
        let config = BandvaktConfig::default();
        let report = run_simulation_mode(&config, None, Some(20), Some(9), None)
            .await
            .unwrap();
        assert_eq!(report.ticks, 20);

        let again = run_simulation_mode(&config, None, Some(20), Some(9), Some(&report.state_hash))
            .await
            .unwrap();
        assert_eq!(again.state_hash, report.state_hash);

        assert!(matches!(
            run_simulation_mode(&config, None, Some(20), Some(10), Some(&report.state_hash)).await,
            Err(MonitorError::Simulation(_))
        ));
    }

    #[tokio::test]
    async fn scenario_file_is_replayed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "base_threshold: 1000\nsteps:\n  - {{ received: 500, sent: 200 }}\n  - {{ received: 2000, sent: 0 }}\n"
        )
        .unwrap();

        let report = run_simulation_mode(&BandvaktConfig::default(), Some(file.path()), None, None, None)
            .await
            .unwrap();
        assert_eq!(report.samples, 2);
        assert_eq!(report.alert_sequences, vec![2]);
        assert_eq!(report.max_observed, 2000.0);
    }

    #[tokio::test]
    async fn disabled_sink_and_scanner() {
        let mut config = BandvaktConfig::default();
        config.sink.enabled = false;
        config.scanner.kind = ScannerKind::Disabled;
        config.capture.counters = CounterMode::Simulated;

        let capabilities = build_capabilities(&config);
        assert!(capabilities.counters.read().is_ok());
        let result = capabilities.scanner.scan(Duration::from_secs(1)).await.unwrap();
        assert!(result.devices.is_empty());
    }
}
