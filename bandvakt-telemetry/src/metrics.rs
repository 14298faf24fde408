//! ## bandvakt-telemetry::metrics
//! **Prometheus registry for the sampling loop**

use std::time::Duration;

use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Registry};

use bandvakt_core::SampleEvent;

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub ticks: Counter,
    pub skipped_ticks: Counter,
    pub alerts: Counter,
    pub scan_failures: Counter,
    pub sink_failures: Counter,
    pub max_observed: Gauge,
    pub tick_duration: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ticks = Counter::new("bandvakt_ticks_total", "Completed sampling ticks")?;
        let skipped_ticks = Counter::new(
            "bandvakt_ticks_skipped_total",
            "Ticks skipped because the clock did not advance",
        )?;
        let alerts = Counter::new("bandvakt_alerts_total", "Threshold breaches")?;
        let scan_failures = Counter::new(
            "bandvakt_scan_failures_total",
            "Device scans that failed or timed out",
        )?;
        let sink_failures = Counter::new(
            "bandvakt_sink_failures_total",
            "Failed appends to the event sink",
        )?;
        let max_observed = Gauge::new(
            "bandvakt_max_observed_bytes",
            "Highest total throughput seen in the current run (bytes/s)",
        )?;
        let tick_duration = Histogram::with_opts(
            HistogramOpts::new(
                "bandvakt_tick_duration_seconds",
                "Wall time spent in one tick including scan and persistence",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0]),
        )?;

        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(skipped_ticks.clone()))?;
        registry.register(Box::new(alerts.clone()))?;
        registry.register(Box::new(scan_failures.clone()))?;
        registry.register(Box::new(sink_failures.clone()))?;
        registry.register(Box::new(max_observed.clone()))?;
        registry.register(Box::new(tick_duration.clone()))?;

        Ok(Self {
            registry,
            ticks,
            skipped_ticks,
            alerts,
            scan_failures,
            sink_failures,
            max_observed,
            tick_duration,
        })
    }

    pub fn record_tick(&self, event: &SampleEvent, sink_failures: usize, elapsed: Duration) {
        self.ticks.inc();
        if event.is_alert() {
            self.alerts.inc();
        }
        if event.devices.error.is_some() {
            self.scan_failures.inc();
        }
        self.sink_failures.inc_by(sink_failures as f64);
        self.max_observed.set(event.max_observed);
        self.tick_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_skipped(&self) {
        self.skipped_ticks.inc();
    }

    /// The run-scoped gauge starts over when a controller restarts.
    pub fn reset_run(&self) {
        self.max_observed.set(0.0);
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
