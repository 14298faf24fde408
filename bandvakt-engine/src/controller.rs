//! Monitor lifecycle: owns the sampling loop task and the subscriber bus.

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use parking_lot::Mutex;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

use bandvakt_core::events::SampleEvent;
use bandvakt_core::sampler::{SinkFailure, TickReport};
use bandvakt_core::{
    Clock, CounterSource, DeviceScanner, EventBus, EventSink, MonitorEvent, SamplerSettings,
    Subscription, SystemClock, TickOutcome, TrafficSampler,
};
use bandvakt_telemetry::{EventLogger, MetricsRecorder};

use crate::error::MonitorError;

/// Whether a sampling loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// Loop timing and sampler tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    pub sampler: SamplerSettings,
    pub interval: Duration,
    /// Events buffered per subscriber before the oldest are dropped.
    pub subscriber_buffer: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            sampler: SamplerSettings::default(),
            interval: Duration::from_secs(1),
            subscriber_buffer: 64,
        }
    }
}

/// The three seams the sampler reads from and writes to.
#[derive(Clone)]
pub struct Capabilities {
    pub counters: Arc<dyn CounterSource>,
    pub scanner: Arc<dyn DeviceScanner>,
    pub sink: Arc<dyn EventSink>,
}

/// Counters for the current run. Reset by every `start`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveStats {
    pub max_observed: f64,
    pub average: f64,
    pub ticks: u64,
    pub skipped: u64,
    pub alerts: u64,
    pub scan_failures: u64,
    pub sink_failures: u64,
    /// Events lost to slow subscribers since the controller was built.
    pub dropped_events: u64,
}

struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct ControllerInner {
    options: ControllerOptions,
    capabilities: Capabilities,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<MetricsRecorder>>,
    bus: EventBus,
    state: Arc<watch::Sender<MonitorState>>,
    stats: Arc<Mutex<LiveStats>>,
    run: AsyncMutex<Option<RunHandle>>,
}

/// Starts, stops and observes one sampling loop.
///
/// Cheaply cloneable. At most one loop runs per controller; a restarted
/// loop gets a freshly primed sampler so downtime never shows up as a
/// traffic spike.
#[derive(Clone)]
pub struct MonitorController {
    inner: Arc<ControllerInner>,
}

/// Builder for [`MonitorController`].
pub struct MonitorControllerBuilder {
    options: ControllerOptions,
    capabilities: Capabilities,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl MonitorControllerBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Fails with [`MonitorError::InvalidInterval`] for a zero interval.
    pub fn build(self) -> Result<MonitorController, MonitorError> {
        if self.options.interval.is_zero() {
            return Err(MonitorError::InvalidInterval);
        }
        let bus = EventBus::with_capacity(self.options.subscriber_buffer)?;
        let (state, _) = watch::channel(MonitorState::Stopped);

        Ok(MonitorController {
            inner: Arc::new(ControllerInner {
                options: self.options,
                capabilities: self.capabilities,
                clock: self.clock,
                metrics: self.metrics,
                bus,
                state: Arc::new(state),
                stats: Arc::new(Mutex::new(LiveStats::default())),
                run: AsyncMutex::new(None),
            }),
        })
    }
}

impl MonitorController {
    pub fn builder(options: ControllerOptions, capabilities: Capabilities) -> MonitorControllerBuilder {
        MonitorControllerBuilder {
            options,
            capabilities,
            clock: Arc::new(SystemClock),
            metrics: None,
        }
    }

    /// Controller on the system clock without metrics.
    pub fn new(options: ControllerOptions, capabilities: Capabilities) -> Result<Self, MonitorError> {
        Self::builder(options, capabilities).build()
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.inner.options
    }

    /// Primes a new sampler and spawns the loop.
    ///
    /// Fails with [`MonitorError::AlreadyRunning`] while a loop is active and
    /// with [`MonitorError::Counter`] if the priming read fails.
    pub async fn start(&self) -> Result<(), MonitorError> {
        let mut run = self.inner.run.lock().await;

        if let Some(previous) = run.take() {
            if *self.inner.state.borrow() == MonitorState::Running {
                *run = Some(previous);
                return Err(MonitorError::AlreadyRunning);
            }
            // the loop ended on its own; reap it
            if let Err(e) = previous.task.await {
                warn!("Previous monitor task ended abnormally: {e}");
            }
        }

        let sampler = TrafficSampler::new(
            self.inner.options.sampler.clone(),
            self.inner.capabilities.counters.clone(),
            self.inner.capabilities.scanner.clone(),
            self.inner.capabilities.sink.clone(),
            self.inner.clock.now(),
        )?;

        *self.inner.stats.lock() = LiveStats::default();
        if let Some(metrics) = &self.inner.metrics {
            metrics.reset_run();
        }

        let cancel = CancellationToken::new();
        let ctx = LoopContext {
            bus: self.inner.bus.clone(),
            clock: self.inner.clock.clone(),
            metrics: self.inner.metrics.clone(),
            stats: self.inner.stats.clone(),
            state: self.inner.state.clone(),
            interval: self.inner.options.interval,
        };

        self.inner.state.send_replace(MonitorState::Running);
        let task = tokio::spawn(
            monitor_loop(sampler, ctx, cancel.clone())
                .instrument(tracing::info_span!("monitor_loop_task")),
        );
        *run = Some(RunHandle { cancel, task });

        info!(interval = ?self.inner.options.interval, "Monitor started");
        Ok(())
    }

    /// Requests the loop to end and waits for the in-flight tick to finish.
    /// Calling it on a stopped controller does nothing.
    pub async fn stop(&self) -> Result<(), MonitorError> {
        let mut run = self.inner.run.lock().await;
        let Some(handle) = run.take() else {
            return Ok(());
        };

        handle.cancel.cancel();
        let joined = handle.task.await;
        self.inner.state.send_replace(MonitorState::Stopped);
        joined?;

        debug!("Monitor stopped");
        Ok(())
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> Subscription {
        self.inner.bus.subscribe()
    }

    pub fn state(&self) -> MonitorState {
        *self.inner.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<MonitorState> {
        self.inner.state.subscribe()
    }

    pub fn stats(&self) -> LiveStats {
        LiveStats {
            dropped_events: self.inner.bus.dropped_events(),
            ..self.inner.stats.lock().clone()
        }
    }

    pub fn max_observed(&self) -> f64 {
        self.inner.stats.lock().max_observed
    }

    pub fn average(&self) -> f64 {
        self.inner.stats.lock().average
    }
}

struct LoopContext {
    bus: EventBus,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<MetricsRecorder>>,
    stats: Arc<Mutex<LiveStats>>,
    state: Arc<watch::Sender<MonitorState>>,
    interval: Duration,
}

/// Ticks once per interval until cancelled or the counters fail. Cancellation
/// is only observed between ticks.
#[instrument(level = "info", name = "monitor_loop", skip_all)]
async fn monitor_loop(mut sampler: TrafficSampler, ctx: LoopContext, cancel: CancellationToken) {
    let mut ticker =
        tokio::time::interval_at(tokio::time::Instant::now() + ctx.interval, ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let terminal = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break MonitorEvent::Stopped,
            _ = ticker.tick() => {}
        }

        let started = Instant::now();
        match sampler.tick(ctx.clock.now()).await {
            Ok(TickOutcome::Sampled(report)) => ctx.publish(report, started.elapsed()).await,
            Ok(TickOutcome::Skipped(skipped)) => {
                debug!(elapsed = skipped.elapsed_secs, "Tick skipped");
                ctx.stats.lock().skipped += 1;
                if let Some(metrics) = &ctx.metrics {
                    metrics.record_skipped();
                }
            }
            Err(e) => {
                error!("Network counters lost, stopping monitor: {e}");
                EventLogger::log_event(
                    "counter_unavailable",
                    vec![KeyValue::new("error", e.to_string())],
                )
                .await;
                break MonitorEvent::Failed {
                    reason: e.to_string(),
                };
            }
        }
    };

    ctx.state.send_replace(MonitorState::Stopped);
    ctx.bus.publish(terminal);
}

impl LoopContext {
    async fn publish(&self, report: TickReport, elapsed: Duration) {
        let TickReport {
            event,
            sink_failures,
        } = report;

        self.update_stats(&event, sink_failures.len());
        if let Some(metrics) = &self.metrics {
            metrics.record_tick(&event, sink_failures.len(), elapsed);
        }
        log_security_events(&event, &sink_failures).await;

        for failure in sink_failures {
            self.bus.publish(MonitorEvent::SinkWarning(failure));
        }
        self.bus.publish(MonitorEvent::Sample(Arc::new(event)));
    }

    fn update_stats(&self, event: &SampleEvent, sink_failures: usize) {
        let mut stats = self.stats.lock();
        stats.ticks += 1;
        stats.max_observed = event.max_observed;
        stats.average = event.average;
        stats.sink_failures += sink_failures as u64;
        if event.is_alert() {
            stats.alerts += 1;
        }
        if event.devices.error.is_some() {
            stats.scan_failures += 1;
        }
    }
}

async fn log_security_events(event: &SampleEvent, sink_failures: &[SinkFailure]) {
    if let Some(alert) = &event.alert {
        warn!(
            seq = event.sequence,
            received = alert.received_per_sec,
            sent = alert.sent_per_sec,
            threshold = event.dynamic_threshold,
            "{}",
            alert.reason
        );
        EventLogger::log_event(
            "traffic_alert",
            vec![
                KeyValue::new("sequence", event.sequence as i64),
                KeyValue::new("reason", alert.reason.clone()),
                KeyValue::new("received_per_sec", alert.received_per_sec),
                KeyValue::new("sent_per_sec", alert.sent_per_sec),
                KeyValue::new("dynamic_threshold", event.dynamic_threshold),
            ],
        )
        .await;
    }

    if let Some(error) = &event.devices.error {
        EventLogger::log_event(
            "device_scan_failed",
            vec![
                KeyValue::new("sequence", event.sequence as i64),
                KeyValue::new("error", error.clone()),
            ],
        )
        .await;
    }

    for failure in sink_failures {
        EventLogger::log_event(
            "sink_write_failed",
            vec![
                KeyValue::new("sequence", failure.sequence as i64),
                KeyValue::new("stream", format!("{:?}", failure.stream).to_lowercase()),
                KeyValue::new("error", failure.error.clone()),
            ],
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandvakt_core::{ScoreThresholds, SecurityScore};
    use bandvakt_simulator::{MemorySink, ScanBehavior, ScriptedCounters, ScriptedScanner};
    use chrono::{DateTime, TimeDelta, Utc};

    /// Wall clock that follows tokio's (possibly paused) time.
    struct TokioClock {
        origin: tokio::time::Instant,
    }

    impl TokioClock {
        fn new() -> Self {
            Self {
                origin: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = self.origin.elapsed();
            DateTime::<Utc>::UNIX_EPOCH + TimeDelta::nanoseconds(elapsed.as_nanos() as i64)
        }
    }

    fn options() -> ControllerOptions {
        ControllerOptions {
            sampler: SamplerSettings {
                base_threshold: 1000.0,
                score: ScoreThresholds::default(),
                ..SamplerSettings::default()
            },
            interval: Duration::from_secs(1),
            subscriber_buffer: 64,
        }
    }

    fn controller(
        counters: Arc<dyn CounterSource>,
        scanner: Arc<dyn DeviceScanner>,
        sink: Arc<dyn EventSink>,
    ) -> MonitorController {
        MonitorController::builder(
            options(),
            Capabilities {
                counters,
                scanner,
                sink,
            },
        )
        .clock(Arc::new(TokioClock::new()))
        .build()
        .unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    async fn next_sample(sub: &mut Subscription) -> Arc<SampleEvent> {
        loop {
            match sub.recv().await.unwrap() {
                MonitorEvent::Sample(event) => return event,
                MonitorEvent::SinkWarning(_) => continue,
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spike_is_alerted_in_order() {
        let counters = Arc::new(ScriptedCounters::from_deltas([(500, 200), (2000, 0)]));
        let sink = Arc::new(MemorySink::new());
        let monitor = controller(counters, Arc::new(ScriptedScanner::fixed(3)), sink.clone());

        let mut sub = monitor.subscribe();
        monitor.start().await.unwrap();
        assert_eq!(monitor.state(), MonitorState::Running);

        let first = next_sample(&mut sub).await;
        assert_eq!(first.sequence, 1);
        assert_close(first.sample.total_per_sec, 700.0);
        assert!(!first.is_alert());
        assert_eq!(first.security_score, SecurityScore::High);

        let second = next_sample(&mut sub).await;
        assert_eq!(second.sequence, 2);
        assert!(second.is_alert());
        assert_close(second.dynamic_threshold, 1675.0);
        assert_close(second.max_observed, 2000.0);

        monitor.stop().await.unwrap();
        assert_eq!(monitor.state(), MonitorState::Stopped);

        let stats = monitor.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.alerts, 1);
        assert_close(stats.max_observed, 2000.0);
        assert_eq!(sink.alerts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let monitor = controller(
            Arc::new(ScriptedCounters::from_deltas([])),
            Arc::new(ScriptedScanner::fixed(0)),
            Arc::new(MemorySink::new()),
        );
        monitor.start().await.unwrap();
        assert!(matches!(
            monitor.start().await,
            Err(MonitorError::AlreadyRunning)
        ));
        monitor.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_terminal() {
        let monitor = controller(
            Arc::new(ScriptedCounters::from_deltas([(1, 1)])),
            Arc::new(ScriptedScanner::fixed(0)),
            Arc::new(MemorySink::new()),
        );
        monitor.stop().await.unwrap();

        let mut sub = monitor.subscribe();
        monitor.start().await.unwrap();
        next_sample(&mut sub).await;
        monitor.stop().await.unwrap();
        monitor.stop().await.unwrap();

        assert!(matches!(sub.recv().await, Some(MonitorEvent::Stopped)));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_reseeds_sampler() {
        let counters = Arc::new(ScriptedCounters::from_deltas([
            (700, 0),
            // accumulated while stopped
            (1_000_000, 0),
            (700, 0),
        ]));
        let monitor = controller(
            counters,
            Arc::new(ScriptedScanner::fixed(0)),
            Arc::new(MemorySink::new()),
        );

        let mut sub = monitor.subscribe();
        monitor.start().await.unwrap();
        assert_close(next_sample(&mut sub).await.sample.total_per_sec, 700.0);
        monitor.stop().await.unwrap();

        monitor.start().await.unwrap();
        let first_after_restart = loop {
            match sub.recv().await.unwrap() {
                MonitorEvent::Sample(event) => break event,
                _ => continue,
            }
        };
        assert_eq!(first_after_restart.sequence, 1);
        assert_close(first_after_restart.sample.total_per_sec, 700.0);
        assert_eq!(monitor.stats().ticks, 1);
        monitor.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn priming_failure_surfaces_from_start() {
        struct Dead;
        impl CounterSource for Dead {
            fn read(&self) -> Result<bandvakt_core::events::CounterSnapshot, bandvakt_core::CounterError> {
                Err(bandvakt_core::CounterError::Unavailable("no interfaces".into()))
            }
        }

        let monitor = controller(
            Arc::new(Dead),
            Arc::new(ScriptedScanner::fixed(0)),
            Arc::new(MemorySink::new()),
        );
        assert!(matches!(
            monitor.start().await,
            Err(MonitorError::Counter(_))
        ));
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn counter_loss_ends_loop_with_failure() {
        let counters = Arc::new(ScriptedCounters::from_deltas([(10, 10)]).fail_when_exhausted());
        let monitor = controller(
            counters,
            Arc::new(ScriptedScanner::fixed(0)),
            Arc::new(MemorySink::new()),
        );

        let mut sub = monitor.subscribe();
        let mut states = monitor.state_changes();
        monitor.start().await.unwrap();

        next_sample(&mut sub).await;
        match sub.recv().await {
            Some(MonitorEvent::Failed { reason }) => assert!(reason.contains("script exhausted")),
            other => panic!("expected failure, got {other:?}"),
        }
        // state is already settled when the terminal event arrives
        assert_eq!(monitor.state(), MonitorState::Stopped);
        states
            .wait_for(|s| *s == MonitorState::Stopped)
            .await
            .unwrap();

        // restarting is allowed and re-reads the counters
        assert!(matches!(
            monitor.start().await,
            Err(MonitorError::Counter(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn scan_timeout_and_sink_failure_are_not_fatal() {
        let scanner = Arc::new(ScriptedScanner::fixed(12).then(ScanBehavior::Stall));
        let sink = Arc::new(MemorySink::new());
        sink.fail_samples(true);
        let monitor = controller(
            Arc::new(ScriptedCounters::from_deltas([(100, 100), (100, 100)])),
            scanner,
            sink.clone(),
        );

        let mut sub = monitor.subscribe();
        monitor.start().await.unwrap();

        assert!(matches!(
            sub.recv().await,
            Some(MonitorEvent::SinkWarning(_))
        ));
        let first = next_sample(&mut sub).await;
        assert_eq!(first.security_score, SecurityScore::High);
        assert!(first.devices.error.is_some());

        assert!(matches!(
            sub.recv().await,
            Some(MonitorEvent::SinkWarning(_))
        ));
        let second = next_sample(&mut sub).await;
        assert_eq!(second.security_score, SecurityScore::Low);
        assert!(second.devices.error.is_none());
        monitor.stop().await.unwrap();

        let stats = monitor.stats();
        assert_eq!(stats.scan_failures, 1);
        assert_eq!(stats.sink_failures, 2);
        assert!(sink.samples().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_rejected() {
        let result = MonitorController::new(
            ControllerOptions {
                interval: Duration::ZERO,
                ..options()
            },
            Capabilities {
                counters: Arc::new(ScriptedCounters::from_deltas([])),
                scanner: Arc::new(ScriptedScanner::fixed(0)),
                sink: Arc::new(MemorySink::new()),
            },
        );
        assert!(matches!(result, Err(MonitorError::InvalidInterval)));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_in_flight_tick() {
        let scanner = Arc::new(ScriptedScanner::fixed(0).then(ScanBehavior::Stall));
        let monitor = controller(
            Arc::new(ScriptedCounters::from_deltas([(100, 100), (100, 100), (100, 100)])),
            scanner,
            Arc::new(MemorySink::new()),
        );

        let mut sub = monitor.subscribe();
        let began = tokio::time::Instant::now();
        monitor.start().await.unwrap();

        // first tick fires at 1s and its scan stalls until the 3s budget runs out
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(sub.try_recv().is_none());
        monitor.stop().await.unwrap();
        assert!(began.elapsed() >= Duration::from_secs(4));

        match sub.try_recv() {
            Some(MonitorEvent::Sample(event)) => {
                assert_eq!(event.sequence, 1);
                assert!(event.devices.error.is_some());
            }
            other => panic!("expected the in-flight sample, got {other:?}"),
        }
        assert!(matches!(sub.try_recv(), Some(MonitorEvent::Stopped)));
        assert!(sub.try_recv().is_none());
        assert_eq!(monitor.stats().ticks, 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(sub.try_recv().is_none());
        assert_eq!(monitor.stats().ticks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn metrics_follow_ticks() {
        let metrics = Arc::new(MetricsRecorder::new().unwrap());
        let monitor = MonitorController::builder(
            options(),
            Capabilities {
                counters: Arc::new(ScriptedCounters::from_deltas([(500, 200), (2000, 0)])),
                scanner: Arc::new(ScriptedScanner::fixed(3)),
                sink: Arc::new(MemorySink::new()),
            },
        )
        .clock(Arc::new(TokioClock::new()))
        .metrics(metrics.clone())
        .build()
        .unwrap();

        let mut sub = monitor.subscribe();
        monitor.start().await.unwrap();
        next_sample(&mut sub).await;
        next_sample(&mut sub).await;
        monitor.stop().await.unwrap();

        assert_eq!(metrics.ticks.get(), 2.0);
        assert_eq!(metrics.alerts.get(), 1.0);
        assert_close(metrics.max_observed.get(), 2000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_subscriber_does_not_block() {
        let monitor = MonitorController::builder(
            ControllerOptions {
                subscriber_buffer: 2,
                ..options()
            },
            Capabilities {
                counters: Arc::new(ScriptedCounters::from_deltas([])),
                scanner: Arc::new(ScriptedScanner::fixed(0)),
                sink: Arc::new(MemorySink::new()),
            },
        )
        .clock(Arc::new(TokioClock::new()))
        .build()
        .unwrap();

        let mut slow = monitor.subscribe();
        let mut fast = monitor.subscribe();
        monitor.start().await.unwrap();
        for _ in 0..6 {
            next_sample(&mut fast).await;
        }
        monitor.stop().await.unwrap();

        let mut seen = Vec::new();
        while let Some(event) = slow.try_recv() {
            if let Some(sample) = event.as_sample() {
                seen.push(sample.sequence);
            }
        }
        assert!(slow.dropped() > 0);
        assert!(monitor.stats().dropped_events > 0);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}
