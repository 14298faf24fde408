use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use bandvakt_config::BandvaktConfig;
use bandvakt_core::MonitorEvent;
use bandvakt_engine::{run_live_mode, run_simulation_mode, scan_once};
use bandvakt_telemetry::{EventLogger, MetricsRecorder};

#[derive(Parser)]
#[command(name = "bandvakt", version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/bandvakt.yaml plus BANDVAKT_* overrides
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Monitor host throughput until interrupted
    Run(RunArgs),
    /// Run deterministic simulation (or replay if a scenario file is provided)
    Simulate(SimulateArgs),
    /// Scan the local network once and print the security score
    Scan,
    /// Print the effective configuration as YAML
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Seconds between samples (overrides monitor.interval_secs)
    #[arg(short, long)]
    pub interval: Option<u64>,
    /// Print Prometheus metrics on exit
    #[arg(long)]
    pub print_metrics: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SimulateArgs {
    /// Optional scenario file to replay; if not provided, synthetic traffic is simulated.
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,
    /// Number of ticks to simulate
    #[arg(long)]
    pub ticks: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub validate_hash: Option<String>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<BandvaktConfig> {
    match path {
        Some(path) => BandvaktConfig::load_from_path(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => BandvaktConfig::load().context("failed to load configuration"),
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_ref())?;
    EventLogger::init(&config.telemetry.log_level, config.telemetry.json_logs)?;

    match cli.command {
        Commands::Run(args) => {
            if let Some(interval) = args.interval {
                config.monitor.interval_secs = interval;
                config.check().context("invalid --interval")?;
            }
            run_live(&config, &args).await
        }
        Commands::Simulate(args) => simulate(&config, args).await,
        Commands::Scan => {
            let (snapshot, score) = scan_once(&config).await;
            println!("{}", snapshot.raw_text.trim_end());
            println!("Devices: {}, Security score: {}", snapshot.device_count(), score);
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

async fn run_live(config: &BandvaktConfig, args: &RunArgs) -> anyhow::Result<()> {
    let metrics = if config.telemetry.metrics {
        Some(Arc::new(MetricsRecorder::new()?))
    } else {
        None
    };

    let stats = run_live_mode(config, metrics.clone(), print_event)
        .await
        .context("monitor stopped with an error")?;
    info!(
        ticks = stats.ticks,
        alerts = stats.alerts,
        max_observed = stats.max_observed,
        "Monitor finished"
    );

    if args.print_metrics {
        match &metrics {
            Some(metrics) => print!("{}", metrics.gather_metrics()?),
            None => warn!("Metrics are disabled in the configuration"),
        }
    }
    Ok(())
}

fn print_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::Sample(sample) => println!("{}\n", sample.summary()),
        MonitorEvent::SinkWarning(failure) => eprintln!(
            "warning: could not persist {:?} record {}: {}",
            failure.stream, failure.sequence, failure.error
        ),
        MonitorEvent::Failed { reason } => eprintln!("error: {reason}"),
        MonitorEvent::Stopped => {}
    }
}

async fn simulate(config: &BandvaktConfig, args: SimulateArgs) -> anyhow::Result<()> {
    let report = run_simulation_mode(
        config,
        args.scenario.as_deref(),
        args.ticks,
        args.seed,
        args.validate_hash.as_deref(),
    )
    .await
    .context("simulation failed")?;

    println!(
        "Ticks: {} (skipped {}), alerts: {}, scan failures: {}",
        report.ticks, report.skipped, report.alerts, report.scan_failures
    );
    println!(
        "Max traffic: {:.2} bytes/s, Average: {:.2} bytes/s",
        report.max_observed, report.average
    );
    println!("State hash: {}", report.state_hash);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_simulate() {
        let cli = Cli::try_parse_from([
            "bandvakt",
            "simulate",
            "--ticks",
            "30",
            "--seed",
            "7",
            "--config",
            "custom.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.ticks, Some(30));
                assert_eq!(args.seed, Some(7));
                assert!(args.scenario.is_none());
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn parses_run_and_scan() {
        let cli = Cli::try_parse_from(["bandvakt", "run", "-i", "5", "--print-metrics"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.interval, Some(5));
                assert!(args.print_metrics);
            }
            _ => panic!("expected run"),
        }
        assert!(matches!(
            Cli::try_parse_from(["bandvakt", "scan"]).unwrap().command,
            Commands::Scan
        ));
    }

    #[test]
    fn missing_config_file_has_context() {
        let err = load_config(Some(&PathBuf::from("/no/such/bandvakt.yaml"))).unwrap_err();
        assert!(err.to_string().contains("/no/such/bandvakt.yaml"));
    }
}
