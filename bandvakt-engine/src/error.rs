use thiserror::Error;

use bandvakt_config::ConfigError;
use bandvakt_core::events::EventError;
use bandvakt_core::CounterError;
use bandvakt_simulator::SimulationError;
use bandvakt_telemetry::TelemetryError;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Sampling interval must be positive")]
    InvalidInterval,

    #[error("Counter source failed: {0}")]
    Counter(#[from] CounterError),

    #[error("Monitor task failed: {0}")]
    Task(String),

    #[error("Monitor stopped: {0}")]
    Failed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Event bus error: {0}")]
    Bus(#[from] EventError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

impl From<tokio::task::JoinError> for MonitorError {
    fn from(err: tokio::task::JoinError) -> Self {
        MonitorError::Task(err.to_string())
    }
}
