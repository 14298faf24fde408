use std::path::PathBuf;

use thiserror::Error;

use bandvakt_core::CounterError;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Scenario file not found: {0}")]
    ScenarioNotFound(PathBuf),

    #[error("Invalid scenario: {0}")]
    Scenario(#[from] serde_yaml::Error),

    #[error("Scenario has no steps")]
    EmptyScenario,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Counter source failed: {0}")]
    Counter(#[from] CounterError),

    #[error("State hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}
