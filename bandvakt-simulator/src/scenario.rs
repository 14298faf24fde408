//! Scripted scenarios.
//!
//! ```yaml
//! name: spike
//! base_threshold: 1000
//! steps:
//!   - { received: 500, sent: 200 }
//!   - { received: 2000, sent: 0, scan: stall }
//!   - { received: 0, sent: 0, advance_ms: 0 }
//! expected_hash: "…"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use bandvakt_core::SamplerSettings;

use crate::error::SimulationError;
use crate::fakes::ScanBehavior;

fn default_interval_ms() -> u64 {
    1000
}

fn default_devices() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,

    /// Virtual time between steps unless a step overrides it.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Devices reported when a step does not script the scan.
    #[serde(default = "default_devices")]
    pub devices: usize,

    #[serde(default)]
    pub base_threshold: Option<f64>,
    #[serde(default)]
    pub sensitivity_factor: Option<f64>,
    #[serde(default)]
    pub window_size: Option<usize>,

    pub steps: Vec<ScenarioStep>,

    /// Hex state hash the run must reproduce.
    #[serde(default)]
    pub expected_hash: Option<String>,
}

/// Bytes moved during one interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    #[serde(default)]
    pub received: u64,
    #[serde(default)]
    pub sent: u64,
    /// Overrides the scenario interval for this step. Zero yields a skipped tick.
    #[serde(default)]
    pub advance_ms: Option<u64>,
    #[serde(default)]
    pub scan: Option<ScanBehavior>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SimulationError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SimulationError::ScenarioNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, SimulationError> {
        let scenario: Scenario = serde_yaml::from_str(content)?;
        if scenario.steps.is_empty() {
            return Err(SimulationError::EmptyScenario);
        }
        Ok(scenario)
    }

    /// Applies the scenario's overrides on top of `base`.
    pub fn settings(&self, base: &SamplerSettings) -> SamplerSettings {
        let mut settings = base.clone();
        if let Some(threshold) = self.base_threshold {
            settings.base_threshold = threshold;
        }
        if let Some(sensitivity) = self.sensitivity_factor {
            settings.sensitivity_factor = sensitivity;
        }
        if let Some(window) = self.window_size {
            settings.window_size = window;
        }
        settings
    }

    /// How long virtual time advances before each step.
    pub fn advances(&self) -> Vec<u64> {
        self.steps
            .iter()
            .map(|s| s.advance_ms.unwrap_or(self.interval_ms))
            .collect()
    }
}
