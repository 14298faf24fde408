//! Synthetic traffic configuration.
//!
//! Drives the simulator's traffic model, used both by `bandvakt simulate`
//! and by the `simulated` counter mode.
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Seed for deterministic simulation.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of ticks to simulate.
    #[validate(range(min = 1, max = 10_000_000))]
    #[serde(default = "default_ticks")]
    pub ticks: usize,
    /// Devices the simulated scanner reports.
    #[validate(range(max = 10_000))]
    #[serde(default = "default_devices")]
    pub devices: usize,
    /// Traffic model parameters.
    #[validate(nested)]
    #[serde(default)]
    pub traffic: TrafficModelConfig,
}

fn default_seed() -> u64 {
    42
}

fn default_ticks() -> usize {
    60
}

fn default_devices() -> usize {
    4
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            ticks: default_ticks(),
            devices: default_devices(),
            traffic: TrafficModelConfig::default(),
        }
    }
}

/// Baseline throughput with random bursts.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct TrafficModelConfig {
    /// Mean received bytes per second outside bursts.
    #[serde(default = "default_baseline_received")]
    pub baseline_received: u64,
    /// Mean sent bytes per second outside bursts.
    #[serde(default = "default_baseline_sent")]
    pub baseline_sent: u64,
    /// Relative noise around the baseline (0.0 to 1.0).
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// Probability that a given interval is a burst (0.0 to 1.0).
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_burst_probability")]
    pub burst_probability: f64,
    /// Burst throughput as a multiple of the baseline.
    #[validate(range(min = 1.0, max = 10_000.0))]
    #[serde(default = "default_burst_multiplier")]
    pub burst_multiplier: f64,
}

fn default_baseline_received() -> u64 {
    256 * 1024
}
fn default_baseline_sent() -> u64 {
    64 * 1024
}
fn default_jitter() -> f64 {
    0.2
}
fn default_burst_probability() -> f64 {
    0.05
}
fn default_burst_multiplier() -> f64 {
    20.0
}

impl Default for TrafficModelConfig {
    fn default() -> Self {
        Self {
            baseline_received: default_baseline_received(),
            baseline_sent: default_baseline_sent(),
            jitter: default_jitter(),
            burst_probability: default_burst_probability(),
            burst_multiplier: default_burst_multiplier(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SimulatorConfig::default().validate().unwrap();
    }

    #[test]
    fn probability_out_of_range() {
        let mut config = SimulatorConfig::default();
        config.traffic.burst_probability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn device_count_is_bounded() {
        let mut config = SimulatorConfig::default();
        config.devices = 10_000;
        assert!(config.validate().is_ok());
        config.devices = 10_001;
        assert!(config.validate().is_err());
    }
}
