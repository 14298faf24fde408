//! Sampling and alerting configuration.
//!
//! Defines the dynamic threshold inputs, loop timing and the device-count
//! boundaries of the security score.

use serde::{Deserialize, Deserializer, Serialize};
use validator::{self, Validate};

use crate::ConfigError;

/// Sampling loop and threshold parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Base alert threshold in bytes per second. Accepts sizes such as "1MiB".
    #[validate(range(min = 1.0))]
    #[serde(default = "default_base_threshold", deserialize_with = "deserialize_rate")]
    pub base_threshold: f64,

    /// Seconds between ticks.
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Number of recent samples in the moving average.
    #[validate(range(min = 1, max = 10_000))]
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Fraction of the moving average added to the base threshold.
    #[validate(range(min = 0.0, max = 10.0))]
    #[serde(default = "default_sensitivity")]
    pub sensitivity_factor: f64,

    /// Time budget for one device scan (milliseconds).
    #[validate(range(min = 100, max = 60_000))]
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_ms: u64,

    /// Events buffered per subscriber before the oldest are dropped.
    #[validate(range(min = 1, max = 65_536))]
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

fn default_base_threshold() -> f64 {
    1024.0 * 1024.0
}
fn default_interval() -> u64 {
    1
}
fn default_window_size() -> usize {
    10
}
fn default_sensitivity() -> f64 {
    0.5
}
fn default_scan_timeout() -> u64 {
    3000
}
fn default_subscriber_buffer() -> usize {
    64
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_threshold: default_base_threshold(),
            interval_secs: default_interval(),
            window_size: default_window_size(),
            sensitivity_factor: default_sensitivity(),
            scan_timeout_ms: default_scan_timeout(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

/// Device counts at which the security score drops a level.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct ScoreConfig {
    /// More devices than this scores medium.
    #[validate(range(max = 100_000))]
    #[serde(default = "default_medium_above")]
    pub medium_above: usize,

    /// More devices than this scores low.
    #[validate(range(max = 100_000))]
    #[serde(default = "default_low_above")]
    pub low_above: usize,
}

fn default_medium_above() -> usize {
    5
}
fn default_low_above() -> usize {
    10
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            medium_above: default_medium_above(),
            low_above: default_low_above(),
        }
    }
}

impl ScoreConfig {
    /// The medium boundary must sit below the low boundary.
    pub fn check_order(&self) -> Result<(), ConfigError> {
        if self.medium_above >= self.low_above {
            return Err(ConfigError::Inconsistent(format!(
                "score.medium_above ({}) must be less than score.low_above ({})",
                self.medium_above, self.low_above
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RateValue {
    Num(f64),
    Str(String),
}

/// Accepts plain numbers or human‑friendly sizes (e.g. "512KiB", "1MiB")
/// interpreted per second.
fn deserialize_rate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match RateValue::deserialize(deserializer)? {
        RateValue::Num(n) => Ok(n),
        RateValue::Str(s) => parse_rate(&s).map_err(serde::de::Error::custom),
    }
}

pub(crate) fn parse_rate(input: &str) -> Result<f64, String> {
    let s = input.trim().trim_end_matches("/s");
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (num_part, unit_part) = s.split_at(split);
    let number: f64 = num_part
        .parse()
        .map_err(|e| format!("invalid rate '{input}': {e}"))?;
    let multiplier = match unit_part.trim().to_lowercase().as_str() {
        "" | "b" => 1.0,
        "kb" | "kib" => 1024.0,
        "mb" | "mib" => 1024.0 * 1024.0,
        "gb" | "gib" => 1024.0 * 1024.0 * 1024.0,
        other => return Err(format!("unknown rate unit '{other}'")),
    };
    Ok(number * multiplier)
}
