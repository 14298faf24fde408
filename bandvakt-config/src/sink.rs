//! Event log destinations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Append-only CSV files for samples and alerts.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct SinkConfig {
    /// Write the CSV files at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// One row per tick: timestamp, received/s, sent/s, max, average.
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// One row per alert: timestamp, reason, received/s, sent/s.
    #[serde(default = "default_alerts_path")]
    pub alerts_path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_history_path() -> PathBuf {
    PathBuf::from("traffic_history.csv")
}

fn default_alerts_path() -> PathBuf {
    PathBuf::from("alerts.csv")
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            history_path: default_history_path(),
            alerts_path: default_alerts_path(),
        }
    }
}
