//! Counter acquisition configuration.
//!
//! Selects where cumulative byte counters come from:
//! - Live kernel statistics (`/proc/net/dev`)
//! - Synthetic traffic from the simulator

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Counter source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CounterMode {
    #[default]
    Procfs,
    Simulated,
}

/// Counter acquisition configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Counter source (procfs, simulated).
    #[serde(default)]
    pub counters: CounterMode,

    /// Kernel interface statistics table.
    #[serde(default = "default_proc_path")]
    pub proc_path: PathBuf,

    /// Interfaces to sum. Empty means every interface.
    #[validate(custom(function = validation::validate_interfaces))]
    #[serde(default)]
    pub interfaces: Vec<String>,

    /// Leave `lo` out of the totals.
    #[serde(default)]
    pub exclude_loopback: bool,
}

fn default_proc_path() -> PathBuf {
    PathBuf::from("/proc/net/dev")
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            counters: CounterMode::default(),
            proc_path: default_proc_path(),
            interfaces: Vec::new(),
            exclude_loopback: false,
        }
    }
}
