//! Device discovery configuration.

use std::net::IpAddr;
use std::path::PathBuf;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Which device scanner backs the security score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    /// Run the neighbour table command (`arp -a`).
    #[default]
    Arp,
    /// Read the kernel neighbour table directly.
    Proc,
    /// Report a fixed device list.
    Static,
    /// Report no devices.
    Disabled,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct ScannerConfig {
    #[serde(default)]
    pub kind: ScannerKind,

    /// Program used by the `arp` scanner.
    #[validate(custom(function = validation::validate_command))]
    #[serde(default = "default_command")]
    pub command: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Neighbour table read by the `proc` scanner.
    #[serde(default = "default_proc_path")]
    pub proc_path: PathBuf,

    /// Devices inside these ranges are not counted.
    #[validate(custom(function = validation::validate_cidr_list))]
    #[serde(default)]
    pub ignore: Vec<IpNetwork>,

    /// Devices reported by the `static` scanner.
    #[serde(default)]
    pub static_devices: Vec<IpAddr>,
}

fn default_command() -> String {
    "arp".into()
}

fn default_args() -> Vec<String> {
    vec!["-a".into()]
}

fn default_proc_path() -> PathBuf {
    PathBuf::from("/proc/net/arp")
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            kind: ScannerKind::default(),
            command: default_command(),
            args: default_args(),
            proc_path: default_proc_path(),
            ignore: Vec::new(),
            static_devices: Vec::new(),
        }
    }
}
