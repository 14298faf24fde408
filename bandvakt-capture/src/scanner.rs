//! Device scanners backing the security score.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use tokio::process::Command;
use tracing::{debug, instrument};

use bandvakt_core::events::{DeviceEntry, DeviceScanResult};
use bandvakt_core::{DeviceScanner, ScanError};

use crate::arp::{parse_arp_output, parse_proc_arp};

/// Drops devices whose address falls inside any of the ignored ranges.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    networks: Vec<IpNetwork>,
}

impl IgnoreList {
    pub fn new(networks: Vec<IpNetwork>) -> Self {
        Self { networks }
    }

    pub fn contains(&self, address: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(address))
    }

    fn retain(&self, devices: &mut Vec<DeviceEntry>) {
        if !self.networks.is_empty() {
            devices.retain(|d| !self.contains(d.address));
        }
    }
}

/// Runs a neighbour table command (`arp -a` by default) and parses its
/// standard output. The child is killed if the scan outlives `timeout`.
#[derive(Debug, Clone)]
pub struct ArpCommandScanner {
    command: String,
    args: Vec<String>,
    ignore: IgnoreList,
}

impl ArpCommandScanner {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ignore: IgnoreList::default(),
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreList) -> Self {
        self.ignore = ignore;
        self
    }
}

impl Default for ArpCommandScanner {
    fn default() -> Self {
        Self::new("arp", vec!["-a".into()])
    }
}

#[async_trait]
impl DeviceScanner for ArpCommandScanner {
    #[instrument(level = "debug", skip(self), fields(command = %self.command))]
    async fn scan(&self, timeout: Duration) -> Result<DeviceScanResult, ScanError> {
        let child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScanError::Command(format!("{}: {e}", self.command)))?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ScanError::Timeout(timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::Command(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let raw_text = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut devices = parse_arp_output(&raw_text);
        self.ignore.retain(&mut devices);
        debug!(devices = devices.len(), "Neighbour table scanned");

        Ok(DeviceScanResult { devices, raw_text })
    }
}

/// Reads the kernel neighbour table file without spawning a process.
#[derive(Debug, Clone)]
pub struct ProcArpScanner {
    path: PathBuf,
    ignore: IgnoreList,
}

impl ProcArpScanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ignore: IgnoreList::default(),
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreList) -> Self {
        self.ignore = ignore;
        self
    }
}

#[async_trait]
impl DeviceScanner for ProcArpScanner {
    async fn scan(&self, timeout: Duration) -> Result<DeviceScanResult, ScanError> {
        let raw_text = tokio::time::timeout(timeout, tokio::fs::read_to_string(&self.path))
            .await
            .map_err(|_| ScanError::Timeout(timeout))??;

        let mut devices = parse_proc_arp(&raw_text);
        self.ignore.retain(&mut devices);
        Ok(DeviceScanResult { devices, raw_text })
    }
}

/// Reports a fixed list of addresses.
#[derive(Debug, Clone, Default)]
pub struct StaticScanner {
    addresses: Vec<IpAddr>,
}

impl StaticScanner {
    pub fn new(addresses: Vec<IpAddr>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl DeviceScanner for StaticScanner {
    async fn scan(&self, _timeout: Duration) -> Result<DeviceScanResult, ScanError> {
        let devices: Vec<DeviceEntry> = self
            .addresses
            .iter()
            .map(|&address| DeviceEntry {
                address,
                mac: None,
                interface: None,
            })
            .collect();
        let raw_text = self
            .addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(DeviceScanResult { devices, raw_text })
    }
}

/// Always reports an empty network.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledScanner;

#[async_trait]
impl DeviceScanner for DisabledScanner {
    async fn scan(&self, _timeout: Duration) -> Result<DeviceScanResult, ScanError> {
        Ok(DeviceScanResult::default())
    }
}
