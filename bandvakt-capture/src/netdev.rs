//! Cumulative byte counters from the kernel interface table.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{instrument, trace};

use bandvakt_core::{CounterError, CounterSource};
use bandvakt_core::events::CounterSnapshot;

const LOOPBACK: &str = "lo";

/// Byte totals for one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub received_bytes: u64,
    pub sent_bytes: u64,
}

/// Parses `/proc/net/dev`. The first two lines are headers; each remaining
/// line is `iface: rx_bytes rx_packets ... tx_bytes ...` with `tx_bytes` in
/// the ninth column.
pub fn parse_net_dev(content: &str) -> Result<Vec<InterfaceCounters>, CounterError> {
    let mut interfaces = Vec::new();

    for line in content.lines().skip(2) {
        if line.trim().is_empty() {
            continue;
        }
        let (name, stats) = line
            .split_once(':')
            .ok_or_else(|| CounterError::Malformed(format!("missing ':' in '{line}'")))?;
        let fields: Vec<&str> = stats.split_whitespace().collect();
        if fields.len() < 9 {
            return Err(CounterError::Malformed(format!(
                "expected at least 9 columns for '{}', found {}",
                name.trim(),
                fields.len()
            )));
        }

        let parse = |value: &str| {
            value
                .parse::<u64>()
                .map_err(|e| CounterError::Malformed(format!("bad counter '{value}': {e}")))
        };

        interfaces.push(InterfaceCounters {
            name: name.trim().to_string(),
            received_bytes: parse(fields[0])?,
            sent_bytes: parse(fields[8])?,
        });
    }

    Ok(interfaces)
}

/// Counter source summing interfaces from a `/proc/net/dev`-style file.
#[derive(Debug, Clone)]
pub struct ProcNetDevSource {
    path: PathBuf,
    interfaces: Vec<String>,
    exclude_loopback: bool,
}

impl ProcNetDevSource {
    /// Sums every interface listed in `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interfaces: Vec::new(),
            exclude_loopback: false,
        }
    }

    /// Restricts the sum to the named interfaces. Empty means all.
    pub fn with_interfaces(mut self, interfaces: Vec<String>) -> Self {
        self.interfaces = interfaces;
        self
    }

    pub fn exclude_loopback(mut self, exclude: bool) -> Self {
        self.exclude_loopback = exclude;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn selected(&self, name: &str) -> bool {
        if self.exclude_loopback && name == LOOPBACK {
            return false;
        }
        self.interfaces.is_empty() || self.interfaces.iter().any(|i| i == name)
    }
}

impl CounterSource for ProcNetDevSource {
    #[instrument(level = "trace", skip(self), fields(path = %self.path.display()))]
    fn read(&self) -> Result<CounterSnapshot, CounterError> {
        // procfs reads are served from memory and never block on a device,
        // so the sync read stays on the tick task.
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            CounterError::Unavailable(format!("{}: {e}", self.path.display()))
        })?;

        let mut received = 0u64;
        let mut sent = 0u64;
        let mut matched = 0usize;
        for iface in parse_net_dev(&content)? {
            if !self.selected(&iface.name) {
                continue;
            }
            trace!(
                iface = %iface.name,
                rx = iface.received_bytes,
                tx = iface.sent_bytes,
                "Interface counters"
            );
            received = received.wrapping_add(iface.received_bytes);
            sent = sent.wrapping_add(iface.sent_bytes);
            matched += 1;
        }

        if matched == 0 {
            return Err(CounterError::Unavailable(format!(
                "no matching interfaces in {}",
                self.path.display()
            )));
        }

        Ok(CounterSnapshot::new(received, sent, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0: 52000     400    0    0    0     0          0         0    31000     300    0    0    0     0       0          0
 wlan0:   700       7    0    0    0     0          0         0      300       3    0    0    0     0       0          0
";

    fn source_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_table() {
        let ifaces = parse_net_dev(SAMPLE).unwrap();
        assert_eq!(ifaces.len(), 3);
        assert_eq!(
            ifaces[1],
            InterfaceCounters {
                name: "eth0".into(),
                received_bytes: 52000,
                sent_bytes: 31000,
            }
        );
    }

    #[test]
    fn rejects_truncated_line() {
        let broken = "h1\nh2\n  eth0: 1 2 3\n";
        assert!(matches!(
            parse_net_dev(broken),
            Err(CounterError::Malformed(_))
        ));
    }

    #[test]
    fn sums_all_interfaces_by_default() {
        let file = source_file(SAMPLE);
        let snapshot = ProcNetDevSource::new(file.path()).read().unwrap();
        assert_eq!(snapshot.received_bytes, 53700);
        assert_eq!(snapshot.sent_bytes, 32300);
    }

    #[test]
    fn filters_interfaces() {
        let file = source_file(SAMPLE);
        let snapshot = ProcNetDevSource::new(file.path())
            .exclude_loopback(true)
            .read()
            .unwrap();
        assert_eq!(snapshot.received_bytes, 52700);

        let snapshot = ProcNetDevSource::new(file.path())
            .with_interfaces(vec!["wlan0".into()])
            .read()
            .unwrap();
        assert_eq!(snapshot.received_bytes, 700);
        assert_eq!(snapshot.sent_bytes, 300);
    }

    #[test]
    fn no_match_is_unavailable() {
        let file = source_file(SAMPLE);
        let result = ProcNetDevSource::new(file.path())
            .with_interfaces(vec!["eth9".into()])
            .read();
        assert!(matches!(result, Err(CounterError::Unavailable(_))));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let result = ProcNetDevSource::new("/nonexistent/net/dev").read();
        assert!(matches!(result, Err(CounterError::Unavailable(_))));
    }
}
