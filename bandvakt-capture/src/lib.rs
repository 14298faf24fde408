//! # bandvakt-capture
//!
//! Live adapters for the host: cumulative interface counters read from
//! `/proc/net/dev` and device scanners over the neighbour table.

pub mod arp;
pub mod netdev;
pub mod scanner;

pub use netdev::{parse_net_dev, InterfaceCounters, ProcNetDevSource};
pub use scanner::{ArpCommandScanner, DisabledScanner, IgnoreList, ProcArpScanner, StaticScanner};
