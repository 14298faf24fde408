//! # Virtual Clock for Simulation
//!
//! A deterministic wall clock for simulation and replay. Time only moves
//! when [`VirtualClock::advance`] is called.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use bandvakt_core::Clock;

/// A virtual clock that advances in nanoseconds from a fixed epoch.
/// Clones share the same time.
#[derive(Clone)]
pub struct VirtualClock {
    epoch: DateTime<Utc>,
    offset: Arc<AtomicU64>,
}

impl VirtualClock {
    /// Creates a clock reading `start_ns` nanoseconds past the Unix epoch.
    pub fn new(start_ns: u64) -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::nanoseconds(start_ns as i64))
    }

    pub fn starting_at(epoch: DateTime<Utc>) -> Self {
        Self {
            epoch,
            offset: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Nanoseconds elapsed since the clock was created.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }

    #[inline]
    pub fn advance(&self, ns: u64) {
        self.offset.fetch_add(ns, Ordering::Release);
    }

    pub fn advance_by(&self, step: Duration) {
        self.advance(step.as_nanos() as u64);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        self.epoch + TimeDelta::nanoseconds(self.now_ns() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_initial_value() {
        let clock = VirtualClock::new(100);
        assert_eq!(clock.now_ns(), 0);
        assert_eq!(
            clock.now(),
            DateTime::<Utc>::UNIX_EPOCH + TimeDelta::nanoseconds(100)
        );
    }

    #[test]
    fn test_clock_advance() {
        let clock = VirtualClock::new(0);
        clock.advance(500);
        assert_eq!(clock.now_ns(), 500);
        clock.advance_by(Duration::from_secs(1));
        assert_eq!(clock.now_ns(), 1_000_000_500);
    }

    #[test]
    fn clones_share_time() {
        let clock = VirtualClock::new(0);
        let other = clock.clone();
        clock.advance_by(Duration::from_secs(3));
        assert_eq!(other.now(), clock.now());
    }
}
