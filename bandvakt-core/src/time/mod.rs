//! ## bandvakt-core::time
//! **Wall-clock abstraction**
//!
//! Ticks are stamped with wall-clock time, which can jump. The sampler never
//! reads the clock itself; the loop driving it passes `now` in, so the
//! simulator can substitute a virtual clock.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Host wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Seconds between two instants as a float. Negative when `to` precedes `from`.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}
