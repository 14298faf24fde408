//! # bandvakt-core
//!
//! Sampling and alerting engine for host network throughput.
//!
//! Each tick reads cumulative byte counters, derives per-second rates,
//! smooths them over a bounded window, compares them with a dynamic
//! threshold and correlates the result with a scan of visible devices.
//!
//! ### Key Submodules:
//! - `sampler`: per-tick state machine and threshold logic
//! - `events`: output types and the subscriber bus
//! - `capability`: counter, scanner and sink seams
//! - `score`: device-count heuristic
//! - `time`: wall-clock abstraction

pub mod capability;
pub mod error;
pub mod events;
pub mod sampler;
pub mod score;
pub mod time;
pub mod window;

pub mod prelude {
    pub use crate::capability::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::sampler::*;
    pub use crate::score::*;
    pub use crate::time::*;
    pub use crate::window::*;
}

pub use capability::{CounterSource, DeviceScanner, EventSink, NullSink};
pub use error::{CounterError, ScanError, SinkError};
pub use events::{EventBus, MonitorEvent, SampleEvent, Subscription};
pub use sampler::{SamplerSettings, TickOutcome, TrafficSampler};
pub use score::{ScoreThresholds, SecurityScore, SecurityScorer};
pub use time::{Clock, SystemClock};
