//! # bandvakt-engine
//!
//! Monitor lifecycle and the runtime entry points shared by frontends.

pub mod controller;
pub mod error;
pub mod runtime;

pub use controller::{
    Capabilities, ControllerOptions, LiveStats, MonitorController, MonitorControllerBuilder,
    MonitorState,
};
pub use error::MonitorError;
// Re-export the runtime functions so frontends can simply do:
pub use runtime::{build_capabilities, run_live_mode, run_simulation_mode, scan_once};
