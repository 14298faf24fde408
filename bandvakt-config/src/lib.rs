//! # Bandvakt Configuration System
//!
//! Hierarchical configuration for the bandwidth monitor.
//!
//! ## Features
//! - **Unified Configuration**: Single source of truth across all components
//! - **Validation**: Runtime validation of every tunable before the loop starts
//! - **Environment Awareness**: Per-environment overrides and `BANDVAKT_*` variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod capture;
mod error;
mod monitor;
mod scanner;
mod simulator;
mod sink;
mod telemetry;
mod validation;

pub use capture::{CaptureConfig, CounterMode};
pub use error::ConfigError;
pub use monitor::{MonitorConfig, ScoreConfig};
pub use scanner::{ScannerConfig, ScannerKind};
pub use simulator::{SimulatorConfig, TrafficModelConfig};
pub use sink::SinkConfig;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/bandvakt.yaml";
const ENV_PREFIX: &str = "BANDVAKT_";

/// Top‑level configuration container for all Bandvakt components.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct BandvaktConfig {
    /// Sampling loop and threshold parameters.
    #[validate(nested)]
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Security score boundaries.
    #[validate(nested)]
    #[serde(default)]
    pub score: ScoreConfig,

    /// Counter source parameters.
    #[validate(nested)]
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Device scanner parameters.
    #[validate(nested)]
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Event log destinations.
    #[validate(nested)]
    #[serde(default)]
    pub sink: SinkConfig,

    /// Logging and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Synthetic traffic for simulation and the `simulated` counter mode.
    #[validate(nested)]
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl BandvaktConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/bandvakt.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<environment>.yaml` - Environment‑specific overrides
    ///    (`BANDVAKT_ENV`, default `production`).
    /// 4. `BANDVAKT_*` environment variables, `__` separating nested keys.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(BandvaktConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("BANDVAKT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::finish(figment)
    }

    /// Load configuration from a specific path, still honouring
    /// `BANDVAKT_*` overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(
                path.to_string_lossy().to_string(),
            )));
        }

        let figment =
            Figment::from(Serialized::defaults(BandvaktConfig::default())).merge(Yaml::file(path));
        Self::finish(figment)
    }

    /// Runs every check `load` applies. Useful after programmatic edits.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.score.check_order()
    }

    /// Effective configuration rendered as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["ENV"]).split("__"))
            .extract()?;
        config.check()?;
        Ok(config)
    }
}
