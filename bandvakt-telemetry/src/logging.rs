//! ## bandvakt-telemetry::logging
//! **Subscriber setup and structured security events**
//!
//! Ordinary diagnostics go through the `tracing` macros. Alerts, scan
//! failures and sink failures are additionally emitted as security events
//! carrying OpenTelemetry attributes so they can be filtered as one stream.

use opentelemetry::KeyValue;
use tracing::{info_span, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use crate::TelemetryError;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. `RUST_LOG` takes precedence over
    /// `level`. Fails if a subscriber is already installed.
    pub fn init(level: &str, json: bool) -> Result<(), TelemetryError> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let builder = fmt().with_env_filter(filter).with_thread_names(true);

        let installed = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        installed.map_err(|e| TelemetryError::Subscriber(e.to_string()))
    }

    #[inline]
    pub async fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "security_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );

        async {
            tracing::info!(
                metadata = ?metadata,
                "Security event occurred"
            );
        }
        .instrument(span)
        .await
    }
}
