//! Append-only CSV persistence for samples and alerts.
//!
//! History rows: `timestamp,received_per_sec,sent_per_sec,max_observed,average`.
//! Alert rows: `timestamp,reason,received_per_sec,sent_per_sec`.
//! Neither file carries a header.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use bandvakt_core::events::{AlertRecord, SampleDerived, TrafficSample};
use bandvakt_core::{EventSink, SinkError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
pub struct CsvEventSink {
    history_path: PathBuf,
    alerts_path: PathBuf,
    // serializes appends when the sink is shared between controllers
    write_lock: Mutex<()>,
}

impl CsvEventSink {
    pub fn new(history_path: impl Into<PathBuf>, alerts_path: impl Into<PathBuf>) -> Self {
        Self {
            history_path: history_path.into(),
            alerts_path: alerts_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn alerts_path(&self) -> &Path {
        &self.alerts_path
    }

    async fn append(&self, path: &Path, line: String) -> Result<(), SinkError> {
        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Quotes a field containing a separator, quote or newline.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn history_row(sample: &TrafficSample, derived: &SampleDerived) -> String {
    format!(
        "{},{},{},{},{}\n",
        timestamp(sample.taken_at),
        sample.received_per_sec,
        sample.sent_per_sec,
        derived.max_observed,
        derived.average
    )
}

pub fn alert_row(alert: &AlertRecord) -> String {
    format!(
        "{},{},{},{}\n",
        timestamp(alert.timestamp),
        field(&alert.reason),
        alert.received_per_sec,
        alert.sent_per_sec
    )
}

#[async_trait]
impl EventSink for CsvEventSink {
    async fn record_sample(
        &self,
        sample: &TrafficSample,
        derived: &SampleDerived,
    ) -> Result<(), SinkError> {
        self.append(&self.history_path, history_row(sample, derived))
            .await
    }

    async fn record_alert(&self, alert: &AlertRecord) -> Result<(), SinkError> {
        self.append(&self.alerts_path, alert_row(alert)).await
    }
}
