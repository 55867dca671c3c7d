//! Structured alert events surfaced to the external alerting workflow.
//!
//! The core only produces the payloads; delivery (email, chat, paging) is an
//! external collaborator reached through the [`AlertSink`] trait.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::FlowResult;
use crate::types::TableName;

/// Outcome category reported in an alert event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// The table's extraction cycle failed and will be retried from the same
    /// watermark.
    Failed,
    /// The extraction found no new rows; nothing was landed and the watermark
    /// is unchanged.
    Skipped,
}

/// Structured event emitted when a table's extraction fails or is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAlert {
    /// The affected table.
    pub table: TableName,
    /// Whether the cycle failed or was skipped.
    pub status: AlertStatus,
    /// Human-readable reason.
    pub reason: String,
}

impl LoadAlert {
    /// Creates a failure alert.
    pub fn failed(table: TableName, reason: impl Into<String>) -> Self {
        Self {
            table,
            status: AlertStatus::Failed,
            reason: reason.into(),
        }
    }

    /// Creates a skip alert.
    pub fn skipped(table: TableName, reason: impl Into<String>) -> Self {
        Self {
            table,
            status: AlertStatus::Skipped,
            reason: reason.into(),
        }
    }
}

/// Trait for handing alert events to the alerting workflow.
pub trait AlertSink {
    /// Delivers one alert event.
    fn send(&self, alert: LoadAlert) -> impl Future<Output = FlowResult<()>> + Send;
}

/// In-memory alert sink for testing and development purposes.
///
/// [`MemoryAlertSink`] records every alert it receives so that tests can
/// assert on the exact events a pipeline surfaced.
#[derive(Debug, Clone)]
pub struct MemoryAlertSink {
    inner: Arc<Mutex<Vec<LoadAlert>>>,
}

impl MemoryAlertSink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a copy of every received alert.
    pub async fn alerts(&self) -> Vec<LoadAlert> {
        let inner = self.inner.lock().await;
        inner.clone()
    }

    /// Clears all recorded alerts.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.clear();
    }
}

impl Default for MemoryAlertSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for MemoryAlertSink {
    async fn send(&self, alert: LoadAlert) -> FlowResult<()> {
        let mut inner = self.inner.lock().await;
        inner.push(alert);

        Ok(())
    }
}
