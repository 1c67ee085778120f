//! Statistics snapshot and connection health.
//!
//! The statistics feed sends full state on every update, so a
//! [`StatsSnapshot`] always replaces its predecessor wholesale. The payload
//! is kept opaque; [`StatsSnapshot::overall`] offers a typed view for
//! consumers that know the server's shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Latest known aggregate statistics. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    data: serde_json::Value,
    received_at: Timestamp,
}

impl StatsSnapshot {
    pub fn new(data: serde_json::Value, received_at: Timestamp) -> Self {
        Self { data, received_at }
    }

    /// The forwarded payload exactly as the server sent it.
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    /// Interpret the payload as the dashboard's overall statistics.
    ///
    /// Returns `None` when the payload does not have that shape.
    pub fn overall(&self) -> Option<OverallStats> {
        OverallStats::deserialize(&self.data).ok()
    }
}

/// Aggregate prediction statistics published by the inference backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_predictions: u64,
    /// Prediction count per severity level (0 = no finding .. 4 = critical).
    #[serde(default)]
    pub by_severity: BTreeMap<u8, u64>,
    /// Prediction count per disease label.
    #[serde(default)]
    pub by_disease: BTreeMap<String, u64>,
    /// Predictions made in the last 24 hours.
    #[serde(default)]
    pub recent_count: u64,
}

/// Derived connection indicator. Recomputed on every lifecycle event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionHealth {
    pub connected: bool,
    pub last_error: Option<String>,
}

impl ConnectionHealth {
    pub fn connected() -> Self {
        Self {
            connected: true,
            last_error: None,
        }
    }

    pub fn disconnected(last_error: Option<String>) -> Self {
        Self {
            connected: false,
            last_error,
        }
    }
}
