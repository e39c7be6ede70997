//! API response models.

use serde::{Deserialize, Serialize};

use crate::aggregator::{CounterEntry, Granularity};

/// Counters for one granularity.
#[derive(Debug, Clone, Serialize)]
pub struct CountersResponse {
    /// Which table the entries come from.
    pub granularity: Granularity,
    /// Number of buckets returned.
    pub buckets: usize,
    /// Sum of all bucket counts.
    pub total: u64,
    /// Buckets ordered by success, then bundler, then period label.
    pub entries: Vec<CounterEntry>,
}

impl CountersResponse {
    /// Wrap a table snapshot, computing the bucket count and total.
    pub fn new(granularity: Granularity, entries: Vec<CounterEntry>) -> Self {
        Self {
            granularity,
            buckets: entries.len(),
            total: entries.iter().map(|e| e.count).sum(),
            entries,
        }
    }
}

/// Health status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Overall verdict, same as `/health`.
    pub status: HealthStatus,
    /// Crate version.
    pub version: String,
    /// Seconds since startup.
    pub uptime_seconds: u64,
    /// Whether the log subscription is currently established.
    pub subscription_connected: bool,
    /// Subscription errors since the last successfully processed log.
    pub consecutive_errors: u32,
    /// Size of the configured bundler set.
    pub bundlers: usize,
}

/// Health status states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Subscription connected and below the error threshold.
    Healthy,
    /// Disconnected or too many consecutive errors.
    Unhealthy,
}

/// Error response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type
    pub error: String,
    /// Human-readable message
    pub message: String,
}
