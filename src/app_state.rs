//! Shared application state for the HTTP server.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::SystemTime;

use crate::aggregator::Aggregator;
use crate::subscriber::SubscriberHealth;

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Counter tables fed by the subscriber.
    pub aggregator: Arc<Aggregator>,
    /// Subscription health shared with the subscriber.
    pub health: Arc<SubscriberHealth>,
    /// Renders the Prometheus exposition.
    pub metrics: PrometheusHandle,
    /// Application start time for uptime tracking.
    pub start_time: SystemTime,
}

impl AppState {
    /// Create a new AppState instance.
    pub fn new(
        aggregator: Arc<Aggregator>,
        health: Arc<SubscriberHealth>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            aggregator,
            health,
            metrics,
            start_time: SystemTime::now(),
        }
    }

    /// Seconds since the state was created.
    pub fn uptime_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_secs()
    }
}
