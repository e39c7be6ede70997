//! Prometheus exposition of the aggregator's counter tables.
//!
//! The aggregator remains the source of truth. A background loop copies each
//! table into `metrics` counters (`user_ops_hourly`, `user_ops_daily`,
//! `user_ops_weekly`) labelled with `success`, `bundler` and the period, and
//! the HTTP layer renders them through a [`PrometheusHandle`].
//!
//! Buckets evicted from the aggregator stop being refreshed; the recorder's
//! idle timeout then drops the matching series from the exposition.

use crate::aggregator::{Aggregator, Granularity};
use crate::error::{TrackerError, TrackerResult};
use chrono::Utc;
use metrics::Label;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use metrics_util::MetricKindMask;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

fn builder(idle_timeout: Option<Duration>) -> PrometheusBuilder {
    PrometheusBuilder::new().idle_timeout(MetricKindMask::COUNTER, idle_timeout)
}

/// Install the global Prometheus recorder.
///
/// With `idle_timeout` set, counters that have not been refreshed for that
/// long are removed from the exposition. It must exceed the sync interval,
/// see [`Config::series_idle_timeout`](crate::config::Config::series_idle_timeout).
///
/// # Errors
///
/// Returns a server error if a global recorder is already installed.
pub fn install_recorder(idle_timeout: Option<Duration>) -> TrackerResult<PrometheusHandle> {
    let handle = builder(idle_timeout)
        .install_recorder()
        .map_err(|e| {
            TrackerError::server("failed to install metrics recorder", Some(Box::new(e)))
        })?;

    for granularity in Granularity::ALL {
        metrics::describe_counter!(
            granularity.metric_name(),
            format!(
                "The number of processed user operations per {}",
                granularity.label_name()
            )
        );
    }

    info!("Prometheus recorder installed");
    Ok(handle)
}

const fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Copy every bucket of every table into the installed recorder.
/// Returns the number of series written.
pub fn sync_counters(aggregator: &Aggregator) -> usize {
    let mut series = 0;
    for granularity in Granularity::ALL {
        for entry in aggregator.snapshot(granularity) {
            let labels = vec![
                Label::new("success", flag(entry.key.success)),
                Label::new("bundler", flag(entry.key.bundler)),
                Label::new(granularity.label_name(), entry.key.period),
            ];
            metrics::counter!(granularity.metric_name(), labels).absolute(entry.count);
            series += 1;
        }
    }
    series
}

/// Periodically evict stale buckets and refresh the exported counters.
pub async fn run_sync_loop(
    aggregator: Arc<Aggregator>,
    interval: Duration,
    retention: Option<Duration>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        if let Some(retention) = retention {
            if let Ok(retention) = chrono::Duration::from_std(retention) {
                aggregator.evict_expired(Utc::now() - retention);
            }
        }

        let series = sync_counters(&aggregator);
        debug!(series, "Exported counters refreshed");
    }
}
