//! Structured logging setup.
//!
//! Console output is pretty-printed by default and JSON when requested. An
//! optional log file receives JSON lines with daily rotation.
//!
//! # Environment Configuration
//!
//! ```bash
//! # Component-specific levels
//! RUST_LOG=erc4337_analytics=debug,alloy=warn erc4337-analytics ...
//!
//! # JSON console output for log shippers
//! LOG_JSON=true erc4337-analytics ...
//!
//! # Also write to ./logs/analytics.log.YYYY-MM-DD
//! LOG_FILE=./logs/analytics.log erc4337-analytics ...
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{TrackerError, TrackerResult};

/// Filter used when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_FILTER: &str = "erc4337_analytics=info,warn";

/// Pick the filter directive: `RUST_LOG` wins over `log_level`, which wins
/// over [`DEFAULT_FILTER`].
pub fn filter_directive(rust_log: Option<String>, log_level: Option<String>) -> String {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .or(log_level)
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Initialize the global tracing subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process when `log_file` is set.
///
/// # Errors
///
/// Returns a config error if the log directory cannot be created, the filter
/// does not parse, or a global subscriber is already installed.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> TrackerResult<Option<WorkerGuard>> {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), log_level);
    let env_filter = EnvFilter::try_new(&directive).map_err(|e| {
        TrackerError::config(format!("invalid log filter: {directive}"), Some(Box::new(e)))
    })?;

    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .boxed()
    };

    let mut guard = None;
    let file_layer = match log_file.as_deref() {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir).map_err(|e| {
                TrackerError::config(
                    format!("failed to create log directory {}", dir.display()),
                    Some(Box::new(e)),
                )
            })?;

            let file_appender = tracing_appender::rolling::daily(
                dir,
                path.file_name().unwrap_or_else(|| OsStr::new("analytics.log")),
            );
            let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
            guard = Some(worker_guard);

            Some(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_current_span(true)
                    .with_target(true)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            TrackerError::config("tracing subscriber already installed", Some(Box::new(e)))
        })?;

    info!(
        filter = %directive,
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized"
    );

    Ok(guard)
}
