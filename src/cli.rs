//! Command-line entry for the UserOperation analytics exporter.
//!
//! Wires the pipeline together and runs it until the subscription gives up
//! or the process receives Ctrl-C:
//!
//! ```text
//! node ──logs──▶ Subscriber ──decode──▶ Aggregator ◀──sync── exporter
//!                                          │
//!                          /api/v1/counters ▼   /metrics  /health
//! ```
//!
//! # Example
//!
//! ```bash
//! erc4337-analytics \
//!     --net-url wss://eth-mainnet.g.alchemy.com/v2/KEY \
//!     --target 0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789 \
//!     --bundlers 0xabc...,0xdef...
//! ```

use crate::aggregator::Aggregator;
use crate::api::server;
use crate::app_state::AppState;
use crate::bundlers::BundlerSet;
use crate::config::{Config, ConfigArgs};
use crate::error::{TrackerError, TrackerResult};
use crate::events::EntryPointDecoder;
use crate::exporter;
use crate::observability;
use crate::rpc::websocket::redact_url;
use crate::rpc::{Backoff, ReconnectingWebSocket};
use crate::subscriber::{Subscriber, SubscriberHealth, SubscriberSettings};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{error, info};

/// ERC-4337 UserOperation analytics exporter
#[derive(Parser, Debug)]
#[command(name = "erc4337-analytics")]
#[command(
    about = "Counts EntryPoint user operations by outcome, bundler and period",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Pipeline configuration
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Log filter used when RUST_LOG is unset (e.g. "debug")
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON logs on the console
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Also write JSON logs to this file, rotated daily
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Load `.env`, parse arguments, initialize logging and run the exporter.
///
/// # Errors
///
/// Returns an error if configuration is invalid, startup fails, or the
/// subscription exhausts its reconnect budget.
pub async fn run() -> TrackerResult<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = observability::init_tracing(cli.log_level, cli.log_file, cli.log_json)?;

    let config = Config::from_args(cli.config)?;
    start(config).await
}

/// Run the full pipeline with an already validated configuration.
///
/// # Errors
///
/// Any startup failure is returned before the server accepts requests.
/// Afterwards an error means the subscription was lost for good or the HTTP
/// server stopped.
pub async fn start(config: Config) -> TrackerResult<()> {
    info!(
        ws_host = redact_url(config.net_url()),
        target = %config.target(),
        listen_addr = %config.listen_addr(),
        "Starting user operation analytics"
    );

    let bundlers = Arc::new(BundlerSet::load(config.bundler_source())?);
    let aggregator = Arc::new(Aggregator::new(bundlers));
    let health = Arc::new(SubscriberHealth::new(config.unhealthy_after_errors()));
    let metrics = exporter::install_recorder(config.series_idle_timeout())?;
    let listener = server::bind_listener(config.listen_addr()).await?;

    let mut source = ReconnectingWebSocket::new(config.net_url().to_string());
    source.connect().await?.ensure_contract(config.target()).await?;

    let mut subscriber = Subscriber::new(
        source,
        EntryPointDecoder::new(config.target()),
        Arc::clone(&aggregator),
        Arc::clone(&health),
        SubscriberSettings {
            idle_timeout: config.idle_timeout(),
            max_workers: config.max_workers(),
            backoff: Backoff::new(config.max_reconnect_attempts()),
        },
    );
    let stream = subscriber.connect().await?;

    let mut subscription = tokio::spawn(subscriber.run(stream));
    let sync = tokio::spawn(exporter::run_sync_loop(
        Arc::clone(&aggregator),
        config.sync_interval(),
        config.retention(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let state = AppState::new(aggregator, health, metrics);
    let mut http = tokio::spawn(server::run_server(listener, state, async move {
        shutdown_rx.await.ok();
    }));

    let result = tokio::select! {
        res = &mut subscription => {
            error!("Log subscription terminated");
            flatten_join(res, "subscriber")
        }
        res = &mut http => flatten_join(res, "http server"),
        res = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            res.map_err(|e| TrackerError::server("failed to listen for Ctrl-C", Some(Box::new(e))))
        }
    };

    subscription.abort();
    sync.abort();
    shutdown_tx.send(()).ok();
    if !http.is_finished() {
        if let Err(e) = flatten_join(http.await, "http server") {
            error!(error = %e, "HTTP server did not shut down cleanly");
        }
    }

    info!("Shutdown complete");
    result
}

fn flatten_join(res: Result<TrackerResult<()>, JoinError>, task: &str) -> TrackerResult<()> {
    match res {
        Ok(inner) => inner,
        Err(e) => Err(TrackerError::server(
            format!("{task} task aborted"),
            Some(Box::new(e)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const TARGET: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_flags() {
        let cli = Cli::try_parse_from([
            "erc4337-analytics",
            "--net-url",
            "ws://localhost:8546",
            "--target",
            TARGET,
            "--bundlers",
            "0x1111111111111111111111111111111111111111",
            "--log-json",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert!(cli.log_json);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.log_file.is_none());

        let config = Config::from_args(cli.config).unwrap();
        assert_eq!(config.net_url(), "ws://localhost:8546");
        assert_eq!(config.listen_addr().port(), 2112);
    }

    #[test]
    fn test_flatten_join_passes_through_errors() {
        assert!(flatten_join(Ok(Ok(())), "t").is_ok());
        let err = flatten_join(Ok(Err(TrackerError::max_reconnect_exceeded(3, "gone"))), "t");
        assert!(matches!(err, Err(TrackerError::MaxReconnectAttemptsExceeded { .. })));
    }

    #[tokio::test]
    async fn test_flatten_join_reports_aborted_task() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(())
        });
        handle.abort();
        let err = flatten_join(handle.await, "subscriber").unwrap_err();
        assert!(err.to_string().contains("subscriber task aborted"));
    }
}
