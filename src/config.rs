//! Configuration management for the UserOperation analytics exporter.
//!
//! Every setting is a command-line flag with an environment variable fallback.
//! A `.env` file is loaded with `dotenvy` before parsing, so the same values
//! can live in the environment, a `.env` file, or on the command line.
//!
//! ## Environment Variables
//!
//! Required:
//! - `NET_URL`: WebSocket endpoint of the node (`ws://` or `wss://`)
//! - `TARGET_ADDR`: EntryPoint contract address
//! - exactly one of `BUNDLERS` (comma separated) or `BUNDLERS_FILE` (newline separated)
//!
//! Optional (with defaults):
//! - `LISTEN_ADDR`: HTTP listener for `/metrics` and `/health` (default: 0.0.0.0:2112)
//! - `IDLE_TIMEOUT_SECS`: Quiet period before logging "no events" (default: 3)
//! - `MAX_WORKERS`: Concurrent event processing units (default: 64)
//! - `MAX_RECONNECT_ATTEMPTS`: Reconnect budget after a dropped subscription (default: 10)
//! - `UNHEALTHY_AFTER_ERRORS`: Consecutive subscription errors before `/health` fails (default: 5)
//! - `RETENTION_HOURS`: Evict buckets whose period ended longer ago than this (default: keep all)
//! - `SYNC_INTERVAL_SECS`: Exporter refresh period (default: 5)

use crate::error::{TrackerError, TrackerResult};
use alloy::primitives::Address;
use clap::{ArgGroup, Args};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Raw configuration flags, flattened into the top-level CLI.
#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("bundler_source")
        .required(true)
        .args(["bundlers", "bundlers_file"])
))]
pub struct ConfigArgs {
    /// Node WebSocket endpoint
    #[arg(long, env = "NET_URL")]
    pub net_url: String,

    /// EntryPoint contract address to observe
    #[arg(long, env = "TARGET_ADDR")]
    pub target: String,

    /// Comma separated bundler addresses
    #[arg(long, env = "BUNDLERS")]
    pub bundlers: Option<String>,

    /// File with one bundler address per line
    #[arg(long, env = "BUNDLERS_FILE")]
    pub bundlers_file: Option<PathBuf>,

    /// Address for the metrics and health HTTP listener
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:2112")]
    pub listen_addr: SocketAddr,

    /// Seconds without events before an idle notice is logged
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value = "3")]
    pub idle_timeout_secs: u64,

    /// Maximum number of events processed concurrently
    #[arg(long, env = "MAX_WORKERS", default_value = "64")]
    pub max_workers: usize,

    /// Reconnect attempts before the subscriber gives up
    #[arg(long, env = "MAX_RECONNECT_ATTEMPTS", default_value = "10")]
    pub max_reconnect_attempts: u32,

    /// Consecutive subscription errors before the health check fails
    #[arg(long, env = "UNHEALTHY_AFTER_ERRORS", default_value = "5")]
    pub unhealthy_after_errors: u32,

    /// Hours to keep counter buckets after their period ends
    #[arg(long, env = "RETENTION_HOURS")]
    pub retention_hours: Option<u64>,

    /// Seconds between exporter refreshes
    #[arg(long, env = "SYNC_INTERVAL_SECS", default_value = "5")]
    pub sync_interval_secs: u64,
}

/// Where the bundler address set is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundlerSource {
    /// Comma separated inline list.
    Inline(String),
    /// Newline separated file.
    File(PathBuf),
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    net_url: String,
    target: Address,
    bundler_source: BundlerSource,
    listen_addr: SocketAddr,
    idle_timeout: Duration,
    max_workers: usize,
    max_reconnect_attempts: u32,
    unhealthy_after_errors: u32,
    retention: Option<Duration>,
    sync_interval: Duration,
}

impl Config {
    /// Validate parsed flags.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `net_url` is not a `ws://` or `wss://` URL
    /// - `target` is not a valid address
    /// - neither or both bundler sources are given
    /// - a count or interval is zero
    pub fn from_args(args: ConfigArgs) -> TrackerResult<Self> {
        let net_url = args.net_url.trim().to_string();
        if !(net_url.starts_with("ws://") || net_url.starts_with("wss://")) {
            return Err(TrackerError::config(
                "NET_URL must be a WebSocket endpoint (ws:// or wss://)",
                None,
            ));
        }

        let target = Address::from_str(args.target.trim()).map_err(|e| {
            TrackerError::config(
                format!(
                    "TARGET_ADDR must be a valid Ethereum address (0x + 40 hex chars), got: {}",
                    args.target
                ),
                Some(Box::new(e)),
            )
        })?;

        let bundler_source = match (args.bundlers, args.bundlers_file) {
            (Some(list), None) => BundlerSource::Inline(list),
            (None, Some(path)) => BundlerSource::File(path),
            _ => {
                return Err(TrackerError::config(
                    "exactly one of BUNDLERS or BUNDLERS_FILE must be set",
                    None,
                ))
            }
        };

        if args.max_workers == 0 {
            return Err(TrackerError::config("MAX_WORKERS must be positive", None));
        }
        if args.idle_timeout_secs == 0 || args.sync_interval_secs == 0 {
            return Err(TrackerError::config(
                "IDLE_TIMEOUT_SECS and SYNC_INTERVAL_SECS must be positive",
                None,
            ));
        }
        if args.retention_hours == Some(0) {
            return Err(TrackerError::config(
                "RETENTION_HOURS must be positive; leave it unset to keep every bucket",
                None,
            ));
        }

        Ok(Self {
            net_url,
            target,
            bundler_source,
            listen_addr: args.listen_addr,
            idle_timeout: Duration::from_secs(args.idle_timeout_secs),
            max_workers: args.max_workers,
            max_reconnect_attempts: args.max_reconnect_attempts,
            unhealthy_after_errors: args.unhealthy_after_errors.max(1),
            retention: args
                .retention_hours
                .map(|hours| Duration::from_secs(hours.saturating_mul(3600))),
            sync_interval: Duration::from_secs(args.sync_interval_secs),
        })
    }

    /// Get the node WebSocket URL.
    #[must_use]
    pub fn net_url(&self) -> &str {
        &self.net_url
    }

    /// Get the EntryPoint contract address.
    #[must_use]
    pub const fn target(&self) -> Address {
        self.target
    }

    /// Get the bundler source.
    #[must_use]
    pub const fn bundler_source(&self) -> &BundlerSource {
        &self.bundler_source
    }

    /// Get the HTTP listener address.
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// Get the idle notice period.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Get the worker pool size.
    #[must_use]
    pub const fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Get the reconnect budget.
    #[must_use]
    pub const fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    /// Get the consecutive error threshold for the health check.
    #[must_use]
    pub const fn unhealthy_after_errors(&self) -> u32 {
        self.unhealthy_after_errors
    }

    /// Get the bucket retention window, if eviction is enabled.
    #[must_use]
    pub const fn retention(&self) -> Option<Duration> {
        self.retention
    }

    /// Get the exporter refresh period.
    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        self.sync_interval
    }

    /// How long an exported series may go without a refresh before the
    /// recorder drops it. One sync interval longer than the retention
    /// window, so a bucket still held by the aggregator is never dropped
    /// between two syncs.
    #[must_use]
    pub fn series_idle_timeout(&self) -> Option<Duration> {
        self.retention.map(|retention| retention.saturating_add(self.sync_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    const TARGET: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";

    fn parse(extra: &[&str]) -> Result<ConfigArgs, clap::Error> {
        let mut args = vec!["test", "--net-url", "wss://node.example/ws", "--target", TARGET];
        args.extend_from_slice(extra);
        TestCli::try_parse_from(args).map(|cli| cli.config)
    }

    #[test]
    fn test_inline_bundlers() {
        let args = parse(&["--bundlers", "0xaaa"]).unwrap();
        let config = Config::from_args(args).unwrap();

        assert_eq!(
            config.bundler_source(),
            &BundlerSource::Inline("0xaaa".to_string())
        );
        assert_eq!(config.listen_addr().port(), 2112);
        assert_eq!(config.idle_timeout(), Duration::from_secs(3));
        assert_eq!(config.max_workers(), 64);
        assert_eq!(config.retention(), None);
        assert_eq!(config.target().to_checksum(None), TARGET);
    }

    #[test]
    fn test_bundlers_file() {
        let args = parse(&["--bundlers-file", "/etc/bundlers.txt", "--retention-hours", "48"])
            .unwrap();
        let config = Config::from_args(args).unwrap();

        assert_eq!(
            config.bundler_source(),
            &BundlerSource::File(PathBuf::from("/etc/bundlers.txt"))
        );
        assert_eq!(config.retention(), Some(Duration::from_secs(48 * 3600)));
    }

    #[test]
    fn test_bundler_sources_are_exclusive() {
        assert!(parse(&["--bundlers", "0xaaa", "--bundlers-file", "/tmp/x"]).is_err());
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_rejects_http_url() {
        let mut args = parse(&["--bundlers", "0xaaa"]).unwrap();
        args.net_url = "https://node.example".to_string();
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn test_rejects_invalid_target() {
        let mut args = parse(&["--bundlers", "0xaaa"]).unwrap();
        args.target = "0x1234".to_string();
        let err = Config::from_args(args).unwrap_err();
        assert!(matches!(err, TrackerError::ConfigError { .. }));
    }

    #[test]
    fn test_rejects_zero_retention() {
        let args = parse(&["--bundlers", "0xaaa", "--retention-hours", "0"]).unwrap();
        let err = Config::from_args(args).unwrap_err();
        assert!(matches!(err, TrackerError::ConfigError { .. }));
    }

    #[test]
    fn test_series_idle_timeout_outlives_retention() {
        let args = parse(&["--bundlers", "0xaaa"]).unwrap();
        assert_eq!(Config::from_args(args).unwrap().series_idle_timeout(), None);

        let args = parse(&["--bundlers", "0xaaa", "--retention-hours", "1"]).unwrap();
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.series_idle_timeout(), Some(Duration::from_secs(3600 + 5)));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let args = parse(&["--bundlers", "0xaaa", "--max-workers", "0"]).unwrap();
        assert!(Config::from_args(args).is_err());
    }
}
