//! # ERC-4337 UserOperation analytics
//!
//! Subscribes to `UserOperationEvent` logs of an EntryPoint contract, counts
//! them per outcome, per sender class (known bundler or not) and per hour,
//! day and ISO week, and exposes the counters to Prometheus.
//!
//! ## Architecture
//!
//! 1. **Config** ([`config`]) - flags with environment fallbacks
//! 2. **Events** ([`events`]) - `sol!` bindings and log decoding
//! 3. **Bundlers** ([`bundlers`]) - the known bundler address set
//! 4. **Aggregator** ([`aggregator`]) - concurrent time-bucketed counters
//! 5. **RPC** ([`rpc`]) - WebSocket connection and reconnect backoff
//! 6. **Subscriber** ([`subscriber`]) - listen loop and worker pool
//! 7. **Exporter / API** ([`exporter`], [`api`]) - `/metrics`, `/health` and JSON counters
//!
//! ## Using as a Library
//!
//! ```rust,no_run
//! use erc4337_analytics::{config::Config, cli};
//!
//! # async fn example(config: Config) -> Result<(), Box<dyn std::error::Error>> {
//! cli::start(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`error::TrackerResult<T>`](error::TrackerResult):
//!
//! ```rust
//! use erc4337_analytics::error::{TrackerError, TrackerResult};
//!
//! fn check(workers: usize) -> TrackerResult<()> {
//!     if workers == 0 {
//!         return Err(TrackerError::config("max workers must be positive", None));
//!     }
//!     Ok(())
//! }
//! # assert!(check(0).is_err());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregator;
pub mod api;
pub mod app_state;
pub mod bundlers;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod exporter;
pub mod observability;
pub mod rpc;
pub mod subscriber;
