//! Long-lived log subscription feeding the aggregator.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──subscribe ok──▶ Listening ──stream closed──▶ Connecting (backoff)
//!     │                          │  ▲                           │
//!     └──subscribe err──▶ Failed  └──┘ log / error / idle        └─budget spent─▶ Failed
//! ```
//!
//! While listening, the subscriber waits on whichever comes first: the next
//! log, a subscription error, or the idle timeout. Logs are handed to a
//! bounded pool of tasks that decode, classify and record them, so a slow
//! event never holds up the notification channel for long. When the pool is
//! saturated the subscriber waits for a free slot before reading further.
//!
//! Subscription errors are logged and counted in [`SubscriberHealth`]; they
//! never stop the loop. A closed stream means the transport is gone, and the
//! subscriber re-dials with exponential backoff.

use crate::aggregator::Aggregator;
use crate::error::{TrackerError, TrackerResult};
use crate::events::{user_operation_filter, EntryPointDecoder, UserOperation};
use crate::rpc::Backoff;
use alloy::rpc::types::{Filter, Log};
use chrono::{DateTime, Utc};
use futures_util::stream::{BoxStream, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Stream of raw logs. `Err` items are subscription-level errors; the end of
/// the stream means the underlying transport closed.
pub type LogStream = BoxStream<'static, TrackerResult<Log>>;

/// A node capable of delivering filtered logs.
pub trait LogSource: Send {
    /// Install `filter` and return the stream of matching logs.
    fn subscribe(
        &mut self,
        filter: Filter,
    ) -> impl Future<Output = TrackerResult<LogStream>> + Send;

    /// Drop the current transport and dial a fresh one.
    fn reconnect(&mut self) -> impl Future<Output = TrackerResult<()>> + Send;
}

/// Where a [`Subscriber`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Dialing the node or installing the filter.
    Connecting,
    /// Receiving logs.
    Listening,
    /// The last connection attempt failed.
    Failed,
}

/// Liveness signal shared with the `/health` endpoint.
///
/// Unhealthy while disconnected, or once `threshold` subscription errors
/// arrive without a log in between.
#[derive(Debug)]
pub struct SubscriberHealth {
    connected: AtomicBool,
    consecutive_errors: AtomicU32,
    threshold: u32,
}

impl SubscriberHealth {
    /// Create a disconnected health signal.
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            connected: AtomicBool::new(false),
            consecutive_errors: AtomicU32::new(0),
            threshold,
        }
    }

    /// Subscription established.
    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::Relaxed);
        self.consecutive_errors.store(0, Ordering::Relaxed);
    }

    /// Subscription lost.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    /// A log arrived.
    pub fn record_event(&self) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
    }

    /// A subscription error arrived. Returns the consecutive error count.
    pub fn record_error(&self) -> u32 {
        self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Whether a subscription is currently established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Subscription errors since the last log.
    #[must_use]
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::Relaxed)
    }

    /// Overall liveness.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.is_connected() && self.consecutive_errors() < self.threshold
    }
}

/// Tuning knobs for a [`Subscriber`].
#[derive(Debug, Clone, Copy)]
pub struct SubscriberSettings {
    /// Quiet period before an idle notice is logged.
    pub idle_timeout: Duration,
    /// Maximum concurrently processed logs.
    pub max_workers: usize,
    /// Reconnect schedule after the stream closes.
    pub backoff: Backoff,
}

/// Decode one log and record it. Returns the decoded operation, or `None`
/// if the log was dropped.
pub fn process_log(
    decoder: &EntryPointDecoder,
    aggregator: &Aggregator,
    log: &Log,
    observed_at: DateTime<Utc>,
) -> Option<UserOperation> {
    match decoder.decode(log) {
        Ok(op) => {
            info!(
                sender = %op.sender,
                success = op.success,
                op_hash = %op.op_hash,
                block_number = ?op.block_number,
                "New user operation"
            );
            aggregator.record(&op, observed_at);
            Some(op)
        }
        Err(e) => {
            error!(
                error = %e,
                address = %log.address(),
                block_number = ?log.block_number,
                transaction_hash = ?log.transaction_hash,
                log_index = ?log.log_index,
                "Failed to decode user operation event"
            );
            None
        }
    }
}

/// Listening half of a [`Subscriber`]; holds no reference to the source.
struct Listener {
    decoder: EntryPointDecoder,
    aggregator: Arc<Aggregator>,
    health: Arc<SubscriberHealth>,
    workers: Arc<Semaphore>,
    idle_timeout: Duration,
}

/// Owns the subscription and drives logs into the aggregator.
pub struct Subscriber<S> {
    source: S,
    listener: Listener,
    backoff: Backoff,
    state: SubscriberState,
}

impl<S: LogSource> Subscriber<S> {
    /// Create a subscriber in the `Connecting` state.
    pub fn new(
        source: S,
        decoder: EntryPointDecoder,
        aggregator: Arc<Aggregator>,
        health: Arc<SubscriberHealth>,
        settings: SubscriberSettings,
    ) -> Self {
        Self {
            source,
            listener: Listener {
                decoder,
                aggregator,
                health,
                workers: Arc::new(Semaphore::new(settings.max_workers.max(1))),
                idle_timeout: settings.idle_timeout,
            },
            backoff: settings.backoff,
            state: SubscriberState::Connecting,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SubscriberState {
        self.state
    }

    /// Install the contract filter.
    ///
    /// # Errors
    ///
    /// Returns the source's error and moves to [`SubscriberState::Failed`].
    pub async fn connect(&mut self) -> TrackerResult<LogStream> {
        self.state = SubscriberState::Connecting;
        let filter = user_operation_filter(self.listener.decoder.contract());

        match self.source.subscribe(filter).await {
            Ok(stream) => {
                self.state = SubscriberState::Listening;
                self.listener.health.mark_connected();
                info!(
                    contract = %self.listener.decoder.contract(),
                    "Listening for user operation events"
                );
                Ok(stream)
            }
            Err(e) => {
                self.state = SubscriberState::Failed;
                self.listener.health.mark_disconnected();
                Err(e)
            }
        }
    }

    /// Listen on `stream`, resubscribing whenever it closes.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MaxReconnectAttemptsExceeded`] once the backoff
    /// budget is spent, or the first unrecoverable error hit while
    /// resubscribing. It never returns `Ok`.
    pub async fn run(mut self, mut stream: LogStream) -> TrackerResult<()> {
        loop {
            self.listener.listen(&mut stream).await;
            self.listener.health.mark_disconnected();
            stream = self.resubscribe().await?;
        }
    }

    async fn resubscribe(&mut self) -> TrackerResult<LogStream> {
        let max_attempts = self.backoff.max_attempts();
        let mut last_error = String::from("log subscription closed");

        for attempt in 1..=max_attempts {
            let delay = self.backoff.delay(attempt);
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Resubscribing after disconnect"
            );
            tokio::time::sleep(delay).await;

            self.state = SubscriberState::Connecting;
            let result = match self.source.reconnect().await {
                Ok(()) => self.connect().await,
                Err(e) => Err(e),
            };

            match result {
                Ok(stream) => {
                    info!(attempt, "Log subscription restored");
                    return Ok(stream);
                }
                Err(e) if !e.is_recoverable() => {
                    self.state = SubscriberState::Failed;
                    error!(error = %e, attempt, "Unrecoverable error while resubscribing");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Resubscribe failed");
                    self.state = SubscriberState::Failed;
                    last_error = e.to_string();
                }
            }
        }

        self.state = SubscriberState::Failed;
        error!(max_attempts, last_error = %last_error, "Giving up on log subscription");
        Err(TrackerError::max_reconnect_exceeded(max_attempts, last_error))
    }
}

impl Listener {
    async fn listen(&self, stream: &mut LogStream) {
        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(log)) => {
                        self.health.record_event();
                        self.dispatch(log).await;
                    }
                    Some(Err(e)) => {
                        let consecutive_errors = self.health.record_error();
                        warn!(error = %e, consecutive_errors, "Error in log subscription");
                    }
                    None => {
                        warn!("Log subscription closed");
                        return;
                    }
                },
                () = tokio::time::sleep(self.idle_timeout) => {
                    info!(idle_secs = self.idle_timeout.as_secs_f64(), "No events");
                }
            }
        }
    }

    async fn dispatch(&self, log: Log) {
        let permit = match Arc::clone(&self.workers).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "Worker pool closed, dropping log");
                return;
            }
        };

        let decoder = self.decoder;
        let aggregator = Arc::clone(&self.aggregator);
        tokio::spawn(async move {
            let _permit = permit;
            process_log(&decoder, &aggregator, &log, Utc::now());
        });
    }
}
