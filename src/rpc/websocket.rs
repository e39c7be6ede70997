//! WebSocket provider for the filtered `UserOperationEvent` subscription.
//!
//! # Architecture
//!
//! - WebSocket connection to the node via Alloy's pubsub transport
//! - `eth_subscribe("logs")` scoped to one EntryPoint contract
//! - Lagged notifications are surfaced as subscription errors
//! - A closed subscription ends the stream; the subscriber reconnects
//!
//! [`ReconnectingWebSocket`] is the production [`LogSource`]: it owns the
//! current connection and can drop and re-dial it on demand. The reconnect
//! schedule itself lives in the subscriber.

use crate::error::{TrackerError, TrackerResult};
use crate::subscriber::{LogSource, LogStream};
use alloy::{
    primitives::Address,
    providers::{Provider, ProviderBuilder},
    pubsub::Subscription,
    rpc::types::{Filter, Log},
    transports::BoxTransport,
};
use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, instrument, warn};

/// Host part of a node URL, safe to log (API keys usually live in the path).
#[must_use]
pub fn redact_url(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme.split('/').next().unwrap_or("unknown")
}

/// WebSocket provider for real-time log subscriptions.
pub struct WebSocketProvider {
    provider: alloy::providers::RootProvider<BoxTransport>,
}

impl WebSocketProvider {
    /// Connects to a WebSocket RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the URL is invalid or the node is unreachable.
    #[instrument(
        skip(ws_url),
        fields(ws_host = tracing::field::Empty, duration_ms = tracing::field::Empty)
    )]
    pub async fn connect(ws_url: &str) -> TrackerResult<Self> {
        let host = redact_url(ws_url).to_string();
        tracing::Span::current().record("ws_host", host.as_str());

        info!(ws_host = %host, "Connecting to WebSocket");

        let start = std::time::Instant::now();

        let provider = ProviderBuilder::new()
            .on_builtin(ws_url)
            .await
            .map_err(|e| {
                error!(error = %e, ws_host = %host, "WebSocket connection failed");
                TrackerError::websocket_connection(
                    format!("failed to dial {host}"),
                    Some(Box::new(e)),
                )
            })?;

        let duration = start.elapsed();
        tracing::Span::current().record("duration_ms", duration.as_millis() as u64);

        info!(
            ws_host = %host,
            duration_ms = duration.as_millis(),
            "WebSocket connected successfully"
        );

        Ok(Self { provider })
    }

    /// Verifies that contract code is deployed at `contract`.
    ///
    /// # Errors
    ///
    /// Returns an RPC error if the lookup fails or the account has no code.
    #[instrument(skip(self), fields(contract = %contract))]
    pub async fn ensure_contract(&self, contract: Address) -> TrackerResult<()> {
        let code = self.provider.get_code_at(contract).await.map_err(|e| {
            TrackerError::rpc(
                format!("failed to fetch code for {contract}"),
                Some(Box::new(e)),
            )
        })?;

        if code.is_empty() {
            return Err(TrackerError::rpc(
                format!("no contract deployed at {contract}"),
                None,
            ));
        }

        info!(code_size = code.len(), "EntryPoint contract found");
        Ok(())
    }

    /// Installs a log filter and returns the matching log stream.
    ///
    /// # Errors
    ///
    /// Returns a subscription error if the node rejects `eth_subscribe`.
    #[instrument(skip(self, filter))]
    pub async fn subscribe_logs(&self, filter: &Filter) -> TrackerResult<LogStream> {
        let sub = self.provider.subscribe_logs(filter).await.map_err(|e| {
            error!(error = %e, "Log subscription failed");
            TrackerError::websocket_subscription("log subscription failed", Some(Box::new(e)))
        })?;

        info!("Log subscription active");
        Ok(into_log_stream(sub))
    }
}

/// Adapt an Alloy subscription into a [`LogStream`].
///
/// Dropped notifications become `Err` items; the stream ends when the
/// subscription channel closes.
fn into_log_stream(sub: Subscription<Log>) -> LogStream {
    stream::unfold(sub, |mut sub| async move {
        match sub.recv().await {
            Ok(log) => Some((Ok(log), sub)),
            Err(RecvError::Lagged(skipped)) => {
                let err = TrackerError::websocket_subscription(
                    format!("subscription lagged, {skipped} notifications dropped"),
                    None,
                );
                Some((Err(err), sub))
            }
            Err(RecvError::Closed) => None,
        }
    })
    .boxed()
}

/// WebSocket log source that can be torn down and re-dialed.
pub struct ReconnectingWebSocket {
    url: String,
    provider: Option<WebSocketProvider>,
}

impl ReconnectingWebSocket {
    /// Creates an unconnected source for `url`.
    pub const fn new(url: String) -> Self {
        Self {
            url,
            provider: None,
        }
    }

    /// Dials the node once.
    ///
    /// # Errors
    ///
    /// Returns the connection error; no retry is attempted here.
    pub async fn connect(&mut self) -> TrackerResult<&WebSocketProvider> {
        let provider = WebSocketProvider::connect(&self.url).await?;
        Ok(self.provider.insert(provider))
    }
}

impl LogSource for ReconnectingWebSocket {
    async fn subscribe(&mut self, filter: Filter) -> TrackerResult<LogStream> {
        if self.provider.is_none() {
            self.connect().await?;
        }
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| TrackerError::websocket_disconnected("no active connection"))?;
        provider.subscribe_logs(&filter).await
    }

    async fn reconnect(&mut self) -> TrackerResult<()> {
        warn!(ws_host = redact_url(&self.url), "Reconnecting WebSocket after disconnection");
        self.provider = None;
        self.connect().await.map(|_| ())
    }
}
