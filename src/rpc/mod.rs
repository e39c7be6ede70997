//! Node connectivity for the log subscription.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │            Subscriber               │
//! │  (listen loop, reconnect schedule)  │
//! └─────────────────────────────────────┘
//!          │ LogSource          │ Backoff
//!    ┌─────▼──────────────┐  ┌──▼──────┐
//!    │ReconnectingWebSocket│  │ backoff │
//!    └─────┬──────────────┘  └─────────┘
//!          │
//!    ┌─────▼─────┐
//!    │ WebSocket │  eth_subscribe("logs")
//!    │ Provider  │
//!    └───────────┘
//! ```
//!
//! ## Real-time Subscriptions
//! ```rust,ignore
//! use erc4337_analytics::events::{user_operation_filter, ENTRY_POINT_V06};
//! use erc4337_analytics::rpc::WebSocketProvider;
//! use futures_util::stream::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ws = WebSocketProvider::connect("wss://eth-mainnet.g.alchemy.com/v2/KEY").await?;
//! let mut logs = ws.subscribe_logs(&user_operation_filter(ENTRY_POINT_V06)).await?;
//!
//! while let Some(log) = logs.next().await {
//!     println!("New log: {:?}", log?.transaction_hash);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod websocket;

// Re-export commonly used types
pub use backoff::Backoff;
pub use websocket::{ReconnectingWebSocket, WebSocketProvider};
