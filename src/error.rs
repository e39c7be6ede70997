//! Error types for the UserOperation analytics pipeline.
//!
//! This module provides a unified error type [`TrackerError`] covering
//! startup failures (configuration, node dial, HTTP bind), per-event decode
//! failures, and subscription-level transport failures.
//!
//! # Design
//!
//! The error hierarchy is organized by layer:
//! - [`TrackerError::ConfigError`]: Flags, environment and bundler source issues
//! - [`TrackerError::RpcError`]: Node RPC failures outside the subscription
//! - [`TrackerError::DecodingError`]: Log payloads that are not a `UserOperationEvent`
//! - [`TrackerError::ServerError`]: HTTP listener and exporter failures
//! - `WebSocket*` variants: subscription lifecycle failures
//!
//! Decode, subscription and connection errors are recoverable: the
//! subscriber keeps running or retries. Everything else is fatal.
//!
//! # Example
//!
//! ```
//! use erc4337_analytics::error::{TrackerError, TrackerResult};
//!
//! fn require_workers(workers: usize) -> TrackerResult<()> {
//!     if workers == 0 {
//!         return Err(TrackerError::config("max workers must be positive", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`TrackerError`].
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Unified error type for the analytics pipeline.
#[derive(Debug)]
pub enum TrackerError {
    /// Configuration errors.
    ///
    /// Variants include:
    /// - Missing or conflicting flags
    /// - Invalid addresses or URLs
    /// - Missing or unreadable bundler file
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// RPC provider or network errors.
    ///
    /// Variants include:
    /// - Contract code lookup failures
    /// - No contract deployed at the target address
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Event decoding errors.
    ///
    /// Variants include:
    /// - Log emitted by an unexpected contract
    /// - Signature mismatch
    /// - Truncated or malformed data
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// HTTP server or metrics exporter errors.
    ServerError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// WebSocket connection errors.
    ///
    /// Variants include:
    /// - Failed to establish WebSocket connection
    /// - Invalid WebSocket URL
    WebSocketConnectionError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// WebSocket subscription errors.
    ///
    /// Variants include:
    /// - Failed to install the log filter
    /// - Notifications dropped by a lagging subscription
    WebSocketSubscriptionError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// WebSocket disconnection error.
    ///
    /// Occurs when the log stream ends and reconnection is required.
    WebSocketDisconnected {
        /// Human-readable error message
        message: String,
    },

    /// Max reconnection attempts exceeded.
    MaxReconnectAttemptsExceeded {
        /// Number of attempts made
        attempts: u32,
        /// Last error encountered
        last_error: String,
    },
}

impl TrackerError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use erc4337_analytics::error::TrackerError;
    ///
    /// let err = TrackerError::config("--net-url is required", None);
    /// assert!(matches!(err, TrackerError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC error.
    #[must_use]
    pub fn rpc(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    ///
    /// # Example
    ///
    /// ```
    /// use erc4337_analytics::error::TrackerError;
    ///
    /// let err = TrackerError::decoding("unexpected topic0", None);
    /// assert!(matches!(err, TrackerError::DecodingError { .. }));
    /// ```
    #[must_use]
    pub fn decoding(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a new server error.
    #[must_use]
    pub fn server(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ServerError {
            message: message.into(),
            source,
        }
    }

    /// Create a new WebSocket connection error.
    #[must_use]
    pub fn websocket_connection(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::WebSocketConnectionError {
            message: message.into(),
            source,
        }
    }

    /// Create a new WebSocket subscription error.
    #[must_use]
    pub fn websocket_subscription(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::WebSocketSubscriptionError {
            message: message.into(),
            source,
        }
    }

    /// Create a new WebSocket disconnection error.
    #[must_use]
    pub fn websocket_disconnected(message: impl Into<String>) -> Self {
        Self::WebSocketDisconnected {
            message: message.into(),
        }
    }

    /// Create a max reconnect attempts exceeded error.
    ///
    /// # Example
    ///
    /// ```
    /// use erc4337_analytics::error::TrackerError;
    ///
    /// let err = TrackerError::max_reconnect_exceeded(10, "Connection timeout");
    /// assert!(matches!(err, TrackerError::MaxReconnectAttemptsExceeded { .. }));
    /// ```
    #[must_use]
    pub fn max_reconnect_exceeded(attempts: u32, last_error: impl Into<String>) -> Self {
        Self::MaxReconnectAttemptsExceeded {
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Whether the pipeline can keep running after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DecodingError { .. }
                | Self::WebSocketConnectionError { .. }
                | Self::WebSocketSubscriptionError { .. }
                | Self::WebSocketDisconnected { .. }
        )
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::ServerError { message, .. } => write!(f, "Server error: {message}"),
            Self::WebSocketConnectionError { message, .. } => {
                write!(f, "WebSocket connection error: {message}")
            }
            Self::WebSocketSubscriptionError { message, .. } => {
                write!(f, "WebSocket subscription error: {message}")
            }
            Self::WebSocketDisconnected { message } => {
                write!(f, "WebSocket disconnected: {message}")
            }
            Self::MaxReconnectAttemptsExceeded {
                attempts,
                last_error,
            } => {
                write!(
                    f,
                    "Max reconnection attempts ({attempts}) exceeded. Last error: {last_error}"
                )
            }
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DecodingError { source, .. }
            | Self::ServerError { source, .. }
            | Self::WebSocketConnectionError { source, .. }
            | Self::WebSocketSubscriptionError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::WebSocketDisconnected { .. } | Self::MaxReconnectAttemptsExceeded { .. } => None,
        }
    }
}
