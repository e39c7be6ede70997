//! Axum server setup and routing.

use axum::{middleware, routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{handlers, middleware as api_middleware};
use crate::app_state::AppState;
use crate::error::{TrackerError, TrackerResult};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/status", get(handlers::health::status))
        .route("/counters/:granularity", get(handlers::counters::get_counters));

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(api_middleware::logging::log_requests));

    Router::new()
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_routes)
        .layer(middleware_stack)
        .with_state(state)
}

/// Bind the listen address.
///
/// # Errors
///
/// Returns a server error if the address is in use or not permitted.
pub async fn bind_listener(addr: SocketAddr) -> TrackerResult<TcpListener> {
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        TrackerError::server(format!("failed to bind {addr}"), Some(Box::new(e)))
    })?;
    info!(addr = %addr, "HTTP listener bound");
    Ok(listener)
}

/// Serve the router until `shutdown` resolves.
///
/// # Errors
///
/// Returns a server error if the accept loop fails.
pub async fn run_server<F>(listener: TcpListener, state: AppState, shutdown: F) -> TrackerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| TrackerError::server("listener has no local address", Some(Box::new(e))))?;
    info!(addr = %addr, "Starting metrics server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| TrackerError::server("metrics server failed", Some(Box::new(e))))
}
