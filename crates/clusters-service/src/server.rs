//! Router assembly and serving.

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::handlers::{self, AppState};

/// Build the HTTP router over shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/init", get(handlers::init_session))
        .route("/sessions", post(handlers::post_session))
        .route("/topic", post(handlers::create_topic))
        .route("/topic/:session_id/:topic_id", get(handlers::read_topic))
        .route("/input", post(handlers::append_input))
        .route("/end-topic", post(handlers::end_topic))
        .route("/get-updates", get(handlers::get_updates))
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Serve until `shutdown_signal` resolves.
pub async fn run_server_with_shutdown<F>(
    addr: SocketAddr,
    state: AppState,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, state, shutdown_signal).await
}

/// Serve on an already bound listener.
pub async fn serve_listener<F>(
    listener: TcpListener,
    state: AppState,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("HTTP server ready on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}
