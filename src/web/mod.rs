//! HTTP surface of the relay: snapshot and reset endpoints for the log buffer
//! plus a WebSocket that tells clients when to refetch.
mod api;
mod websocket;

pub use websocket::LiveUpdate;

use crate::logging::{LogBuffer, SubscriptionId};
use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, Level};

const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// Shared state for every handler.
#[derive(Clone)]
pub struct RelayState {
    pub buffer: Arc<LogBuffer>,
    updates: broadcast::Sender<LiveUpdate>,
    _forwarding: Arc<Forwarding>,
}

/// Unsubscribes the live-update bridge once the last state clone is gone.
struct Forwarding {
    buffer: Arc<LogBuffer>,
    id: SubscriptionId,
}

impl Drop for Forwarding {
    fn drop(&mut self) {
        self.buffer.unsubscribe(self.id);
    }
}

impl RelayState {
    /// Wraps `buffer` and forwards each of its change notifications to the
    /// live-update channel for as long as any clone of the state exists.
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        let forward = updates.clone();
        let id = buffer.subscribe(move || {
            // No connected clients is not a failure.
            let _ = forward.send(LiveUpdate::LogsChanged);
            Ok(())
        });

        Self {
            buffer: buffer.clone(),
            updates,
            _forwarding: Arc::new(Forwarding { buffer, id }),
        }
    }

    pub fn updates(&self) -> broadcast::Receiver<LiveUpdate> {
        self.updates.subscribe()
    }

    /// Number of connected live viewers.
    pub fn viewer_count(&self) -> usize {
        self.updates.receiver_count()
    }
}

/// Builds the application router.
///
/// Requests to the log endpoints are not traced: a trace entry per read would
/// change the buffer and make every live viewer refetch in a loop.
pub fn router(state: RelayState, cors: bool) -> Router {
    let log_routes = Router::new()
        .route("/logs", get(api::get_logs).delete(api::clear_logs))
        .route("/logs/ws", get(websocket::ws_handler));

    let app_routes = Router::new().route("/hello", get(api::hello)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let app = Router::new()
        .merge(log_routes)
        .merge(app_routes)
        .with_state(state);

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

pub async fn start_server(buffer: Arc<LogBuffer>, addr: SocketAddr, cors: bool) -> Result<()> {
    let app = router(RelayState::new(buffer), cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Log relay listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Log relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
