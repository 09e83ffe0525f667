//! HTTP server setup and routing
//!
//! Control endpoints for the DJ session plus the SSE event stream.

use crate::error::{Error, Result};
use crate::session::DjSession;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub session: Arc<DjSession>,
    pub port: u16,
}

/// Build the router with every route and layer attached
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/status", get(super::handlers::status))
        // Session lifecycle
        .route("/session/start", post(super::handlers::start_session))
        .route("/session/stop", post(super::handlers::stop_session))
        // Music
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/stop", post(super::handlers::stop_playback))
        .route("/catalog/search", get(super::handlers::search_catalog))
        // Mood
        .route("/mood", get(super::handlers::get_mood))
        .route("/mood/sample", post(super::handlers::force_mood_sample))
        // Announcements
        .route(
            "/announcements",
            get(super::handlers::list_announcements).post(super::handlers::announce),
        )
        .route("/announcements/cancel", post(super::handlers::cancel_announcement))
        .route("/announcements/clear", post(super::handlers::clear_announcements))
        // Timeline
        .route("/timeline", get(super::handlers::get_timeline))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run(
    ctx: AppContext,
    host: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, ctx.port)
        .parse()
        .map_err(|e| Error::Http(format!("Invalid listen address {}:{}: {}", host, ctx.port, e)))?;
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
