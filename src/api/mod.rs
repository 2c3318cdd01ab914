//! REST API server module
//!
//! Exposes the episode store and the lifecycle controls over HTTP: listing
//! and overriding episodes, status summaries, on-demand feed checks and the
//! resolved show list.

use crate::{EpisodeManager, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Episodes
/// - `GET /episodes` - List episodes (`?state=&since=`)
/// - `GET /episodes/:hash` - Get single episode
/// - `PUT /episodes/:hash/state` - Set an episode's state by hand
/// - `GET /latest` - Episodes published in the last N days (`?days=`)
/// - `GET /status` - Episode counts per lifecycle bucket (`?since=`)
///
/// ## Feeds
/// - `POST /feeds/check` - Run one feed through ingest, filter and store
/// - `GET /shows` - Resolved series allow-list
///
/// ## System
/// - `GET /config` - Get current config (secrets redacted)
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
pub fn create_router(manager: EpisodeManager) -> Router {
    let api_config = manager.config().api.clone();
    let state = AppState::new(manager);

    let router = Router::new()
        // Episodes
        .route("/episodes", get(routes::list_episodes))
        .route("/episodes/:hash", get(routes::get_episode))
        .route("/episodes/:hash/state", put(routes::update_episode_state))
        .route("/latest", get(routes::latest_episodes))
        .route("/status", get(routes::status_summary))
        // Feeds
        .route("/feeds/check", post(routes::check_feed))
        .route("/shows", get(routes::list_shows))
        // System
        .route("/config", get(routes::get_config))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if api_config.cors_enabled {
        let cors = build_cors_layer(&api_config.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the API on the configured bind address until `shutdown` fires
///
/// # Example
///
/// ```no_run
/// use rssdld::{Config, EpisodeManager};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = EpisodeManager::new(Config::default()).await?;
/// let shutdown = CancellationToken::new();
///
/// // Start API server (blocks until `shutdown` is cancelled)
/// rssdld::api::start_api_server(manager, shutdown).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(manager: EpisodeManager, shutdown: CancellationToken) -> Result<()> {
    let bind_address = manager.config().api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(manager);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
