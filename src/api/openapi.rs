//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the rssdld REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the rssdld REST API
///
/// Served as JSON at `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rssdld REST API",
        version = "0.1.0",
        description = "REST API for the rssdld episode store: list and override episodes, check feeds, inspect configuration",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8088", description = "Local development server")
    ),
    paths(
        // Episodes
        crate::api::routes::list_episodes,
        crate::api::routes::get_episode,
        crate::api::routes::update_episode_state,
        crate::api::routes::latest_episodes,
        crate::api::routes::status_summary,

        // Feeds
        crate::api::routes::check_feed,
        crate::api::routes::list_shows,

        // Configuration
        crate::api::routes::get_config,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types
        crate::episode::Episode,
        crate::types::EpisodeState,
        crate::types::SkipReason,
        crate::types::FeedCheckSummary,
        crate::types::StatusSummary,

        // Config types
        crate::config::Config,
        crate::config::FeedConfig,
        crate::config::FilterConfig,
        crate::config::TransmissionConfig,
        crate::config::KodiConfig,
        crate::config::TraktConfig,
        crate::config::PersistenceConfig,
        crate::config::ApiConfig,

        // API request/response types
        crate::api::routes::StateInput,
        crate::api::routes::UpdateStateRequest,
        crate::api::routes::UpdateStateResponse,
        crate::api::routes::CheckFeedRequest,
        crate::api::routes::CheckFeedResponse,
        crate::api::routes::ShowsResponse,

        // Error types
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "episodes", description = "Episodes - List stored episodes, summaries and manual state overrides"),
        (name = "feeds", description = "Feeds - Check a feed on demand, inspect the resolved show list"),
        (name = "config", description = "Configuration - Read the running configuration"),
        (name = "system", description = "System endpoints - Health check, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
