//! Episode handlers.

use super::{
    DEFAULT_WINDOW_DAYS, EpisodesQuery, LatestQuery, StatusQuery, UpdateStateRequest,
    UpdateStateResponse,
};
use crate::api::AppState;
use crate::error::Error;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

/// GET /episodes - List stored episodes
#[utoipa::path(
    get,
    path = "/episodes",
    tag = "episodes",
    params(EpisodesQuery),
    responses(
        (status = 200, description = "Episodes, newest first", body = Vec<crate::episode::Episode>),
        (status = 400, description = "Unknown state", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_episodes(
    State(state): State<AppState>,
    Query(query): Query<EpisodesQuery>,
) -> Response {
    let filter = match query.state() {
        Ok(filter) => filter,
        Err(e) => return e.into_response(),
    };

    match state.manager.list_episodes(filter, query.since).await {
        Ok(episodes) => (StatusCode::OK, Json(episodes)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /episodes/:hash - Get a single episode
#[utoipa::path(
    get,
    path = "/episodes/{hash}",
    tag = "episodes",
    params(
        ("hash" = String, Path, description = "Torrent info-hash")
    ),
    responses(
        (status = 200, description = "Episode", body = crate::episode::Episode),
        (status = 404, description = "Unknown hash", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn get_episode(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    match state.manager.get_episode(&hash).await {
        Ok(Some(episode)) => (StatusCode::OK, Json(episode)).into_response(),
        Ok(None) => Error::NotFound(format!("episode {}", hash)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PUT /episodes/:hash/state - Set an episode's lifecycle state by hand
#[utoipa::path(
    put,
    path = "/episodes/{hash}/state",
    tag = "episodes",
    params(
        ("hash" = String, Path, description = "Torrent info-hash")
    ),
    request_body = UpdateStateRequest,
    responses(
        (status = 200, description = "State updated", body = UpdateStateResponse),
        (status = 400, description = "Unknown state", body = crate::error::ApiError),
        (status = 404, description = "Unknown hash", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn update_episode_state(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Json(request): Json<UpdateStateRequest>,
) -> Response {
    let target = match request.state.resolve() {
        Ok(target) => target,
        Err(e) => return e.into_response(),
    };

    match state.manager.update_episode(&hash, target).await {
        Ok(true) => (
            StatusCode::OK,
            Json(UpdateStateResponse {
                hash,
                state: target,
            }),
        )
            .into_response(),
        Ok(false) => Error::NotFound(format!("episode {}", hash)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /latest - Episodes published in the last N days
#[utoipa::path(
    get,
    path = "/latest",
    tag = "episodes",
    params(LatestQuery),
    responses(
        (status = 200, description = "Recent episodes, newest first", body = Vec<crate::episode::Episode>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn latest_episodes(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Response {
    let days = query.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    match state.manager.latest(days).await {
        Ok(episodes) => (StatusCode::OK, Json(episodes)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /status - Episode counts per lifecycle bucket
#[utoipa::path(
    get,
    path = "/status",
    tag = "episodes",
    params(StatusQuery),
    responses(
        (status = 200, description = "Counts per bucket", body = crate::types::StatusSummary),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn status_summary(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let since = query
        .since
        .unwrap_or_else(|| Utc::now().timestamp() - i64::from(DEFAULT_WINDOW_DAYS) * 86_400);

    match state.manager.status_summary(since).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => e.into_response(),
    }
}
