//! Feed handlers.

use super::{CheckFeedRequest, CheckFeedResponse, ShowsResponse};
use crate::api::AppState;
use crate::config::validate_feed_uri;
use crate::error::Error;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /feeds/check - Run one feed through ingest, filter and store
///
/// A feed that cannot be fetched or parsed is reported as empty.
#[utoipa::path(
    post,
    path = "/feeds/check",
    tag = "feeds",
    request_body = CheckFeedRequest,
    responses(
        (status = 200, description = "Feed checked", body = CheckFeedResponse),
        (status = 400, description = "Invalid feed locator", body = crate::error::ApiError),
        (status = 500, description = "Episode store failed", body = crate::error::ApiError)
    )
)]
pub async fn check_feed(
    State(state): State<AppState>,
    Json(request): Json<CheckFeedRequest>,
) -> Response {
    if let Err(message) = validate_feed_uri(&request.feed) {
        return Error::Config {
            message,
            key: Some("feed".to_string()),
        }
        .into_response();
    }

    let extra = request.extra_filter();
    match state.manager.check_feed(&request.feed, extra.as_ref()).await {
        Ok(summary) => {
            tracing::info!(%summary, "Feed checked on request");
            (StatusCode::OK, Json(CheckFeedResponse::from(summary))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /shows - Currently resolved series allow-list
#[utoipa::path(
    get,
    path = "/shows",
    tag = "feeds",
    responses(
        (status = 200, description = "Normalized series names", body = ShowsResponse)
    )
)]
pub async fn list_shows(State(state): State<AppState>) -> impl IntoResponse {
    let shows = state.manager.series().await;
    Json(ShowsResponse { shows })
}
