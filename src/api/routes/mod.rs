//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`episodes`] — Episode listing, status summaries and manual overrides
//! - [`feeds`] — On-demand feed checks and the resolved show list
//! - [`config`] — Configuration
//! - [`system`] — Health, OpenAPI

use crate::config::FilterConfig;
use crate::error::{Error, Result};
use crate::types::{EpisodeState, FeedCheckSummary};
use serde::{Deserialize, Serialize};

mod config;
mod episodes;
mod feeds;
mod system;

// Re-export all handlers so `routes::function_name` resolves
pub use config::*;
pub use episodes::*;
pub use feeds::*;
pub use system::*;

/// Window used by `/latest` and `/status` when the caller gives none
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /episodes
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EpisodesQuery {
    /// Only episodes in this state (name or ordinal)
    pub state: Option<String>,
    /// Only episodes published after this Unix timestamp
    pub since: Option<i64>,
}

impl EpisodesQuery {
    /// Parsed state filter; malformed names are a 400
    pub fn state(&self) -> Result<Option<EpisodeState>> {
        self.state.as_deref().map(str::parse).transpose()
    }
}

/// Query parameters for GET /latest
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestQuery {
    /// Age limit in days (default: 7)
    pub days: Option<u32>,
}

/// Query parameters for GET /status
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    /// Count episodes published after this Unix timestamp (default: 7 days ago)
    pub since: Option<i64>,
}

/// State given either by name (`"WATCHED"`) or by ordinal (`37`)
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum StateInput {
    /// Ordinal as stored
    Ordinal(i32),
    /// Case-insensitive name
    Name(String),
}

impl StateInput {
    /// Resolve to a lifecycle state
    pub fn resolve(&self) -> Result<EpisodeState> {
        match self {
            StateInput::Name(name) => name.parse(),
            StateInput::Ordinal(ordinal) => EpisodeState::ALL
                .into_iter()
                .find(|state| state.to_i32() == *ordinal)
                .ok_or_else(|| Error::InvalidState(ordinal.to_string())),
        }
    }
}

/// Request body for PUT /episodes/:hash/state
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UpdateStateRequest {
    /// Target state
    pub state: StateInput,
}

/// Response for PUT /episodes/:hash/state
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UpdateStateResponse {
    /// Episode hash
    pub hash: String,
    /// State now stored
    pub state: EpisodeState,
}

/// Request body for POST /feeds/check
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CheckFeedRequest {
    /// Feed locator (http, https or file URI)
    pub feed: String,
    /// Extra quality allow-list for this check
    #[serde(default)]
    pub quality: Vec<String>,
    /// Extra season allow-list for this check
    #[serde(default)]
    pub season: Vec<u32>,
}

impl CheckFeedRequest {
    /// Filter overlay for this request, if it sets anything
    pub fn extra_filter(&self) -> Option<FilterConfig> {
        if self.quality.is_empty() && self.season.is_empty() {
            return None;
        }
        Some(FilterConfig {
            series: Vec::new(),
            quality: self.quality.clone(),
            season: self.season.clone(),
        })
    }
}

/// Response for POST /feeds/check
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CheckFeedResponse {
    /// Counts from the check
    #[serde(flatten)]
    pub summary: FeedCheckSummary,
    /// The same counts as one readable line
    pub message: String,
}

impl From<FeedCheckSummary> for CheckFeedResponse {
    fn from(summary: FeedCheckSummary) -> Self {
        let message = summary.to_string();
        Self { summary, message }
    }
}

/// Response for GET /shows
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ShowsResponse {
    /// Normalized series names currently admitted
    pub shows: Vec<String>,
}
