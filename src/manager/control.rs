//! Episode queries, manual overrides and sweeps.

use crate::clients::{AuthOutcome, DeviceChallenge};
use crate::episode::Episode;
use crate::error::Result;
use crate::lifecycle::SweepReport;
use crate::types::{EpisodeState, StatusSummary};
use chrono::Utc;

use super::EpisodeManager;

const SECS_PER_DAY: i64 = 86_400;

impl EpisodeManager {
    /// Stored episodes, newest first
    ///
    /// `state = None` matches every state; `since` keeps episodes published
    /// strictly after it.
    pub async fn list_episodes(
        &self,
        state: Option<EpisodeState>,
        since: Option<i64>,
    ) -> Result<Vec<Episode>> {
        self.db.list_episodes(state, since).await
    }

    /// One episode by hash
    pub async fn get_episode(&self, hash: &str) -> Result<Option<Episode>> {
        self.db.get_by_hash(hash).await
    }

    /// Episodes published in the last `days` days
    pub async fn latest(&self, days: u32) -> Result<Vec<Episode>> {
        let since = Utc::now().timestamp() - i64::from(days) * SECS_PER_DAY;
        self.db.list_episodes(None, Some(since)).await
    }

    /// Count episodes published after `since` per lifecycle bucket
    pub async fn status_summary(&self, since: i64) -> Result<StatusSummary> {
        let mut summary = StatusSummary::default();
        for episode in self.db.list_episodes(None, Some(since)).await? {
            summary.tally(episode.state);
        }
        Ok(summary)
    }

    /// Set an episode's state by hand
    ///
    /// Returns `false` when the hash is unknown. Waits for a running sweep
    /// to finish first.
    pub async fn update_episode(&self, hash: &str, state: EpisodeState) -> Result<bool> {
        self.engine.lock().await.update_episode(hash, state).await
    }

    /// Run one lifecycle sweep
    pub async fn advance(&self) -> Result<SweepReport> {
        self.engine.lock().await.advance().await
    }

    /// Whether the watchlist holds a user token; `None` without a watchlist
    pub async fn watchlist_authenticated(&self) -> Option<bool> {
        self.engine.lock().await.watchlist_authenticated().await
    }

    /// Begin the watchlist device handshake
    pub async fn start_authentication(&self) -> Option<DeviceChallenge> {
        self.engine.lock().await.start_authentication().await
    }

    /// Poll the pending watchlist handshake once
    pub async fn check_authentication(&self) -> Option<AuthOutcome> {
        self.engine.lock().await.check_authentication().await
    }

    /// Cancel a pending watchlist handshake
    pub async fn cancel_authentication(&self) -> bool {
        self.engine.lock().await.cancel_authentication().await
    }
}
