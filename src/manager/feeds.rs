//! Feed checks and show-list resolution.

use crate::config::FilterConfig;
use crate::error::Result;
use crate::filter::AdmissionFilter;
use crate::types::{EpisodeState, FeedCheckSummary};
use tracing::{debug, info, warn};

use super::EpisodeManager;

impl EpisodeManager {
    /// Run one feed through ingest, filter and store
    ///
    /// `extra` replaces each allow-list it sets on top of the resolved
    /// filter, for this check only. Fetch and parse failures count as an
    /// empty feed.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub async fn check_feed(
        &self,
        uri: &str,
        extra: Option<&FilterConfig>,
    ) -> Result<FeedCheckSummary> {
        let template = self
            .config
            .feeds
            .iter()
            .find(|feed| feed.uri == uri)
            .map(|feed| self.config.dir_template_for(feed))
            .unwrap_or(self.config.download_dir.as_str());

        let episodes = self.ingester.ingest(uri, template).await;

        let filter = {
            let resolved = self.filter.read().await;
            match extra {
                Some(extra) => resolved.overlay(extra),
                None => resolved.clone(),
            }
        };

        let mut summary = FeedCheckSummary::new(uri);
        summary.total = episodes.len();

        for mut episode in episodes {
            let reason = filter.evaluate(&episode);
            if !reason.is_accepted() {
                debug!(title = %episode.title, reason = %reason, "Episode skipped");
                summary.record_rejection(reason);
                continue;
            }

            episode.state = EpisodeState::New;
            match self.db.insert_if_absent(&episode).await? {
                Some(stored) => {
                    info!(hash = %stored.hash, title = %stored.title, dir = %stored.dir, "New episode");
                    summary.accepted += 1;
                }
                None => summary.existing += 1,
            }
        }

        debug!(summary = %summary, "Feed checked");
        Ok(summary)
    }

    /// Check every configured feed and fold the results
    ///
    /// # Errors
    /// Returns the first store error.
    pub async fn check_feeds(&self) -> Result<FeedCheckSummary> {
        let mut total = FeedCheckSummary::new("all feeds");
        for feed in &self.config.feeds {
            let summary = self.check_feed(&feed.uri, None).await?;
            if summary.accepted > 0 {
                info!(summary = %summary, "Feed checked");
            }
            total.merge(&summary);
        }
        Ok(total)
    }

    /// Re-resolve the series allow-list from configuration and watchlist
    ///
    /// Returns the resolved list. When the watchlist cannot be read the
    /// configured list alone is used.
    pub async fn refresh_filter(&self) -> Vec<String> {
        let mut filter = AdmissionFilter::from_config(&self.config.filters);

        let (has_watchlist, shows) = {
            let mut engine = self.engine.lock().await;
            let has_watchlist = engine.has_watchlist();
            let shows = if has_watchlist {
                engine.watchlist_shows().await
            } else {
                None
            };
            (has_watchlist, shows)
        };
        match shows {
            Some(shows) => {
                debug!(count = shows.len(), "Watchlist shows resolved");
                filter.extend_series(&shows);
            }
            None if has_watchlist => {
                warn!("Watchlist unavailable, using configured series list");
            }
            None => {}
        }

        let series: Vec<String> = filter.series().map(str::to_string).collect();
        *self.filter.write().await = filter;
        series
    }

    /// Series allow-list currently in force
    pub async fn series(&self) -> Vec<String> {
        self.filter
            .read()
            .await
            .series()
            .map(str::to_string)
            .collect()
    }
}
