//! Episode lifecycle state machine
//!
//! One [`LifecycleEngine::advance`] call is one sweep. Buckets are snapshotted
//! when the sweep starts and processed in a fixed order:
//!
//! 1. `NEW` → `AVAILABLE` when the library already has the episode,
//!    otherwise submitted to the torrent client and moved to `DOWNLOADING`
//! 2. `DOWNLOADING` → `FINISHED` once the torrent reaches 100%
//! 3. `FINISHED` → `UPDATING` after the torrent is removed and a rescan requested
//! 4. `UPDATING` → `AVAILABLE` once the library has a file for the episode
//! 5. `AVAILABLE` → `WATCHED` once the library reports a play
//!
//! An episode moved by one bucket is not seen by a later bucket until the next
//! sweep. Adapter failures skip the affected episode; store failures abort
//! the sweep.

use crate::clients::{
    AuthOutcome, Connection, DeviceChallenge, KodiConnector, LibraryService, TorrentClient,
    TraktConnector, TransmissionConnector, VideoInfo, WatchlistService,
};
use crate::config::Config;
use crate::db::Database;
use crate::episode::Episode;
use crate::error::{Error, Result};
use crate::types::EpisodeState;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

/// One state change made during a sweep
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Transition {
    /// Episode hash
    pub hash: String,
    /// State before the change
    pub from: EpisodeState,
    /// State after the change
    pub to: EpisodeState,
}

/// What one sweep did
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Episodes in the snapshot taken at sweep start
    pub examined: usize,
    /// State changes in the order they were written
    pub transitions: Vec<Transition>,
}

/// Advances stored episodes by polling the torrent client, library and watchlist
pub struct LifecycleEngine {
    db: Arc<Database>,
    torrent: Connection<dyn TorrentClient>,
    library: Option<Connection<dyn LibraryService>>,
    watchlist: Option<Connection<dyn WatchlistService>>,
    watchlist_list: Option<String>,
}

impl LifecycleEngine {
    /// Engine with only a torrent client
    pub fn new(db: Arc<Database>, torrent: Connection<dyn TorrentClient>) -> Self {
        Self {
            db,
            torrent,
            library: None,
            watchlist: None,
            watchlist_list: None,
        }
    }

    /// Engine wired to the services named in `config`
    ///
    /// Nothing is contacted until the first sweep.
    pub fn from_config(db: Arc<Database>, config: &Config) -> Self {
        let torrent = Connection::new(
            "transmission",
            Box::new(TransmissionConnector::new(config.transmission.clone())),
            config.transmission.timeout,
        );
        let mut engine = Self::new(db, torrent);

        if let Some(kodi) = &config.kodi {
            engine = engine.with_library(Connection::new(
                "kodi",
                Box::new(KodiConnector::new(kodi.clone())),
                kodi.timeout,
            ));
        }
        if let Some(trakt) = &config.trakt {
            engine = engine.with_watchlist(
                Connection::new(
                    "trakt",
                    Box::new(TraktConnector::new(trakt.clone())),
                    trakt.timeout,
                ),
                Some(trakt.list.clone()),
            );
        }
        engine
    }

    /// Attach a library service
    pub fn with_library(mut self, library: Connection<dyn LibraryService>) -> Self {
        self.library = Some(library);
        self
    }

    /// Attach a watchlist service reading shows from `list`
    pub fn with_watchlist(
        mut self,
        watchlist: Connection<dyn WatchlistService>,
        list: Option<String>,
    ) -> Self {
        self.watchlist = Some(watchlist);
        self.watchlist_list = list;
        self
    }

    /// True when a library service is configured
    pub fn has_library(&self) -> bool {
        self.library.is_some()
    }

    /// True when a watchlist service is configured
    pub fn has_watchlist(&self) -> bool {
        self.watchlist.is_some()
    }

    /// Run one sweep over every episode in an active state
    ///
    /// # Errors
    /// Returns the first store error; adapter errors are logged and skipped.
    pub async fn advance(&mut self) -> Result<SweepReport> {
        self.torrent.begin_sweep();
        if let Some(library) = self.library.as_mut() {
            library.begin_sweep();
        }
        if let Some(watchlist) = self.watchlist.as_mut() {
            watchlist.begin_sweep();
        }

        let snapshot = self.db.list_in_states(&EpisodeState::ACTIVE).await?;
        let bucket = |state: EpisodeState| -> Vec<Episode> {
            snapshot
                .iter()
                .filter(|ep| ep.state == state)
                .cloned()
                .collect()
        };
        let new = bucket(EpisodeState::New);
        let downloading = bucket(EpisodeState::Downloading);
        let finished = bucket(EpisodeState::Finished);
        let updating = bucket(EpisodeState::Updating);
        let available = bucket(EpisodeState::Available);

        let mut report = SweepReport {
            examined: snapshot.len(),
            transitions: Vec::new(),
        };

        for ep in &new {
            self.advance_new(ep, &mut report).await?;
        }
        for ep in &downloading {
            self.advance_downloading(ep, &mut report).await?;
        }
        for ep in &finished {
            self.advance_finished(ep, &mut report).await?;
        }
        for ep in &updating {
            self.advance_updating(ep, &mut report).await?;
        }
        for ep in &available {
            self.advance_available(ep, &mut report).await?;
        }

        if !report.transitions.is_empty() {
            info!(
                examined = report.examined,
                transitions = report.transitions.len(),
                "Sweep complete"
            );
        }
        Ok(report)
    }

    async fn transition(
        &self,
        ep: &Episode,
        to: EpisodeState,
        report: &mut SweepReport,
    ) -> Result<()> {
        if self.db.update_state(&ep.hash, to).await? {
            info!(hash = %ep.hash, title = %ep.title, from = %ep.state, to = %to, "Episode advanced");
            report.transitions.push(Transition {
                hash: ep.hash.clone(),
                from: ep.state,
                to,
            });
        }
        Ok(())
    }

    async fn library_video(&mut self, ep: &Episode) -> Option<Option<VideoInfo>> {
        let library = self.library.as_mut()?;
        library
            .call("get_video", |c| async move {
                c.get_video(&ep.showname, ep.season, ep.episode).await
            })
            .await
    }

    async fn rescan(&mut self, ep: &Episode) -> Option<()> {
        let library = self.library.as_mut()?;
        library
            .call("update_lib_path", |c| async move {
                c.update_lib_path(&ep.dir).await
            })
            .await
    }

    async fn submit(&mut self, ep: &Episode) {
        let accepted = self
            .torrent
            .call("add", |c| async move { c.add(&ep.link, &ep.dir).await })
            .await;
        match accepted {
            Some(true) => debug!(hash = %ep.hash, dir = %ep.dir, "Torrent submitted"),
            Some(false) => debug!(hash = %ep.hash, "Torrent client declined submission"),
            None => {}
        }
    }

    async fn remove_torrent(&mut self, ep: &Episode) {
        self.torrent
            .call("remove", |c| async move { c.remove(&ep.hash).await })
            .await;
    }

    async fn report_collected(&mut self, ep: &Episode) {
        if let Some(watchlist) = self.watchlist.as_mut() {
            watchlist
                .call("set_collected", |c| async move {
                    c.set_collected(&ep.showname, ep.season, ep.episode).await
                })
                .await;
        }
    }

    async fn report_watched(&mut self, ep: &Episode) {
        if let Some(watchlist) = self.watchlist.as_mut() {
            watchlist
                .call("set_watched", |c| async move {
                    c.set_watched(&ep.showname, ep.season, ep.episode).await
                })
                .await;
        }
    }

    async fn advance_new(&mut self, ep: &Episode, report: &mut SweepReport) -> Result<()> {
        if let Some(Some(video)) = self.library_video(ep).await
            && video.has_file()
        {
            return self.transition(ep, EpisodeState::Available, report).await;
        }

        let Some(existing) = self
            .torrent
            .call("get", |c| async move { c.get(&ep.hash).await })
            .await
        else {
            return Ok(());
        };
        if existing.is_none() {
            self.submit(ep).await;
        }
        self.transition(ep, EpisodeState::Downloading, report).await
    }

    async fn advance_downloading(&mut self, ep: &Episode, report: &mut SweepReport) -> Result<()> {
        let Some(existing) = self
            .torrent
            .call("get", |c| async move { c.get(&ep.hash).await })
            .await
        else {
            return Ok(());
        };

        match existing {
            None => {
                debug!(hash = %ep.hash, "Torrent missing from client, resubmitting");
                self.submit(ep).await;
                Ok(())
            }
            Some(status) if status.is_complete() => {
                self.torrent
                    .call("stop", |c| async move { c.stop(&ep.hash).await })
                    .await;
                self.transition(ep, EpisodeState::Finished, report).await
            }
            Some(status) => {
                debug!(hash = %ep.hash, progress = status.progress, "Download in progress");
                self.torrent
                    .call("start", |c| async move { c.start(&ep.hash).await })
                    .await;
                Ok(())
            }
        }
    }

    async fn advance_finished(&mut self, ep: &Episode, report: &mut SweepReport) -> Result<()> {
        self.remove_torrent(ep).await;
        if !self.has_library() {
            return Ok(());
        }
        self.rescan(ep).await;
        self.transition(ep, EpisodeState::Updating, report).await
    }

    async fn advance_updating(&mut self, ep: &Episode, report: &mut SweepReport) -> Result<()> {
        match self.library_video(ep).await {
            Some(Some(video)) if video.has_file() => {
                self.transition(ep, EpisodeState::Available, report).await?;
                self.remove_torrent(ep).await;
                self.report_collected(ep).await;
                Ok(())
            }
            Some(_) => {
                debug!(hash = %ep.hash, dir = %ep.dir, "Not in library yet, rescanning");
                self.rescan(ep).await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn advance_available(&mut self, ep: &Episode, report: &mut SweepReport) -> Result<()> {
        if let Some(Some(video)) = self.library_video(ep).await
            && video.playcount >= 1
        {
            self.transition(ep, EpisodeState::Watched, report).await?;
            self.report_watched(ep).await;
        }
        Ok(())
    }

    /// Set an episode's state directly
    ///
    /// Setting `AVAILABLE` removes the torrent; setting `WATCHED` reports the
    /// episode as watched. Returns `false` when the hash is unknown.
    pub async fn update_episode(&mut self, hash: &str, state: EpisodeState) -> Result<bool> {
        let Some(ep) = self.db.get_by_hash(hash).await? else {
            return Ok(false);
        };
        if !self.db.update_state(hash, state).await? {
            return Ok(false);
        }
        info!(hash = %hash, from = %ep.state, to = %state, "Episode state set manually");

        match state {
            EpisodeState::Available => {
                self.torrent.begin_sweep();
                self.remove_torrent(&ep).await;
            }
            EpisodeState::Watched => {
                if let Some(watchlist) = self.watchlist.as_mut() {
                    watchlist.begin_sweep();
                }
                self.report_watched(&ep).await;
            }
            _ => {}
        }
        Ok(true)
    }

    /// Shows on the configured watchlist, `None` when unavailable
    pub async fn watchlist_shows(&mut self) -> Option<Vec<String>> {
        let list = self.watchlist_list.clone();
        let watchlist = self.watchlist.as_mut()?;
        watchlist.begin_sweep();
        watchlist
            .call("get_shows", |c| async move { c.get_shows(list.as_deref()).await })
            .await
    }

    /// Whether the watchlist holds a user token; `None` when unavailable
    pub async fn watchlist_authenticated(&mut self) -> Option<bool> {
        let watchlist = self.watchlist.as_mut()?;
        watchlist.begin_sweep();
        watchlist
            .call("is_authenticated", |c| async move {
                Ok::<_, Error>(c.is_authenticated().await)
            })
            .await
    }

    /// Begin the watchlist device handshake
    pub async fn start_authentication(&mut self) -> Option<DeviceChallenge> {
        let watchlist = self.watchlist.as_mut()?;
        watchlist.begin_sweep();
        watchlist
            .call("start_authentication", |c| async move {
                c.start_authentication().await
            })
            .await
    }

    /// Poll the pending handshake once
    pub async fn check_authentication(&mut self) -> Option<AuthOutcome> {
        let watchlist = self.watchlist.as_mut()?;
        watchlist.begin_sweep();
        watchlist
            .call("check_authentication", |c| async move {
                c.check_authentication().await
            })
            .await
    }

    /// Cancel a pending handshake; `true` if one was pending
    pub async fn cancel_authentication(&mut self) -> bool {
        let Some(watchlist) = self.watchlist.as_mut() else {
            return false;
        };
        watchlist.begin_sweep();
        watchlist
            .call("cancel_authentication", |c| async move {
                Ok::<_, Error>(c.cancel_authentication().await)
            })
            .await
            .unwrap_or(false)
    }

    /// Drop every adapter handle
    pub fn disconnect_all(&mut self) {
        self.torrent.disconnect();
        if let Some(library) = self.library.as_mut() {
            library.disconnect();
        }
        if let Some(watchlist) = self.watchlist.as_mut() {
            watchlist.disconnect();
        }
    }
}
