//! Remote service adapters
//!
//! The lifecycle engine talks to three services through the traits defined
//! here. Each trait has one HTTP implementation:
//! - [`transmission`] — torrent client (Transmission RPC)
//! - [`kodi`] — media library (Kodi JSON-RPC)
//! - [`trakt`] — watchlist and progress reporting (Trakt API v2)
//!
//! Connections are opened lazily and dropped on failure, see [`connection`].

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

pub mod connection;
pub mod kodi;
pub mod trakt;
pub mod transmission;

pub use connection::{Connection, ConnectionState, Connector, Ready};
pub use kodi::{KodiClient, KodiConnector};
pub use trakt::{TraktClient, TraktConnector, TraktSession};
pub use transmission::{TransmissionClient, TransmissionConnector};

/// Transmission torrent status codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Torrent is stopped
    Stopped,
    /// Queued to check files
    CheckWait,
    /// Checking files
    Check,
    /// Queued to download
    DownloadWait,
    /// Downloading
    Download,
    /// Queued to seed
    SeedWait,
    /// Seeding
    Seed,
    /// No peers reachable
    Isolated,
}

impl TorrentState {
    /// Map a Transmission status code
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => TorrentState::CheckWait,
            2 => TorrentState::Check,
            3 => TorrentState::DownloadWait,
            4 => TorrentState::Download,
            5 => TorrentState::SeedWait,
            6 => TorrentState::Seed,
            7 => TorrentState::Isolated,
            _ => TorrentState::Stopped,
        }
    }
}

/// What the torrent client reports for one torrent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TorrentStatus {
    /// Info hash
    pub hash: String,
    /// Torrent name
    pub name: String,
    /// Completion in percent (0-100)
    pub progress: f64,
    /// Client-side status
    pub status: TorrentState,
    /// Estimated seconds left (negative when unknown)
    pub eta: i64,
    /// Download rate in bytes per second
    pub rate_download: i64,
}

impl TorrentStatus {
    /// True once every byte has been downloaded
    pub fn is_complete(&self) -> bool {
        self.progress >= 100.0
    }
}

/// What the library reports for one episode
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VideoInfo {
    /// File backing the episode, if any
    pub file: Option<String>,
    /// Times played
    pub playcount: u32,
}

impl VideoInfo {
    /// True when the library has a file for the episode
    pub fn has_file(&self) -> bool {
        self.file.as_deref().is_some_and(|f| !f.is_empty())
    }
}

/// Device-code challenge shown to the user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceChallenge {
    /// Opaque code polled for a token
    pub device_code: String,
    /// Code the user types at `verification_url`
    pub user_code: String,
    /// Where the user enters `user_code`
    pub verification_url: String,
    /// Minimum time between polls
    #[serde(with = "secs")]
    #[schema(value_type = u64)]
    pub interval: Duration,
    /// Lifetime of the challenge
    #[serde(with = "secs")]
    #[schema(value_type = u64)]
    pub expires_in: Duration,
}

/// Result of one authentication poll
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    /// User has not answered yet
    Pending,
    /// Polling too fast; wait longer before the next poll
    SlowDown,
    /// Token obtained and stored
    Authorized,
    /// User refused
    Denied,
    /// Challenge expired or was rejected
    Expired,
    /// Cancelled locally
    Cancelled,
}

impl AuthOutcome {
    /// True when polling should stop
    pub fn is_terminal(self) -> bool {
        !matches!(self, AuthOutcome::Pending | AuthOutcome::SlowDown)
    }
}

/// Torrent client operations used by the lifecycle engine
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Look a torrent up by info hash
    async fn get(&self, hash: &str) -> Result<Option<TorrentStatus>>;

    /// Submit a torrent; `true` when the client accepted it (or already had it)
    async fn add(&self, link: &str, dir: &str) -> Result<bool>;

    /// Start (or resume) a torrent
    async fn start(&self, hash: &str) -> Result<()>;

    /// Stop a torrent
    async fn stop(&self, hash: &str) -> Result<()>;

    /// Remove a torrent, keeping its data; unknown hashes are not an error
    async fn remove(&self, hash: &str) -> Result<()>;
}

/// Media library operations used by the lifecycle engine
#[async_trait]
pub trait LibraryService: Send + Sync {
    /// Look an episode up
    async fn get_video(
        &self,
        showname: &str,
        season: u32,
        episode: u32,
    ) -> Result<Option<VideoInfo>>;

    /// Ask the library to rescan `dir`; does not wait for the scan
    async fn update_lib_path(&self, dir: &str) -> Result<()>;
}

/// Watchlist operations used by the scheduler and the lifecycle engine
#[async_trait]
pub trait WatchlistService: Send + Sync {
    /// Show titles on `list` (the watchlist when `None`)
    async fn get_shows(&self, list: Option<&str>) -> Result<Vec<String>>;

    /// Report an episode as collected
    async fn set_collected(&self, showname: &str, season: u32, episode: u32) -> Result<()>;

    /// Report an episode as watched
    async fn set_watched(&self, showname: &str, season: u32, episode: u32) -> Result<()>;

    /// True when a user token is available
    async fn is_authenticated(&self) -> bool;

    /// Begin a device-code handshake
    async fn start_authentication(&self) -> Result<DeviceChallenge>;

    /// Poll the pending handshake once
    async fn check_authentication(&self) -> Result<AuthOutcome>;

    /// Abandon the pending handshake; `true` if one was pending
    async fn cancel_authentication(&self) -> bool;
}

// Duration as whole seconds
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
