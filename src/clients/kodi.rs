//! Kodi JSON-RPC adapter.

use super::{Connector, LibraryService, VideoInfo};
use crate::config::KodiConfig;
use crate::episode::sanitize_show_name;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const SERVICE: &str = "kodi";

#[derive(Debug, Deserialize)]
struct RpcReply<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct TvShows {
    #[serde(default)]
    tvshows: Vec<TvShow>,
}

#[derive(Debug, Deserialize)]
struct TvShow {
    tvshowid: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct Episodes {
    #[serde(default)]
    episodes: Vec<LibraryEpisode>,
}

#[derive(Debug, Deserialize)]
struct LibraryEpisode {
    episode: u32,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    playcount: u32,
}

/// Kodi JSON-RPC client
pub struct KodiClient {
    http_client: reqwest::Client,
    rpc_url: String,
    username: Option<String>,
    password: Option<String>,
    next_id: AtomicU64,
}

impl KodiClient {
    /// Build a client for the configured host; no request is sent
    pub fn new(config: &KodiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            rpc_url: format!("http://{}:{}/jsonrpc", config.host, config.port),
            username: config.username.clone(),
            password: config.password.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Override the RPC endpoint
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    /// `JSONRPC.Ping`
    pub async fn ping(&self) -> Result<()> {
        let _: Value = self.rpc("JSONRPC.Ping", json!({})).await?;
        Ok(())
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let mut request = self.http_client.post(&self.rpc_url).json(&body);
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_ref());
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::client(
                SERVICE,
                format!("{} returned HTTP {}", method, status.as_u16()),
            ));
        }

        let reply: RpcReply<T> = response.json().await?;
        if let Some(err) = reply.error {
            return Err(Error::client(
                SERVICE,
                format!("{} failed ({}): {}", method, err.code, err.message),
            ));
        }
        reply
            .result
            .ok_or_else(|| Error::client(SERVICE, format!("{}: empty result", method)))
    }

    async fn find_show(&self, showname: &str) -> Result<Option<i64>> {
        let shows: TvShows = self
            .rpc(
                "VideoLibrary.GetTVShows",
                json!({ "properties": ["title"] }),
            )
            .await?;

        let wanted = sanitize_show_name(showname).to_lowercase();
        Ok(shows
            .tvshows
            .into_iter()
            .find(|show| sanitize_show_name(&show.title).to_lowercase() == wanted)
            .map(|show| show.tvshowid))
    }
}

#[async_trait]
impl LibraryService for KodiClient {
    async fn get_video(
        &self,
        showname: &str,
        season: u32,
        episode: u32,
    ) -> Result<Option<VideoInfo>> {
        let Some(tvshowid) = self.find_show(showname).await? else {
            debug!(show = %showname, "Show not in library");
            return Ok(None);
        };

        let episodes: Episodes = self
            .rpc(
                "VideoLibrary.GetEpisodes",
                json!({
                    "tvshowid": tvshowid,
                    "season": season,
                    "properties": ["episode", "file", "playcount"],
                }),
            )
            .await?;

        Ok(episodes
            .episodes
            .into_iter()
            .find(|e| e.episode == episode)
            .map(|e| VideoInfo {
                file: e.file,
                playcount: e.playcount,
            }))
    }

    async fn update_lib_path(&self, dir: &str) -> Result<()> {
        let _: Value = self
            .rpc("VideoLibrary.Scan", json!({ "directory": dir }))
            .await?;
        Ok(())
    }
}

/// Opens a [`KodiClient`] and checks it with `JSONRPC.Ping`
pub struct KodiConnector {
    config: KodiConfig,
}

impl KodiConnector {
    /// Connector for the configured library
    pub fn new(config: KodiConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector<dyn LibraryService> for KodiConnector {
    async fn connect(&self) -> Result<Arc<dyn LibraryService>> {
        let client = KodiClient::new(&self.config)?;
        client.ping().await?;
        Ok(Arc::new(client))
    }
}
