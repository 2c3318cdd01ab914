//! Transmission RPC adapter.
//!
//! Speaks the JSON protocol at `/transmission/rpc`. The server answers the
//! first request of a session with HTTP 409 and an `X-Transmission-Session-Id`
//! header that must be echoed on every following request.

use super::{Connector, TorrentClient, TorrentState, TorrentStatus};
use crate::config::TransmissionConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;

const SERVICE: &str = "transmission";
const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const TORRENT_FIELDS: [&str; 7] = [
    "name",
    "status",
    "hashString",
    "eta",
    "rateDownload",
    "leftUntilDone",
    "totalSize",
];

/// Transmission RPC client
pub struct TransmissionClient {
    http_client: reqwest::Client,
    rpc_url: String,
    username: Option<String>,
    password: Option<String>,
    session_id: RwLock<Option<String>>,
}

impl TransmissionClient {
    /// Build a client for the configured host; no request is sent
    pub fn new(config: &TransmissionConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            rpc_url: format!("http://{}:{}/transmission/rpc", config.host, config.port),
            username: config.username.clone(),
            password: config.password.clone(),
            session_id: RwLock::new(None),
        })
    }

    /// Override the RPC endpoint
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    /// Fetch session statistics; used to verify the connection
    pub async fn session_stats(&self) -> Result<Value> {
        self.rpc("session-stats", json!({})).await
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let mut request = self.http_client.post(&self.rpc_url).json(body);
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_ref());
        }
        if let Some(session_id) = self.session_id.read().await.as_ref() {
            request = request.header(SESSION_HEADER, session_id);
        }
        Ok(request.send().await?)
    }

    /// Call an RPC method and return its `arguments` object
    async fn rpc(&self, method: &str, arguments: Value) -> Result<Value> {
        let body = json!({ "method": method, "arguments": arguments });

        let mut response = self.send(&body).await?;
        if response.status() == StatusCode::CONFLICT {
            let session_id = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| Error::client(SERVICE, "409 without session id"))?;
            *self.session_id.write().await = Some(session_id);
            response = self.send(&body).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(Error::client(
                SERVICE,
                format!("{} returned HTTP {}", method, status.as_u16()),
            ));
        }

        let mut reply: Value = response.json().await?;
        match reply.get("result").and_then(Value::as_str) {
            Some("success") => Ok(reply
                .get_mut("arguments")
                .map(Value::take)
                .unwrap_or(Value::Null)),
            Some(other) => Err(Error::client(SERVICE, format!("{}: {}", method, other))),
            None => Err(Error::client(SERVICE, format!("{}: malformed reply", method))),
        }
    }
}

fn torrent_status(torrent: &Value) -> TorrentStatus {
    let int = |key: &str| torrent.get(key).and_then(Value::as_i64).unwrap_or(0);
    let total = int("totalSize");
    let left = int("leftUntilDone");
    let progress = if total > 0 {
        100.0 - (left as f64) * 100.0 / (total as f64)
    } else {
        0.0
    };

    TorrentStatus {
        hash: torrent
            .get("hashString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: torrent
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        progress,
        status: TorrentState::from_code(int("status")),
        eta: int("eta"),
        rate_download: int("rateDownload"),
    }
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    async fn get(&self, hash: &str) -> Result<Option<TorrentStatus>> {
        let args = self
            .rpc(
                "torrent-get",
                json!({ "ids": [hash], "fields": TORRENT_FIELDS }),
            )
            .await?;

        Ok(args
            .get("torrents")
            .and_then(Value::as_array)
            .and_then(|torrents| torrents.first())
            .map(torrent_status))
    }

    async fn add(&self, link: &str, dir: &str) -> Result<bool> {
        let args = self
            .rpc(
                "torrent-add",
                json!({ "filename": link, "download-dir": dir, "paused": false }),
            )
            .await?;

        Ok(args.get("torrent-added").is_some() || args.get("torrent-duplicate").is_some())
    }

    async fn start(&self, hash: &str) -> Result<()> {
        self.rpc("torrent-start", json!({ "ids": [hash] })).await?;
        Ok(())
    }

    async fn stop(&self, hash: &str) -> Result<()> {
        self.rpc("torrent-stop", json!({ "ids": [hash] })).await?;
        Ok(())
    }

    async fn remove(&self, hash: &str) -> Result<()> {
        self.rpc(
            "torrent-remove",
            json!({ "ids": [hash], "delete-local-data": false }),
        )
        .await?;
        Ok(())
    }
}

/// Opens a [`TransmissionClient`] and checks it with `session-stats`
pub struct TransmissionConnector {
    config: TransmissionConfig,
}

impl TransmissionConnector {
    /// Connector for the configured server
    pub fn new(config: TransmissionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector<dyn TorrentClient> for TransmissionConnector {
    async fn connect(&self) -> Result<Arc<dyn TorrentClient>> {
        let client = TransmissionClient::new(&self.config)?;
        client.session_stats().await?;
        Ok(Arc::new(client))
    }
}
