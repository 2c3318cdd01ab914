//! Trakt API v2 adapter.
//!
//! Reads show titles from a user's watchlist or a named list and reports
//! collected/watched episodes. User tokens come from the OAuth device flow
//! and are persisted as JSON at the configured token path.

use super::{AuthOutcome, Connector, DeviceChallenge, WatchlistService};
use crate::config::TraktConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

const SERVICE: &str = "trakt";
const API_VERSION: &str = "2";
const WATCHLIST: &str = "watchlist";

/// OAuth token as returned by the token endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraktToken {
    /// Bearer token
    pub access_token: String,
    /// Token used to obtain a new access token
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Issue time (unix seconds)
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    show: Option<ShowRef>,
}

#[derive(Debug, Deserialize)]
struct ShowRef {
    title: String,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeReply {
    device_code: String,
    user_code: String,
    verification_url: String,
    expires_in: u64,
    interval: u64,
}

/// User token and pending device handshake
///
/// Outlives any single [`TraktClient`]: a connector hands the same session to
/// every client it builds, so a dropped connection keeps both.
#[derive(Default)]
pub struct TraktSession {
    token: RwLock<Option<TraktToken>>,
    pending: Mutex<Option<DeviceChallenge>>,
}

impl TraktSession {
    /// True while a token is held
    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// True while a device handshake awaits the user
    pub async fn has_pending(&self) -> bool {
        self.pending.lock().await.is_some()
    }
}

/// Trakt API client
pub struct TraktClient {
    http_client: reqwest::Client,
    config: TraktConfig,
    token_path: PathBuf,
    session: Arc<TraktSession>,
}

impl TraktClient {
    /// Build a client with a fresh session; the token is not loaded yet
    pub fn new(config: &TraktConfig) -> Result<Self> {
        Self::with_session(config, Arc::default())
    }

    /// Build a client sharing `session`
    pub fn with_session(config: &TraktConfig, session: Arc<TraktSession>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            token_path: config.token_path.clone(),
            config: config.clone(),
            session,
        })
    }

    /// Path the token is persisted to
    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Load a stored token, if any
    ///
    /// A missing file is not an error; an unreadable one is.
    pub async fn load_token(&self) -> Result<bool> {
        let content = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let token: TraktToken = serde_json::from_str(&content)?;
        *self.session.token.write().await = Some(token);
        debug!(path = %self.token_path.display(), "Loaded Trakt token");
        Ok(true)
    }

    async fn store_token(&self, token: TraktToken) -> Result<()> {
        if let Some(parent) = self.token_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&token)?;
        tokio::fs::write(&self.token_path, content).await?;
        *self.session.token.write().await = Some(token);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .http_client
            .request(method, self.url(path))
            .header("trakt-api-version", API_VERSION)
            .header("trakt-api-key", &self.config.client_id);
        if let Some(token) = self.session.token.read().await.as_ref() {
            request = request.bearer_auth(&token.access_token);
        }
        request
    }

    async fn sync(&self, endpoint: &str, showname: &str, season: u32, episode: u32) -> Result<()> {
        if !self.config.report_progress {
            return Ok(());
        }
        if !self.is_authenticated().await {
            return Err(Error::client(SERVICE, "not authenticated"));
        }

        let body = json!({
            "shows": [{
                "title": showname,
                "seasons": [{ "number": season, "episodes": [{ "number": episode }] }]
            }]
        });
        let response = self
            .request(Method::POST, endpoint)
            .await
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::client(
                SERVICE,
                format!("{} returned HTTP {}", endpoint, status.as_u16()),
            ));
        }
        debug!(show = %showname, season, episode, endpoint, "Reported progress");
        Ok(())
    }
}

#[async_trait]
impl WatchlistService for TraktClient {
    async fn get_shows(&self, list: Option<&str>) -> Result<Vec<String>> {
        let user = urlencoding::encode(&self.config.username);
        let path = match list {
            None | Some(WATCHLIST) => format!("/users/{}/watchlist/shows", user),
            Some(slug) => format!(
                "/users/{}/lists/{}/items/shows",
                user,
                urlencoding::encode(slug)
            ),
        };

        let response = self.request(Method::GET, &path).await.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::client(
                SERVICE,
                format!("{} returned HTTP {}", path, status.as_u16()),
            ));
        }

        let items: Vec<ListItem> = response.json().await?;
        Ok(items
            .into_iter()
            .filter_map(|item| item.show.map(|show| show.title))
            .collect())
    }

    async fn set_collected(&self, showname: &str, season: u32, episode: u32) -> Result<()> {
        self.sync("/sync/collection", showname, season, episode).await
    }

    async fn set_watched(&self, showname: &str, season: u32, episode: u32) -> Result<()> {
        self.sync("/sync/history", showname, season, episode).await
    }

    async fn is_authenticated(&self) -> bool {
        self.session.has_token().await
    }

    async fn start_authentication(&self) -> Result<DeviceChallenge> {
        let response = self
            .request(Method::POST, "/oauth/device/code")
            .await
            .json(&json!({ "client_id": self.config.client_id }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::client(
                SERVICE,
                format!("device code request returned HTTP {}", status.as_u16()),
            ));
        }

        let reply: DeviceCodeReply = response.json().await?;
        let challenge = DeviceChallenge {
            device_code: reply.device_code,
            user_code: reply.user_code,
            verification_url: reply.verification_url,
            interval: Duration::from_secs(reply.interval),
            expires_in: Duration::from_secs(reply.expires_in),
        };
        *self.session.pending.lock().await = Some(challenge.clone());
        Ok(challenge)
    }

    async fn check_authentication(&self) -> Result<AuthOutcome> {
        let Some(device_code) = self
            .session
            .pending
            .lock()
            .await
            .as_ref()
            .map(|c| c.device_code.clone())
        else {
            return Ok(AuthOutcome::Cancelled);
        };

        let response = self
            .request(Method::POST, "/oauth/device/token")
            .await
            .json(&json!({
                "code": device_code,
                "client_id": self.config.client_id,
                "client_secret": self.config.client_secret,
            }))
            .send()
            .await?;

        let outcome = match response.status() {
            StatusCode::OK => {
                let token: TraktToken = response.json().await?;
                self.store_token(token).await?;
                info!(path = %self.token_path.display(), "Trakt authorization stored");
                AuthOutcome::Authorized
            }
            StatusCode::BAD_REQUEST => AuthOutcome::Pending,
            StatusCode::TOO_MANY_REQUESTS => AuthOutcome::SlowDown,
            StatusCode::IM_A_TEAPOT => AuthOutcome::Denied,
            StatusCode::GONE | StatusCode::NOT_FOUND | StatusCode::CONFLICT => {
                AuthOutcome::Expired
            }
            other => {
                return Err(Error::client(
                    SERVICE,
                    format!("token poll returned HTTP {}", other.as_u16()),
                ));
            }
        };

        if outcome.is_terminal() {
            *self.session.pending.lock().await = None;
        }
        Ok(outcome)
    }

    async fn cancel_authentication(&self) -> bool {
        self.session.pending.lock().await.take().is_some()
    }
}

/// Opens [`TraktClient`]s over one shared [`TraktSession`]
pub struct TraktConnector {
    config: TraktConfig,
    session: Arc<TraktSession>,
}

impl TraktConnector {
    /// Connector for the configured account
    pub fn new(config: TraktConfig) -> Self {
        Self {
            config,
            session: Arc::default(),
        }
    }

    /// Session shared by every client this connector opens
    pub fn session(&self) -> Arc<TraktSession> {
        self.session.clone()
    }
}

#[async_trait]
impl Connector<dyn WatchlistService> for TraktConnector {
    async fn connect(&self) -> Result<Arc<dyn WatchlistService>> {
        let client = TraktClient::with_session(&self.config, self.session.clone())?;
        if !self.session.has_token().await && !client.load_token().await? {
            info!("No Trakt token stored, authorization required");
        }
        Ok(Arc::new(client))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, dir: &TempDir) -> TraktConfig {
        TraktConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            username: "someone".into(),
            list: WATCHLIST.into(),
            report_progress: true,
            token_path: dir.path().join("trakt.json"),
            api_url: server.uri(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn reads_watchlist_titles() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/users/someone/watchlist/shows"))
            .and(header("trakt-api-key", "cid"))
            .and(header("trakt-api-version", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"rank": 1, "type": "show", "show": {"title": "First Show", "year": 2020}},
                {"rank": 2, "type": "show", "show": {"title": "Second Show", "year": 2021}}
            ])))
            .mount(&server)
            .await;

        let client = TraktClient::new(&config(&server, &dir)).unwrap();
        let shows = client.get_shows(None).await.unwrap();
        assert_eq!(shows, vec!["First Show", "Second Show"]);
    }

    #[tokio::test]
    async fn reads_named_list() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/users/someone/lists/my-shows/items/shows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"type": "show", "show": {"title": "Listed"}}
            ])))
            .mount(&server)
            .await;

        let client = TraktClient::new(&config(&server, &dir)).unwrap();
        assert_eq!(client.get_shows(Some("my-shows")).await.unwrap(), vec!["Listed"]);
    }

    #[tokio::test]
    async fn progress_requires_token() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let client = TraktClient::new(&config(&server, &dir)).unwrap();

        assert!(!client.is_authenticated().await);
        assert!(client.set_watched("Show", 1, 1).await.is_err());
    }

    #[tokio::test]
    async fn progress_disabled_is_noop() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&server, &dir);
        cfg.report_progress = false;

        let client = TraktClient::new(&cfg).unwrap();
        client.set_collected("Show", 1, 1).await.unwrap();
    }

    #[tokio::test]
    async fn device_flow_stores_token() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("POST"))
            .and(path("/oauth/device/code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dev123",
                "user_code": "ABCD1234",
                "verification_url": "https://trakt.tv/activate",
                "expires_in": 600,
                "interval": 5
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/device/token"))
            .and(body_partial_json(json!({"code": "dev123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "bearer",
                "expires_in": 7776000,
                "refresh_token": "ref",
                "scope": "public",
                "created_at": 1700000000
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sync/history"))
            .and(header("authorization", "Bearer tok"))
            .and(body_partial_json(json!({
                "shows": [{"title": "Show", "seasons": [{"number": 2, "episodes": [{"number": 5}]}]}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config(&server, &dir);
        let client = TraktClient::new(&cfg).unwrap();
        let challenge = client.start_authentication().await.unwrap();
        assert_eq!(challenge.user_code, "ABCD1234");
        assert_eq!(challenge.interval, Duration::from_secs(5));

        assert_eq!(
            client.check_authentication().await.unwrap(),
            AuthOutcome::Authorized
        );
        assert!(client.is_authenticated().await);
        assert!(cfg.token_path.exists());
        client.set_watched("Show", 2, 5).await.unwrap();

        // a fresh client picks the stored token up
        let reloaded = TraktClient::new(&cfg).unwrap();
        assert!(reloaded.load_token().await.unwrap());
        assert!(reloaded.is_authenticated().await);
    }

    #[tokio::test]
    async fn pending_poll_and_cancel() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("POST"))
            .and(path("/oauth/device/code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dev", "user_code": "U", "verification_url": "v",
                "expires_in": 600, "interval": 5
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/device/token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = TraktClient::new(&config(&server, &dir)).unwrap();
        assert!(!client.cancel_authentication().await);
        client.start_authentication().await.unwrap();

        assert_eq!(client.check_authentication().await.unwrap(), AuthOutcome::Pending);
        assert!(client.cancel_authentication().await);
        assert_eq!(
            client.check_authentication().await.unwrap(),
            AuthOutcome::Cancelled
        );
    }

    #[tokio::test]
    async fn reconnect_keeps_pending_handshake() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("POST"))
            .and(path("/oauth/device/code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dev", "user_code": "U", "verification_url": "v",
                "expires_in": 600, "interval": 5
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/device/token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let connector = TraktConnector::new(config(&server, &dir));
        let first = connector.connect().await.unwrap();
        first.start_authentication().await.unwrap();
        drop(first);

        // a client built after the first was dropped still sees the handshake
        let second = connector.connect().await.unwrap();
        assert!(connector.session().has_pending().await);
        assert_eq!(second.check_authentication().await.unwrap(), AuthOutcome::Pending);
        assert!(second.cancel_authentication().await);
        assert!(!connector.session().has_pending().await);
    }
}
