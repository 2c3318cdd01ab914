//! Configuration types for rssdld

use crate::episode::validate_dir_template;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Name of the configuration file inside the configuration directory
pub const CONFIG_FILE: &str = "configuration.json";

/// Default name of the episode database inside the configuration directory
pub const DB_FILE: &str = "shows.db";

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Seconds between feed polls; zero or negative disables feed polling (default: 300)
    #[serde(default = "default_feed_poll_interval")]
    pub feed_poll_interval: i64,

    /// Seconds between lifecycle sweeps; zero or negative disables them (default: 60)
    #[serde(default = "default_progress_poll_interval", alias = "lib_update_interval")]
    pub progress_poll_interval: i64,

    /// Default download directory template
    ///
    /// `{seriesname}` is replaced with the sanitized show name and
    /// `{seasonno}` (or `{seasonno:02}`) with the season number.
    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    /// Feeds to poll
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,

    /// Admission filter allow-lists
    #[serde(default)]
    pub filters: FilterConfig,

    /// Transmission RPC connection
    #[serde(default)]
    pub transmission: TransmissionConfig,

    /// Kodi JSON-RPC connection (None = no library service)
    #[serde(default)]
    pub kodi: Option<KodiConfig>,

    /// Trakt account (None = no watchlist service)
    #[serde(default)]
    pub trakt: Option<TraktConfig>,

    /// Persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_poll_interval: default_feed_poll_interval(),
            progress_poll_interval: default_progress_poll_interval(),
            download_dir: default_download_dir(),
            feeds: vec![],
            filters: FilterConfig::default(),
            transmission: TransmissionConfig::default(),
            kodi: None,
            trakt: None,
            persistence: PersistenceConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// One polled feed
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedConfig {
    /// Feed locator (`http(s)://` URL or `file://` path)
    pub uri: String,

    /// Directory template for this feed (default: the top-level `download_dir`)
    #[serde(default)]
    pub download_dir: Option<String>,
}

/// Admission filter allow-lists (empty = no constraint)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FilterConfig {
    /// Show names
    #[serde(default, alias = "seriesname")]
    pub series: Vec<String>,

    /// Quality tags (`480p`, `720p`, `1080p`, `na`)
    #[serde(default)]
    pub quality: Vec<String>,

    /// Season numbers
    #[serde(default)]
    pub season: Vec<u32>,
}

/// Transmission RPC connection settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TransmissionConfig {
    /// Host (default: "localhost")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port (default: 9091)
    #[serde(default = "default_transmission_port")]
    pub port: u16,

    /// RPC username
    #[serde(default)]
    pub username: Option<String>,

    /// RPC password
    #[serde(default)]
    pub password: Option<String>,

    /// Per-call time budget in seconds (default: 10)
    #[serde(default = "default_adapter_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_transmission_port(),
            username: None,
            password: None,
            timeout: default_adapter_timeout(),
        }
    }
}

/// Kodi JSON-RPC connection settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct KodiConfig {
    /// Host (default: "localhost")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port (default: 8080)
    #[serde(default = "default_kodi_port")]
    pub port: u16,

    /// Web server username
    #[serde(default)]
    pub username: Option<String>,

    /// Web server password
    #[serde(default)]
    pub password: Option<String>,

    /// Per-call time budget in seconds (default: 10)
    #[serde(default = "default_adapter_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for KodiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_kodi_port(),
            username: None,
            password: None,
            timeout: default_adapter_timeout(),
        }
    }
}

/// Trakt account settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TraktConfig {
    /// API client id
    pub client_id: String,

    /// API client secret
    pub client_secret: String,

    /// Trakt username whose lists are read
    pub username: String,

    /// List slug to read shows from (default: "watchlist")
    #[serde(default = "default_trakt_list")]
    pub list: String,

    /// Report collected/watched episodes back to Trakt (default: true)
    #[serde(default = "default_true", alias = "reportprogress")]
    pub report_progress: bool,

    /// Where the OAuth token is stored (default: "trakt.json" next to the config)
    #[serde(default = "default_trakt_token_path")]
    pub token_path: PathBuf,

    /// API base URL (default: "https://api.trakt.tv")
    #[serde(default = "default_trakt_api_url")]
    pub api_url: String,

    /// Per-call time budget in seconds (default: 10)
    #[serde(default = "default_adapter_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./shows.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8088)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

impl Config {
    /// Read a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load `path`, writing a default configuration there first if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No configuration found, writing defaults");
            Config::default().save(path)?;
        }
        Self::load(path)
    }

    /// Check feed locators and directory templates
    pub fn validate(&self) -> Result<()> {
        validate_dir_template(&self.download_dir)?;
        for (idx, feed) in self.feeds.iter().enumerate() {
            validate_feed_uri(&feed.uri).map_err(|message| Error::Config {
                message,
                key: Some(format!("feeds[{}].uri", idx)),
            })?;
            if let Some(template) = &feed.download_dir {
                validate_dir_template(template)?;
            }
        }
        Ok(())
    }

    /// Anchor relative database and token paths at `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.persistence.database_path.is_relative() {
            self.persistence.database_path = base.join(&self.persistence.database_path);
        }
        if let Some(trakt) = self.trakt.as_mut()
            && trakt.token_path.is_relative()
        {
            trakt.token_path = base.join(&trakt.token_path);
        }
    }

    /// Directory template used for episodes from `feed`
    pub fn dir_template_for<'a>(&'a self, feed: &'a FeedConfig) -> &'a str {
        feed.download_dir.as_deref().unwrap_or(&self.download_dir)
    }

    /// Copy with passwords, secrets and tokens replaced
    pub fn redacted(&self) -> Self {
        const REDACTED: &str = "***REDACTED***";
        let mut config = self.clone();
        if config.transmission.password.is_some() {
            config.transmission.password = Some(REDACTED.to_string());
        }
        if let Some(kodi) = config.kodi.as_mut()
            && kodi.password.is_some()
        {
            kodi.password = Some(REDACTED.to_string());
        }
        if let Some(trakt) = config.trakt.as_mut() {
            trakt.client_secret = REDACTED.to_string();
        }
        config
    }
}

/// Accept `http`, `https` and `file` locators
pub fn validate_feed_uri(uri: &str) -> std::result::Result<(), String> {
    if uri.trim().is_empty() {
        return Err("Feed URI cannot be empty".to_string());
    }
    let parsed = url::Url::parse(uri).map_err(|e| format!("Invalid feed URI '{}': {}", uri, e))?;
    match parsed.scheme() {
        "http" | "https" | "file" => Ok(()),
        other => Err(format!(
            "Unsupported feed URI scheme '{}' (expected http, https or file)",
            other
        )),
    }
}

fn default_feed_poll_interval() -> i64 {
    300
}

fn default_progress_poll_interval() -> i64 {
    60
}

fn default_download_dir() -> String {
    "/media/Media/Series/{seriesname}/Season{seasonno:02}/".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_transmission_port() -> u16 {
    9091
}

fn default_kodi_port() -> u16 {
    8080
}

fn default_adapter_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_trakt_list() -> String {
    "watchlist".to_string()
}

fn default_trakt_token_path() -> PathBuf {
    PathBuf::from("trakt.json")
}

fn default_trakt_api_url() -> String {
    "https://api.trakt.tv".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DB_FILE)
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8088))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
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
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.feed_poll_interval, 300);
        assert_eq!(config.progress_poll_interval, 60);
        assert_eq!(config.transmission.port, 9091);
        assert_eq!(config.transmission.timeout, Duration::from_secs(10));
        assert!(config.kodi.is_none());
        assert!(config.trakt.is_none());
        assert_eq!(config.api.bind_address.port(), 8088);
        assert_eq!(config.persistence.database_path, PathBuf::from("shows.db"));
    }

    #[test]
    fn legacy_field_names_are_accepted() {
        let json = r#"{
            "lib_update_interval": 15,
            "filters": {"seriesname": ["Dark"], "quality": ["720p"]},
            "trakt": {"client_id": "id", "client_secret": "s", "username": "u", "reportprogress": false}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.progress_poll_interval, 15);
        assert_eq!(config.filters.series, vec!["Dark"]);
        let trakt = config.trakt.unwrap();
        assert!(!trakt.report_progress);
        assert_eq!(trakt.list, "watchlist");
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let mut config: Config = serde_json::from_str(
            r#"{"trakt": {"client_id": "id", "client_secret": "s", "username": "u"}}"#,
        )
        .unwrap();
        config.resolve_paths(Path::new("/etc/rssdld"));
        assert_eq!(
            config.persistence.database_path,
            PathBuf::from("/etc/rssdld/shows.db")
        );
        assert_eq!(
            config.trakt.unwrap().token_path,
            PathBuf::from("/etc/rssdld/trakt.json")
        );
    }

    #[test]
    fn duration_serde_serializes_as_seconds() {
        let config = TransmissionConfig {
            timeout: Duration::from_secs(7),
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["timeout"], 7);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = Config::default();
        config.feeds.push(FeedConfig {
            uri: "https://showrss.info/user/1.rss".into(),
            download_dir: Some("/tv/{seriesname}".into()),
        });
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.feeds.len(), 1);
        assert_eq!(loaded.dir_template_for(&loaded.feeds[0]), "/tv/{seriesname}");
    }

    #[test]
    fn load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.download_dir, default_download_dir());
    }

    #[test]
    fn validate_rejects_bad_feeds_and_templates() {
        let mut config = Config::default();
        config.feeds.push(FeedConfig {
            uri: "ftp://example.com/rss".into(),
            download_dir: None,
        });
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("feeds[0].uri")),
            other => panic!("expected config error, got {other:?}"),
        }

        let config = Config {
            download_dir: "/tv/{show}".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn feed_uri_validation() {
        assert!(validate_feed_uri("http://example.com/rss").is_ok());
        assert!(validate_feed_uri("file:///tmp/feed.xml").is_ok());
        assert!(validate_feed_uri("").is_err());
        assert!(validate_feed_uri("not a url").is_err());
    }

    #[test]
    fn redacted_hides_secrets() {
        let config = Config {
            transmission: TransmissionConfig {
                password: Some("pw".into()),
                ..Default::default()
            },
            kodi: Some(KodiConfig {
                password: Some("pw".into()),
                ..Default::default()
            }),
            trakt: Some(TraktConfig {
                client_id: "id".into(),
                client_secret: "secret".into(),
                username: "u".into(),
                list: default_trakt_list(),
                report_progress: true,
                token_path: default_trakt_token_path(),
                api_url: default_trakt_api_url(),
                timeout: default_adapter_timeout(),
            }),
            ..Default::default()
        };
        let redacted = config.redacted();
        assert_eq!(redacted.transmission.password.as_deref(), Some("***REDACTED***"));
        assert_eq!(
            redacted.kodi.unwrap().password.as_deref(),
            Some("***REDACTED***")
        );
        assert_eq!(redacted.trakt.unwrap().client_secret, "***REDACTED***");
        assert_eq!(config.transmission.password.as_deref(), Some("pw"));
    }
}
