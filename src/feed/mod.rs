//! Feed fetching and parsing.
//!
//! Feeds are RSS 2.0 documents carrying the showRSS `tv:` namespace
//! (`tv:show_name`, `tv:show_id`, `tv:episode_id`, `tv:info_hash`). Atom is
//! accepted as a fallback. Entries that cannot be turned into an episode are
//! dropped one by one; a feed that cannot be fetched or parsed at all yields
//! no episodes for this poll.

use crate::episode::{Episode, FeedEntry};
use crate::error::{Error, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const TV_NAMESPACE: &str = "tv";

/// Fetches feeds and turns their entries into episodes
pub struct FeedIngester {
    /// HTTP client for fetching feeds
    http_client: reqwest::Client,
}

impl FeedIngester {
    /// Create a new feed ingester
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("rssdld/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Fetch `uri` and build episodes, never failing
    ///
    /// Fetch or parse errors are logged and produce an empty list; the feed
    /// is tried again on the next poll.
    pub async fn ingest(&self, uri: &str, dir_template: &str) -> Vec<Episode> {
        match self.fetch_entries(uri).await {
            Ok(entries) => {
                let fetched_at = Utc::now().timestamp();
                let total = entries.len();
                let episodes: Vec<Episode> = entries
                    .into_iter()
                    .filter_map(|entry| {
                        let title = entry.title.clone();
                        let episode = Episode::from_feed_entry(entry, dir_template, fetched_at);
                        if episode.is_none() {
                            debug!(feed = %uri, title = ?title, "Dropping feed entry without title, link or hash");
                        }
                        episode
                    })
                    .collect();
                debug!(feed = %uri, total, usable = episodes.len(), "Feed parsed");
                episodes
            }
            Err(e) => {
                warn!(feed = %uri, error = %e, "Failed to read feed");
                Vec::new()
            }
        }
    }

    /// Fetch a feed and parse its entries
    ///
    /// # Errors
    /// Returns error if:
    /// - the HTTP request fails or returns a non-success status
    /// - a `file://` locator cannot be read
    /// - the content parses as neither RSS nor Atom
    pub async fn fetch_entries(&self, uri: &str) -> Result<Vec<FeedEntry>> {
        let content = self.fetch(uri).await?;
        parse_feed(&content)
    }

    async fn fetch(&self, uri: &str) -> Result<String> {
        if let Ok(url) = url::Url::parse(uri)
            && url.scheme() == "file"
        {
            let path = url
                .to_file_path()
                .map_err(|_| Error::Feed(format!("Invalid file locator: {}", uri)))?;
            return tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Feed(format!("Failed to read {}: {}", path.display(), e)));
        }

        let response = self
            .http_client
            .get(uri)
            .send()
            .await
            .map_err(|e| Error::Feed(format!("Failed to fetch feed: {}", e)))?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Feed(format!(
                "Feed returned HTTP {}: {}",
                status.as_u16(),
                uri
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Feed(format!("Failed to read feed content: {}", e)))
    }
}

/// Parse feed content as RSS, falling back to Atom
pub fn parse_feed(content: &str) -> Result<Vec<FeedEntry>> {
    match parse_as_rss(content) {
        Ok(entries) => Ok(entries),
        Err(rss_err) => {
            debug!("Failed to parse as RSS: {}, trying Atom", rss_err);
            parse_as_atom(content).map_err(|atom_err| {
                Error::Feed(format!(
                    "Failed to parse feed as RSS or Atom. RSS error: {}. Atom error: {}",
                    rss_err, atom_err
                ))
            })
        }
    }
}

fn parse_as_rss(content: &str) -> Result<Vec<FeedEntry>> {
    let channel = content
        .parse::<rss::Channel>()
        .map_err(|e| Error::Feed(format!("RSS parse error: {}", e)))?;

    let entries = channel
        .items()
        .iter()
        .map(|item| {
            let tv = |name: &str| rss_tv_value(item.extensions(), name);
            FeedEntry {
                title: item.title().map(str::to_string),
                link: item
                    .link()
                    .map(str::to_string)
                    .or_else(|| item.enclosure().map(|enc| enc.url().to_string())),
                published: item.pub_date().and_then(|date| {
                    chrono::DateTime::parse_from_rfc2822(date)
                        .ok()
                        .map(|dt| dt.timestamp())
                }),
                uid: tv("episode_id").and_then(|v| v.parse().ok()),
                showid: tv("show_id").and_then(|v| v.parse().ok()),
                show_name: tv("show_name"),
                hash: tv("info_hash"),
            }
        })
        .collect();

    Ok(entries)
}

fn rss_tv_value(
    extensions: &BTreeMap<String, BTreeMap<String, Vec<rss::extension::Extension>>>,
    name: &str,
) -> Option<String> {
    extensions
        .get(TV_NAMESPACE)?
        .get(name)?
        .first()?
        .value()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_as_atom(content: &str) -> Result<Vec<FeedEntry>> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())
        .map_err(|e| Error::Feed(format!("Atom parse error: {}", e)))?;

    let entries = feed
        .entries()
        .iter()
        .map(|entry| {
            let tv = |name: &str| atom_tv_value(entry.extensions(), name);
            let link = entry
                .links()
                .iter()
                .find(|link| link.href().starts_with("magnet:"))
                .or_else(|| entry.links().first())
                .map(|link| link.href().to_string());

            FeedEntry {
                title: Some(entry.title().as_str().to_string()),
                link,
                published: Some(entry.published().unwrap_or(entry.updated()).timestamp()),
                uid: tv("episode_id").and_then(|v| v.parse().ok()),
                showid: tv("show_id").and_then(|v| v.parse().ok()),
                show_name: tv("show_name"),
                hash: tv("info_hash"),
            }
        })
        .collect();

    Ok(entries)
}

fn atom_tv_value(
    extensions: &BTreeMap<String, BTreeMap<String, Vec<atom_syndication::extension::Extension>>>,
    name: &str,
) -> Option<String> {
    extensions
        .get(TV_NAMESPACE)?
        .get(name)?
        .first()?
        .value()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
