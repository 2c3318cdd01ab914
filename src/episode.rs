//! Episode records and the metadata derived from announcement titles

use crate::error::{Error, Result};
use crate::types::EpisodeState;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use utoipa::ToSchema;

/// Quality tags in the order they are scanned for
pub const QUALITIES: [&str; 3] = ["480p", "720p", "1080p"];

/// Tag used when no known quality appears in the title
pub const QUALITY_UNKNOWN: &str = "na";

// Patterns are literals, compilation cannot fail.
#[allow(clippy::expect_used)]
static SXXEYY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)S(\d{2})E(\d{2})").expect("valid regex"));

#[allow(clippy::expect_used)]
static NXMM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2})x(\d{2})").expect("valid regex"));

#[allow(clippy::expect_used)]
static ILLEGAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:"*?<>|]+"#).expect("valid regex"));

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(seriesname|seasonno)(?::(0)?(\d+))?\}").expect("valid regex")
});

/// One deduplicated feed announcement and its lifecycle position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Episode {
    /// Raw announcement title
    pub title: String,
    /// Announcement time (Unix seconds)
    pub published: i64,
    /// Magnet URI (or other locator) handed to the torrent client
    pub link: String,
    /// Episode id assigned by the feed source
    pub uid: i64,
    /// Show id assigned by the feed source
    pub showid: i64,
    /// Show title with path-illegal characters removed
    pub showname: String,
    /// Torrent info hash, unique per episode
    pub hash: String,
    /// Quality tag (`480p`, `720p`, `1080p` or `na`)
    pub quality: String,
    /// Season number, 0 if the title carries none
    pub season: u32,
    /// Episode number, 0 if the title carries none
    pub episode: u32,
    /// Download directory
    pub dir: String,
    /// Lifecycle state
    pub state: EpisodeState,
}

/// Raw fields of one feed entry before normalization
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedEntry {
    /// Entry title
    pub title: Option<String>,
    /// Entry link
    pub link: Option<String>,
    /// Publication time (Unix seconds)
    pub published: Option<i64>,
    /// `tv:episode_id`
    pub uid: Option<i64>,
    /// `tv:show_id`
    pub showid: Option<i64>,
    /// `tv:show_name`
    pub show_name: Option<String>,
    /// `tv:info_hash`
    pub hash: Option<String>,
}

impl Episode {
    /// Normalize a feed entry into an episode with state `NONE`
    ///
    /// Returns `None` when the entry has no title, no link, or no hash that
    /// can be taken from either `tv:info_hash` or the magnet link.
    pub fn from_feed_entry(entry: FeedEntry, dir_template: &str, fetched_at: i64) -> Option<Self> {
        let title = entry.title.filter(|t| !t.trim().is_empty())?;
        let link = entry.link.filter(|l| !l.trim().is_empty())?;
        let hash = entry
            .hash
            .filter(|h| !h.trim().is_empty())
            .or_else(|| magnet_hash(&link))?;

        let (season, episode) = parse_numbering(&title);
        let showname = sanitize_show_name(
            &entry
                .show_name
                .unwrap_or_else(|| show_name_from_title(&title)),
        );
        let dir = format_download_dir(dir_template, &showname, season);

        Some(Episode {
            quality: parse_quality(&title).to_string(),
            published: entry.published.unwrap_or(fetched_at),
            uid: entry.uid.unwrap_or(0),
            showid: entry.showid.unwrap_or(0),
            hash: hash.trim().to_string(),
            title,
            link,
            showname,
            season,
            episode,
            dir,
            state: EpisodeState::None,
        })
    }

    /// Lower-cased show name as compared by the admission filter
    pub fn series_key(&self) -> String {
        self.showname.to_lowercase()
    }
}

/// First known quality tag found in `title`, scanning from the lowest resolution
///
/// Matching is case-sensitive: `720P` is not a quality tag.
pub fn parse_quality(title: &str) -> &'static str {
    QUALITIES
        .iter()
        .copied()
        .find(|q| title.contains(q))
        .unwrap_or(QUALITY_UNKNOWN)
}

/// Season and episode from `SxxEyy`, then `NxMM`, else `(0, 0)`
pub fn parse_numbering(title: &str) -> (u32, u32) {
    SXXEYY
        .captures(title)
        .or_else(|| NXMM.captures(title))
        .and_then(|caps| {
            let season = caps.get(1)?.as_str().parse().ok()?;
            let episode = caps.get(2)?.as_str().parse().ok()?;
            Some((season, episode))
        })
        .unwrap_or((0, 0))
}

/// Strip `\ / : * ? " < > |` from a show name
pub fn sanitize_show_name(name: &str) -> String {
    ILLEGAL_CHARS.replace_all(name, "").trim().to_string()
}

/// Title prefix before the numbering token, with dots and underscores as spaces
fn show_name_from_title(title: &str) -> String {
    let end = SXXEYY
        .find(title)
        .or_else(|| NXMM.find(title))
        .map(|m| m.start())
        .unwrap_or(title.len());
    title[..end]
        .replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Info hash from a magnet link's `xt=urn:btih:` parameter
fn magnet_hash(link: &str) -> Option<String> {
    let url = url::Url::parse(link).ok()?;
    if url.scheme() != "magnet" {
        return None;
    }
    url.query_pairs().find_map(|(key, value)| {
        (key == "xt")
            .then(|| value.strip_prefix("urn:btih:").map(str::to_string))
            .flatten()
    })
}

/// Substitute `{seriesname}` and `{seasonno}` (optionally `{seasonno:02}`) in a template
///
/// Any other text, including unknown placeholders, is kept as is.
pub fn format_download_dir(template: &str, showname: &str, season: u32) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match caps.get(1).map(|m| m.as_str()) {
                Some("seriesname") => showname.to_string(),
                _ => {
                    let width = caps
                        .get(3)
                        .and_then(|w| w.as_str().parse::<usize>().ok())
                        .unwrap_or(0);
                    if caps.get(2).is_some() {
                        format!("{season:0width$}")
                    } else {
                        format!("{season:width$}")
                    }
                }
            }
        })
        .into_owned()
}

/// Reject templates that still contain braces after substitution
pub fn validate_dir_template(template: &str) -> Result<()> {
    let rendered = format_download_dir(template, "show", 1);
    if rendered.contains('{') || rendered.contains('}') {
        return Err(Error::Config {
            message: format!("unknown placeholder in directory template '{}'", template),
            key: Some("download_dir".to_string()),
        });
    }
    Ok(())
}
