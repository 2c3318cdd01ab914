//! Core types shared by the store, the lifecycle engine and the API

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Lifecycle position of an episode
///
/// The discriminants are persisted and compared numerically: status summaries
/// bucket episodes with `<=`/`<` against these values, so gaps and ordering
/// must not change.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum EpisodeState {
    /// No lifecycle state assigned
    #[default]
    None = 1,
    /// Accepted from a feed, not yet handed to the torrent client
    New = 2,
    /// Submitted to the torrent client
    Downloading = 13,
    /// Torrent complete and stopped
    Finished = 14,
    /// Library rescan requested
    Updating = 25,
    /// Present in the media library
    Available = 26,
    /// Played at least once
    Watched = 37,
}

impl EpisodeState {
    /// All states in lifecycle order
    pub const ALL: [EpisodeState; 7] = [
        EpisodeState::None,
        EpisodeState::New,
        EpisodeState::Downloading,
        EpisodeState::Finished,
        EpisodeState::Updating,
        EpisodeState::Available,
        EpisodeState::Watched,
    ];

    /// States a lifecycle sweep still has work for
    pub const ACTIVE: [EpisodeState; 5] = [
        EpisodeState::New,
        EpisodeState::Downloading,
        EpisodeState::Finished,
        EpisodeState::Updating,
        EpisodeState::Available,
    ];

    /// Convert a stored ordinal back to a state (unknown values read as `None`)
    pub fn from_i32(value: i32) -> Self {
        match value {
            2 => EpisodeState::New,
            13 => EpisodeState::Downloading,
            14 => EpisodeState::Finished,
            25 => EpisodeState::Updating,
            26 => EpisodeState::Available,
            37 => EpisodeState::Watched,
            _ => EpisodeState::None,
        }
    }

    /// Ordinal stored in the `state` column
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Upper-case name as used on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            EpisodeState::None => "NONE",
            EpisodeState::New => "NEW",
            EpisodeState::Downloading => "DOWNLOADING",
            EpisodeState::Finished => "FINISHED",
            EpisodeState::Updating => "UPDATING",
            EpisodeState::Available => "AVAILABLE",
            EpisodeState::Watched => "WATCHED",
        }
    }
}

impl fmt::Display for EpisodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses either a state name (case-insensitive) or its exact ordinal.
impl FromStr for EpisodeState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(ordinal) = trimmed.parse::<i32>() {
            return EpisodeState::ALL
                .into_iter()
                .find(|state| state.to_i32() == ordinal)
                .ok_or_else(|| Error::InvalidState(s.to_string()));
        }
        EpisodeState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::InvalidState(s.to_string()))
    }
}

/// Why the admission filter turned an episode away
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum SkipReason {
    /// Accepted
    #[default]
    None,
    /// Show name not in the series allow-list
    Series,
    /// Quality tag not in the quality allow-list
    Quality,
    /// Season number not in the season allow-list
    Season,
}

impl SkipReason {
    /// True when the episode passed every check
    pub fn is_accepted(self) -> bool {
        self == SkipReason::None
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::None => "NONE",
            SkipReason::Series => "SERIES",
            SkipReason::Quality => "QUALITY",
            SkipReason::Season => "SEASON",
        })
    }
}

/// Outcome of running one feed through ingest, filter and store
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeedCheckSummary {
    /// Feed locator that was checked
    pub feed: String,
    /// Entries parsed from the feed
    pub total: usize,
    /// Entries newly stored as NEW
    pub accepted: usize,
    /// Entries that passed the filter but were already stored
    pub existing: usize,
    /// Entries turned away by the filter
    pub rejected: usize,
    /// Rejections caused by the series allow-list
    pub rejected_series: usize,
    /// Rejections caused by the quality allow-list
    pub rejected_quality: usize,
    /// Rejections caused by the season allow-list
    pub rejected_season: usize,
}

impl FeedCheckSummary {
    /// Start an empty summary for `feed`
    pub fn new(feed: impl Into<String>) -> Self {
        Self {
            feed: feed.into(),
            ..Default::default()
        }
    }

    /// Count a rejection under its reason
    pub fn record_rejection(&mut self, reason: SkipReason) {
        self.rejected += 1;
        match reason {
            SkipReason::Series => self.rejected_series += 1,
            SkipReason::Quality => self.rejected_quality += 1,
            SkipReason::Season => self.rejected_season += 1,
            SkipReason::None => {}
        }
    }

    /// Fold another feed's counts into this one
    pub fn merge(&mut self, other: &FeedCheckSummary) {
        self.total += other.total;
        self.accepted += other.accepted;
        self.existing += other.existing;
        self.rejected += other.rejected;
        self.rejected_series += other.rejected_series;
        self.rejected_quality += other.rejected_quality;
        self.rejected_season += other.rejected_season;
    }
}

impl fmt::Display for FeedCheckSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} entries, {} new, {} already known, {} rejected (series {}, quality {}, season {})",
            self.feed,
            self.total,
            self.accepted,
            self.existing,
            self.rejected,
            self.rejected_series,
            self.rejected_quality,
            self.rejected_season
        )
    }
}

/// Episode counts per lifecycle bucket
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusSummary {
    /// Episodes with no lifecycle state
    pub invalid: usize,
    /// Waiting to be submitted
    pub new: usize,
    /// Somewhere between submission and library ingestion
    pub downloading: usize,
    /// In the library, not watched yet
    pub available: usize,
    /// Watched
    pub watched: usize,
}

impl StatusSummary {
    /// Place one episode state in its bucket
    pub fn tally(&mut self, state: EpisodeState) {
        if state == EpisodeState::None {
            self.invalid += 1;
        } else if state <= EpisodeState::New {
            self.new += 1;
        } else if state < EpisodeState::Available {
            self.downloading += 1;
        } else if state < EpisodeState::Watched {
            self.available += 1;
        } else {
            self.watched += 1;
        }
    }
}
