//! Admission filter deciding which feed episodes are stored
//!
//! Checks run in a fixed order (series, quality, season) and the first
//! failing dimension is reported. An empty allow-list places no constraint
//! on its dimension.

use crate::config::FilterConfig;
use crate::episode::{Episode, sanitize_show_name};
use crate::types::SkipReason;
use std::collections::BTreeSet;

/// Normalized allow-lists
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdmissionFilter {
    series: BTreeSet<String>,
    qualities: BTreeSet<String>,
    seasons: BTreeSet<u32>,
}

impl AdmissionFilter {
    /// Build a filter from configured allow-lists
    pub fn from_config(config: &FilterConfig) -> Self {
        let mut filter = Self::default();
        filter.extend_series(&config.series);
        filter.qualities = config
            .quality
            .iter()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty())
            .collect();
        filter.seasons = config.season.iter().copied().collect();
        filter
    }

    /// Add show names (sanitized and lower-cased) to the series allow-list
    pub fn extend_series<S: AsRef<str>>(&mut self, names: &[S]) {
        self.series.extend(
            names
                .iter()
                .map(|n| normalize_series(n.as_ref()))
                .filter(|n| !n.is_empty()),
        );
    }

    /// Replace every dimension that `extra` constrains
    ///
    /// Dimensions left empty in `extra` keep their current allow-list.
    pub fn overlay(&self, extra: &FilterConfig) -> Self {
        let other = Self::from_config(extra);
        Self {
            series: pick(&other.series, &self.series),
            qualities: pick(&other.qualities, &self.qualities),
            seasons: pick(&other.seasons, &self.seasons),
        }
    }

    /// Series allow-list in sorted order
    pub fn series(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(String::as_str)
    }

    /// Decide whether `episode` is admitted
    pub fn evaluate(&self, episode: &Episode) -> SkipReason {
        if !self.series.is_empty() && !self.series.contains(&normalize_series(&episode.showname)) {
            return SkipReason::Series;
        }
        if !self.qualities.is_empty() && !self.qualities.contains(&episode.quality.to_lowercase())
        {
            return SkipReason::Quality;
        }
        if !self.seasons.is_empty() && !self.seasons.contains(&episode.season) {
            return SkipReason::Season;
        }
        SkipReason::None
    }
}

/// Free-function form of [`AdmissionFilter::evaluate`]
pub fn evaluate(episode: &Episode, filter: &AdmissionFilter) -> SkipReason {
    filter.evaluate(episode)
}

fn normalize_series(name: &str) -> String {
    sanitize_show_name(name).to_lowercase()
}

fn pick<T: Clone + Ord>(preferred: &BTreeSet<T>, fallback: &BTreeSet<T>) -> BTreeSet<T> {
    if preferred.is_empty() {
        fallback.clone()
    } else {
        preferred.clone()
    }
}
