//! Database layer for rssdld
//!
//! Handles SQLite persistence for episodes.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`episodes`] — Episode insert, lookup, state updates and listing
//!
//! All mutating statements run under a single write lock so that the
//! scheduler and the API never interleave a duplicate check with an insert
//! or a state write.

use crate::episode::Episode;
use crate::types::EpisodeState;
use sqlx::{FromRow, sqlite::SqlitePool};

mod episodes;
mod migrations;

/// Episode record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct EpisodeRow {
    /// Raw announcement title
    pub title: String,
    /// Announcement time (Unix seconds)
    pub published: i64,
    /// Torrent locator
    pub link: String,
    /// Feed episode id
    pub uid: i64,
    /// Feed show id
    pub showid: i64,
    /// Sanitized show name
    pub showname: String,
    /// Info hash (primary key)
    pub hash: String,
    /// Quality tag
    pub quality: String,
    /// Episode number
    pub episode: i64,
    /// Season number
    pub season: i64,
    /// Download directory
    pub dir: String,
    /// Lifecycle ordinal
    pub state: i32,
}

impl From<EpisodeRow> for Episode {
    fn from(row: EpisodeRow) -> Self {
        Episode {
            title: row.title,
            published: row.published,
            link: row.link,
            uid: row.uid,
            showid: row.showid,
            showname: row.showname,
            hash: row.hash,
            quality: row.quality,
            season: u32::try_from(row.season).unwrap_or(0),
            episode: u32::try_from(row.episode).unwrap_or(0),
            dir: row.dir,
            state: EpisodeState::from_i32(row.state),
        }
    }
}

/// Database handle for rssdld
pub struct Database {
    pool: SqlitePool,
    write_lock: tokio::sync::Mutex<()>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
