//! Episode persistence: insert-if-absent, lookup, state writes and listing.

use crate::episode::Episode;
use crate::error::DatabaseError;
use crate::types::EpisodeState;
use crate::{Error, Result};

use super::{Database, EpisodeRow};

const SELECT_EPISODE: &str = r#"
    SELECT title, CAST(published AS INTEGER) AS published, link, uid, showid, showname,
           hash, quality, episode, season, dir, state
    FROM episodes
"#;

impl Database {
    /// Get an episode by its hash
    pub async fn get_by_hash(&self, hash: &str) -> Result<Option<Episode>> {
        let row = sqlx::query_as::<_, EpisodeRow>(&format!("{SELECT_EPISODE} WHERE hash = ?"))
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get episode: {}",
                    e
                )))
            })?;

        Ok(row.map(Episode::from))
    }

    /// Store `episode` unless its hash is already present
    ///
    /// Returns the stored episode, or `None` when the hash was a duplicate.
    pub async fn insert_if_absent(&self, episode: &Episode) -> Result<Option<Episode>> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query(
            r#"
            INSERT INTO episodes (title, published, link, uid, showid, showname, hash,
                                  quality, episode, season, dir, state)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO NOTHING
            "#,
        )
        .bind(&episode.title)
        .bind(episode.published)
        .bind(&episode.link)
        .bind(episode.uid)
        .bind(episode.showid)
        .bind(&episode.showname)
        .bind(&episode.hash)
        .bind(&episode.quality)
        .bind(i64::from(episode.episode))
        .bind(i64::from(episode.season))
        .bind(&episode.dir)
        .bind(episode.state.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert episode: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(episode.clone()))
    }

    /// Write a new state for the episode with `hash`
    ///
    /// Returns `false` (and writes nothing) when no such episode exists.
    pub async fn update_state(&self, hash: &str, state: EpisodeState) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query("UPDATE episodes SET state = ? WHERE hash = ?")
            .bind(state.to_i32())
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update episode state: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// List episodes, newest first
    ///
    /// `state = None` matches any state; `since` keeps only episodes
    /// published strictly after the given timestamp.
    pub async fn list_episodes(
        &self,
        state: Option<EpisodeState>,
        since: Option<i64>,
    ) -> Result<Vec<Episode>> {
        let mut sql = format!("{SELECT_EPISODE} WHERE 1 = 1");
        if state.is_some() {
            sql.push_str(" AND state = ?");
        }
        if since.is_some() {
            sql.push_str(" AND published > ?");
        }
        sql.push_str(" ORDER BY published DESC, hash ASC");

        let mut query = sqlx::query_as::<_, EpisodeRow>(&sql);
        if let Some(state) = state {
            query = query.bind(state.to_i32());
        }
        if let Some(since) = since {
            query = query.bind(since);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list episodes: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(Episode::from).collect())
    }

    /// Episodes in any of `states`, newest first
    pub async fn list_in_states(&self, states: &[EpisodeState]) -> Result<Vec<Episode>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; states.len()].join(", ");
        let sql = format!(
            "{SELECT_EPISODE} WHERE state IN ({placeholders}) ORDER BY published DESC, hash ASC"
        );

        let mut query = sqlx::query_as::<_, EpisodeRow>(&sql);
        for state in states {
            query = query.bind(state.to_i32());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list episodes by state: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(Episode::from).collect())
    }

    /// Number of stored episodes
    pub async fn count_episodes(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM episodes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count episodes: {}",
                    e
                )))
            })
    }
}
