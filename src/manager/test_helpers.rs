//! Shared test helpers for creating EpisodeManager instances in tests.

use crate::clients::{Connection, TorrentClient, TorrentStatus};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::lifecycle::LifecycleEngine;
use crate::manager::EpisodeManager;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Torrent client that is never reachable
pub(crate) struct OfflineTorrent;

#[async_trait]
impl TorrentClient for OfflineTorrent {
    async fn get(&self, _hash: &str) -> Result<Option<TorrentStatus>> {
        Err(Error::client("offline", "unreachable"))
    }

    async fn add(&self, _link: &str, _dir: &str) -> Result<bool> {
        Err(Error::client("offline", "unreachable"))
    }

    async fn start(&self, _hash: &str) -> Result<()> {
        Err(Error::client("offline", "unreachable"))
    }

    async fn stop(&self, _hash: &str) -> Result<()> {
        Err(Error::client("offline", "unreachable"))
    }

    async fn remove(&self, _hash: &str) -> Result<()> {
        Err(Error::client("offline", "unreachable"))
    }
}

/// Helper to create a test EpisodeManager with a persistent database and
/// an unreachable torrent client.
/// Returns the manager and the tempdir (which must be kept alive).
pub(crate) async fn create_test_manager() -> (EpisodeManager, tempfile::TempDir) {
    create_test_manager_with(Config::default()).await
}

/// Like [`create_test_manager`] with a caller-supplied configuration
pub(crate) async fn create_test_manager_with(
    mut config: Config,
) -> (EpisodeManager, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    config.persistence.database_path = temp_dir.path().join("test.db");

    let db = Arc::new(
        Database::new(&config.persistence.database_path)
            .await
            .unwrap(),
    );
    let torrent: Arc<dyn TorrentClient> = Arc::new(OfflineTorrent);
    let engine = LifecycleEngine::new(
        db.clone(),
        Connection::ready("offline", torrent, Duration::from_secs(1)),
    );

    let manager = EpisodeManager::with_engine(config, db, engine).unwrap();
    (manager, temp_dir)
}
