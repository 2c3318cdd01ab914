//! Control surface over the store, the filter and the lifecycle engine.
//!
//! The `EpisodeManager` methods are organized by domain:
//! - [`feeds`] - Feed checks and show-list resolution
//! - [`control`] - Episode queries, manual overrides and sweeps
//! - [`shutdown`] - Adapter teardown

mod control;
mod feeds;
mod shutdown;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::feed::FeedIngester;
use crate::filter::AdmissionFilter;
use crate::lifecycle::LifecycleEngine;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Main manager instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct EpisodeManager {
    /// Episode store
    pub db: Arc<Database>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Feed fetcher/parser
    pub(crate) ingester: Arc<FeedIngester>,
    /// Resolved admission filter (configured lists plus watchlist shows)
    pub(crate) filter: Arc<RwLock<AdmissionFilter>>,
    /// Lifecycle engine; the lock serializes sweeps and manual overrides
    pub(crate) engine: Arc<Mutex<LifecycleEngine>>,
}

impl EpisodeManager {
    /// Open the store and wire the adapters named in `config`
    ///
    /// No remote service is contacted here.
    pub async fn new(config: Config) -> Result<Self> {
        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let engine = LifecycleEngine::from_config(db.clone(), &config);
        Self::with_engine(config, db, engine)
    }

    /// Build a manager around an existing store and engine
    pub fn with_engine(config: Config, db: Arc<Database>, engine: LifecycleEngine) -> Result<Self> {
        let filter = AdmissionFilter::from_config(&config.filters);
        Ok(Self {
            db,
            config: Arc::new(config),
            ingester: Arc::new(FeedIngester::new()?),
            filter: Arc::new(RwLock::new(filter)),
            engine: Arc::new(Mutex::new(engine)),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
