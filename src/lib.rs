//! # rssdld
//!
//! RSS-driven TV episode download manager.
//!
//! rssdld polls show feeds, admits episodes through a series/quality/season
//! filter, stores each announcement once, and walks every stored episode
//! through its lifecycle: handed to Transmission, stopped once complete,
//! picked up by a Kodi library rescan, and marked watched when Kodi reports a
//! play. Trakt can supply the show list and receives collected/watched
//! updates.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rssdld::{Config, EpisodeManager, Scheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.filters.series = vec!["Some Show".to_string()];
//!
//!     let manager = EpisodeManager::new(config).await?;
//!
//!     // One feed check by hand
//!     let summary = manager.check_feed("https://showrss.info/user/1.rss", None).await?;
//!     println!("{}", summary);
//!
//!     // Or let the scheduler poll feeds and advance episodes
//!     let mut scheduler = Scheduler::new(manager);
//!     scheduler.start()?;
//!     scheduler.stop().await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Remote service adapters (Transmission, Kodi, Trakt)
pub mod clients;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Episode records and title parsing
pub mod episode;
/// Error types
pub mod error;
/// Feed fetching and parsing
pub mod feed;
/// Admission filter
pub mod filter;
/// Episode lifecycle state machine
pub mod lifecycle;
/// Control surface tying store, filter and engine together
pub mod manager;
/// Background polling loop
pub mod scheduler;
/// Core types
pub mod types;

// Re-export commonly used types
pub use clients::{
    AuthOutcome, DeviceChallenge, LibraryService, TorrentClient, TorrentState, TorrentStatus,
    VideoInfo, WatchlistService,
};
pub use config::{Config, FeedConfig, FilterConfig};
pub use db::Database;
pub use episode::Episode;
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus};
pub use lifecycle::{LifecycleEngine, SweepReport, Transition};
pub use manager::EpisodeManager;
pub use scheduler::{Scheduler, SchedulerState};
pub use types::{EpisodeState, FeedCheckSummary, SkipReason, StatusSummary};

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Run the scheduler (and optionally the REST API) until a termination signal.
///
/// On SIGINT/SIGTERM the API stops accepting requests, the scheduler loop
/// finishes its current step and every adapter is disconnected. A failing
/// API server (e.g. the port is taken) ends the run early with its error.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use rssdld::{Config, EpisodeManager, run_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = EpisodeManager::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_until_signal(manager, true).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_until_signal(manager: EpisodeManager, serve_api: bool) -> Result<()> {
    let mut scheduler = Scheduler::new(manager.clone());
    scheduler.start()?;

    let shutdown = CancellationToken::new();
    let mut api = serve_api.then(|| tokio::spawn(api::start_api_server(manager, shutdown.clone())));

    let mut api_finished = false;
    let mut outcome = match api.as_mut() {
        Some(handle) => tokio::select! {
            _ = wait_for_signal() => Ok(()),
            joined = handle => {
                api_finished = true;
                flatten_join(joined)
            }
        },
        None => {
            wait_for_signal().await;
            Ok(())
        }
    };

    shutdown.cancel();
    scheduler.stop().await;

    if let Some(handle) = api
        && !api_finished
    {
        outcome = outcome.and(flatten_join(handle.await));
    }

    outcome
}

fn flatten_join(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(|e| Error::Other(format!("API server task failed: {}", e)))?
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
