//! Application state for the API server

use crate::EpisodeManager;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (the manager is a bundle of `Arc`s).
#[derive(Clone)]
pub struct AppState {
    /// The episode manager backing every handler
    pub manager: EpisodeManager,
}

impl AppState {
    /// Create a new AppState
    pub fn new(manager: EpisodeManager) -> Self {
        Self { manager }
    }
}
