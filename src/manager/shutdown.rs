//! Adapter teardown.

use super::EpisodeManager;

impl EpisodeManager {
    /// Cancel a pending watchlist handshake and drop every adapter handle
    ///
    /// Waits for a running sweep to finish. The store stays open until the
    /// last clone of the manager is dropped.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down episode manager");

        let mut engine = self.engine.lock().await;
        if engine.cancel_authentication().await {
            tracing::info!("Cancelled pending watchlist authorization");
        }
        engine.disconnect_all();

        tracing::info!("Episode manager shut down");
    }
}
