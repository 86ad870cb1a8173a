//! Startup and shutdown coordination.

use super::MediaService;
use crate::error::Result;
use std::sync::Arc;

impl MediaService {
    /// Stop accepting downloads and cancel everything in flight
    ///
    /// Running tools are killed through their cancellation tokens, their runs
    /// fail with [`Error::Cancelled`](crate::Error::Cancelled), and the
    /// progress sweeper exits. Streams already handed out keep draining.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.shutdown_token.cancel();
        // Give killed tools a moment to be reaped and workspaces removed
        tokio::task::yield_now().await;

        tracing::info!(tracked_tasks = self.progress.len(), "Shutdown complete");
        Ok(())
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Serve the HTTP API in a background task
    ///
    /// The server stops accepting connections once the service shuts down.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let service = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(service, config).await })
    }
}
