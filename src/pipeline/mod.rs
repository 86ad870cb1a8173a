//! Audio acquisition pipeline split into focused submodules.
//!
//! The [`MediaService`] struct and its stages are organized by concern:
//! - [`metadata`] - Metadata extraction and normalization
//! - [`download`] - Variant download with size enforcement
//! - [`transcode`] - Optional conversion to the transcode target
//! - [`stream`] - Chunked delivery and end-of-run cleanup
//! - [`run`] - Request entry points wiring the stages together
//! - [`lifecycle`] - Startup and shutdown coordination

pub mod download;
mod lifecycle;
pub mod metadata;
mod run;
pub mod stream;
pub mod transcode;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use download::{DownloadOrchestrator, MediaFile};
pub use metadata::MetadataExtractor;
pub use stream::{AudioDownload, AudioStream, DeliveryHeaders};
pub use transcode::Transcoder;

use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::progress::ProgressTracker;
use crate::tools::{ToolCapabilities, Toolchain};
use crate::types::{ProgressEvent, ProgressSnapshot, TaskId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Main service instance (cloneable - all clones share state)
#[derive(Clone, Debug)]
pub struct MediaService {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Tool resolution, re-checked on every request
    pub(crate) toolchain: Toolchain,
    /// Cookie credentials decoded at start-up
    pub(crate) credentials: Credentials,
    /// Stage store shared with the API
    pub(crate) progress: ProgressTracker,
    /// Parent of every per-run cancellation token
    pub(crate) shutdown_token: CancellationToken,
}

impl MediaService {
    /// Create a service, reading cookie credentials from the environment
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use audio_dl::{Config, MediaService};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let service = MediaService::new(Config::default()).await?;
    ///     let metadata = service.metadata("https://youtu.be/dQw4w9WgXcQ").await?;
    ///     println!("{} by {}", metadata.title, metadata.author);
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let credentials = Credentials::from_env(&config.cookies)?;
        Self::with_credentials(config, credentials).await
    }

    /// Create a service with explicit credentials
    ///
    /// Starts the progress sweeper, so this must run inside a Tokio runtime.
    pub async fn with_credentials(config: Config, credentials: Credentials) -> Result<Self> {
        config.validate()?;

        let progress = ProgressTracker::new(&config.progress);
        let shutdown_token = CancellationToken::new();
        progress.spawn_sweeper(config.progress.sweep_interval, shutdown_token.child_token());

        let toolchain = Toolchain::new(config.tools.clone());
        let capabilities = toolchain.capabilities();
        tracing::info!(
            yt_dlp = capabilities.yt_dlp,
            ffmpeg = capabilities.ffmpeg,
            cookies = credentials.cookie_file().is_some(),
            workspace_root = ?config.pipeline.workspace_root,
            "media service ready"
        );

        Ok(Self {
            config: Arc::new(config),
            toolchain,
            credentials,
            progress,
            shutdown_token,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// The progress store
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Current progress of a task
    pub fn task_progress(&self, task_id: &TaskId) -> Result<ProgressSnapshot> {
        self.progress.get(task_id)
    }

    /// Subscribe to stage transitions of every task
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Which external tools are usable right now
    pub fn capabilities(&self) -> ToolCapabilities {
        self.toolchain.capabilities()
    }

    /// Token cancelled when the service shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    fn extractor(&self) -> MetadataExtractor {
        MetadataExtractor::new(
            self.credentials.clone(),
            self.config.tools.metadata_timeout,
        )
    }

    fn orchestrator(&self) -> DownloadOrchestrator {
        DownloadOrchestrator::new(
            self.credentials.clone(),
            self.config.tools.download_timeout,
            self.config.pipeline.max_file_size,
        )
    }

    fn transcoder(&self) -> Transcoder {
        Transcoder::new(
            self.config.pipeline.transcode_bitrate.clone(),
            self.config.pipeline.transcode_extension.clone(),
            self.config.tools.transcode_timeout,
        )
    }
}
