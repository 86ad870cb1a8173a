//! # audio-dl
//!
//! Audio acquisition and transcode pipeline for media URLs, built on the
//! `yt-dlp` and `ffmpeg` executables.
//!
//! ## Design Philosophy
//!
//! audio-dl is designed to be:
//! - **Per-request** - Every run gets its own scratch workspace, removed when the run ends
//! - **Streamed** - Files are delivered in fixed-size chunks, never buffered whole
//! - **Observable** - Every stage transition is recorded per task and broadcast as an event
//! - **Library-first** - The HTTP surface in [`api`] is a thin layer over [`MediaService`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use audio_dl::{Config, MediaService, types::DownloadRequest};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = MediaService::new(Config::default()).await?;
//!
//!     let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
//!     let metadata = service.metadata(url).await?;
//!     println!("{} by {}", metadata.title, metadata.author);
//!
//!     let download = service
//!         .download(DownloadRequest::new(url, "140").convert(true))
//!         .await?;
//!     println!("{} ({} bytes)", download.filename, download.size);
//!
//!     let mut stream = download.into_stream();
//!     while let Some(chunk) = stream.next().await {
//!         let _bytes = chunk?;
//!     }
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
/// Configuration types
pub mod config;
/// Cookie credentials for the extraction tool
pub mod credentials;
/// Error types
pub mod error;
/// Acquisition, transcode and streaming pipeline
pub mod pipeline;
/// Per-task progress store and event broadcast
pub mod progress;
/// External tool discovery and invocation
pub mod tools;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Media URL validation
pub mod validation;
/// Per-run scratch directories
pub mod workspace;

// Re-export commonly used types
pub use config::Config;
pub use credentials::Credentials;
pub use error::{ApiError, DownloadError, Error, Result, ToHttpStatus, TranscodeError};
pub use pipeline::{AudioDownload, MediaService};
pub use progress::ProgressTracker;
pub use types::{
    DownloadRequest, FormatDescriptor, MediaMetadata, ProgressEvent, ProgressSnapshot, Stage,
    TaskId,
};
pub use validation::MediaUrl;

/// Helper function to run the service with graceful signal handling.
///
/// Waits for a termination signal and then calls the service's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use audio_dl::{MediaService, Config, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = Arc::new(MediaService::new(Config::default()).await?);
///     let server = service.spawn_api_server();
///
///     // Run with automatic signal handling
///     run_with_shutdown(&service).await?;
///     server.await??;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: &MediaService) -> Result<()> {
    wait_for_signal().await;
    service.shutdown().await
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
