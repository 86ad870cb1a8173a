//! Chunked delivery of a finished file
//!
//! [`AudioStream`] owns the workspace the file lives in together with the
//! run's [`TaskGuard`]. Reading to the end removes the workspace and then marks
//! the task completed. Dropping the stream early (the consumer went away)
//! removes the workspace as well and leaves the task failed.

use super::download::MediaFile;
use crate::error::{Error, Result};
use crate::progress::TaskGuard;
use crate::types::{Stage, TaskId};
use crate::workspace::Workspace;
use axum::body::Bytes;
use axum::http::HeaderValue;
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Chunk size used when none is configured
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;

struct Emitter {
    // Field order is drop order: close the file, remove the workspace, then
    // let the guard record the outcome.
    file: Option<File>,
    workspace: Option<Workspace>,
    guard: TaskGuard,
    chunk_size: usize,
    sent: u64,
}

impl Emitter {
    async fn next(&mut self) -> Option<io::Result<Bytes>> {
        let file = self.file.as_mut()?;

        let mut buf = Vec::with_capacity(self.chunk_size);
        let read = (&mut *file)
            .take(self.chunk_size as u64)
            .read_to_end(&mut buf)
            .await;

        match read {
            Ok(0) => {
                self.finish().await;
                None
            }
            Ok(n) => {
                self.sent += n as u64;
                Some(Ok(Bytes::from(buf)))
            }
            Err(e) => {
                tracing::warn!(task_id = %self.guard.task_id(), error = %e, "read failed mid-stream");
                self.release().await;
                self.guard.fail(format!("stream read failed: {e}"));
                Some(Err(e))
            }
        }
    }

    async fn finish(&mut self) {
        self.release().await;
        self.guard.complete();
        tracing::info!(task_id = %self.guard.task_id(), bytes = self.sent, "stream delivered");
    }

    async fn release(&mut self) {
        self.file = None;
        if let Some(workspace) = self.workspace.take() {
            workspace.close().await;
        }
    }
}

/// Finite stream of file chunks
///
/// Every chunk is exactly the configured size except the last, which carries
/// the remainder.
pub struct AudioStream {
    inner: Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>,
}

impl AudioStream {
    /// Open `file` for streaming and take ownership of its workspace
    ///
    /// Records `streaming` (with `extension` as detail) once the file is open.
    /// If it cannot be opened the workspace is removed and the task failed.
    pub async fn open(
        file: &MediaFile,
        workspace: Workspace,
        mut guard: TaskGuard,
        extension: &str,
        chunk_size: usize,
    ) -> Result<Self> {
        let handle = match File::open(&file.path).await {
            Ok(handle) => handle,
            Err(e) => {
                workspace.close().await;
                guard.fail(format!("cannot open output: {e}"));
                return Err(e.into());
            }
        };

        guard.set(Stage::Streaming, Some(extension.to_string()));

        let emitter = Emitter {
            file: Some(handle),
            workspace: Some(workspace),
            guard,
            chunk_size: if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size },
            sent: 0,
        };

        let inner = futures::stream::unfold(emitter, |mut emitter| async move {
            emitter.next().await.map(|item| (item, emitter))
        });

        Ok(Self {
            inner: Box::pin(inner),
        })
    }
}

impl Stream for AudioStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStream").finish_non_exhaustive()
    }
}

/// Header values announced with a delivered file
///
/// Built while the run still owns its workspace, so a title or container
/// extension that cannot be expressed as a header fails the task like any
/// other pipeline error.
#[derive(Clone, Debug)]
pub struct DeliveryHeaders {
    /// Value of the `X-Task-Id` header
    pub task_id: HeaderValue,
    /// Value of the `Content-Disposition` header
    pub content_disposition: HeaderValue,
}

impl DeliveryHeaders {
    /// Render the headers for `<title>.<extension>` delivered under `task_id`
    pub fn new(task_id: &TaskId, title: &str, extension: &str) -> Result<Self> {
        let task_id = HeaderValue::from_str(task_id.as_str())
            .map_err(|e| Error::Other(format!("invalid task id header: {e}")))?;
        let content_disposition =
            HeaderValue::from_str(&crate::utils::content_disposition(title, extension))
                .map_err(|e| Error::Other(format!("invalid Content-Disposition: {e}")))?;

        Ok(Self {
            task_id,
            content_disposition,
        })
    }
}

/// A ready-to-deliver audio file
///
/// Headers are known before the first byte is sent; the body is consumed
/// through [`into_stream`](Self::into_stream).
#[derive(Debug)]
pub struct AudioDownload {
    /// Task tracking this run
    pub task_id: TaskId,
    /// Title of the media resource
    pub title: String,
    /// Suggested attachment filename, `<sanitized title>.<extension>`
    pub filename: String,
    /// Delivered container extension
    pub extension: String,
    /// MIME type of the body
    pub content_type: &'static str,
    /// Body length in bytes
    pub size: u64,
    /// Pre-validated response header values
    pub headers: DeliveryHeaders,
    pub(crate) stream: AudioStream,
}

impl AudioDownload {
    /// Consume into the body stream
    pub fn into_stream(self) -> AudioStream {
        self.stream
    }
}
