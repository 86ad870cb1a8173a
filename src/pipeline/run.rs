//! Request entry points.

use super::download::MediaFile;
use super::stream::{AudioDownload, AudioStream, DeliveryHeaders};
use super::MediaService;
use crate::error::{Error, Result};
use crate::progress::TaskGuard;
use crate::tools::ToolBinary;
use crate::types::{DownloadRequest, MediaMetadata, Stage, TaskId};
use crate::utils;
use crate::validation::MediaUrl;
use crate::workspace::Workspace;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Longest caller-chosen task identifier
const MAX_TASK_ID_LENGTH: usize = 128;

/// A request that passed validation and tool pre-flight
struct Accepted {
    url: MediaUrl,
    format_id: String,
    yt_dlp: ToolBinary,
    ffmpeg: Option<ToolBinary>,
    task_id: TaskId,
}

impl MediaService {
    /// Check a caller-supplied URL: present, bounded, and a recognized host
    pub fn parse_url(&self, input: &str) -> Result<MediaUrl> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::Validation("URL is required.".to_string()));
        }
        if input.len() > self.config.pipeline.max_url_length {
            return Err(Error::Validation(format!(
                "URL must be at most {} characters.",
                self.config.pipeline.max_url_length
            )));
        }
        MediaUrl::parse(input)
    }

    /// Inspect a media URL without downloading it
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] / [`Error::InvalidUrl`] for unusable input
    /// - [`Error::ToolUnavailable`] when yt-dlp is missing
    /// - [`Error::Extraction`] with the tool's diagnostic when inspection fails
    pub async fn metadata(&self, input: &str) -> Result<MediaMetadata> {
        let url = self.parse_url(input)?;
        let yt_dlp = self.toolchain.yt_dlp()?;
        self.extractor()
            .extract(yt_dlp, &url, self.shutdown_token.child_token())
            .await
    }

    /// Acquire one variant and prepare it for streaming
    ///
    /// Validation and tool pre-flight happen before a task is registered or
    /// anything is spawned. Every later failure is recorded on the task and
    /// leaves no workspace behind. On success the task is in `streaming` and
    /// the returned [`AudioDownload`] owns the rest of the run.
    pub async fn download(&self, request: DownloadRequest) -> Result<AudioDownload> {
        let accepted = self.accept(request)?;
        let mut guard = self.progress.guard(accepted.task_id.clone());
        let cancel_token = self.shutdown_token.child_token();

        info!(
            task_id = %accepted.task_id,
            url = %accepted.url,
            format_id = %accepted.format_id,
            convert = accepted.ffmpeg.is_some(),
            "download accepted"
        );

        let (metadata, file, workspace) = match self.acquire(&accepted, &guard, &cancel_token).await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(task_id = %accepted.task_id, error = %e, "download failed");
                guard.fail(e.to_string());
                return Err(e);
            }
        };

        let extension = self.delivered_extension(&accepted, &metadata, &file);
        let headers = match DeliveryHeaders::new(&accepted.task_id, &metadata.title, &extension) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(task_id = %accepted.task_id, error = %e, "cannot announce download");
                workspace.close().await;
                guard.fail(e.to_string());
                return Err(e);
            }
        };

        let stream = AudioStream::open(
            &file,
            workspace,
            guard,
            &extension,
            self.config.pipeline.chunk_size,
        )
        .await?;

        Ok(AudioDownload {
            task_id: accepted.task_id,
            filename: utils::attachment_filename(&metadata.title, &extension),
            content_type: utils::content_type_for(&extension),
            title: metadata.title,
            extension,
            size: file.size,
            headers,
            stream,
        })
    }

    /// Extract, download, and optionally transcode
    ///
    /// The workspace is removed before any error is returned.
    async fn acquire(
        &self,
        accepted: &Accepted,
        guard: &TaskGuard,
        cancel_token: &CancellationToken,
    ) -> Result<(MediaMetadata, MediaFile, Workspace)> {
        let metadata = self
            .extractor()
            .extract(accepted.yt_dlp.clone(), &accepted.url, cancel_token.clone())
            .await?;

        let workspace = Workspace::create(&self.config.pipeline.workspace_root).await?;
        match self.produce(accepted, guard, &workspace, cancel_token).await {
            Ok(file) => Ok((metadata, file, workspace)),
            Err(e) => {
                workspace.close().await;
                Err(e)
            }
        }
    }

    async fn produce(
        &self,
        accepted: &Accepted,
        guard: &TaskGuard,
        workspace: &Workspace,
        cancel_token: &CancellationToken,
    ) -> Result<MediaFile> {
        guard.set(Stage::StartingDownload, None);

        let downloaded = self
            .orchestrator()
            .download(
                accepted.yt_dlp.clone(),
                &accepted.url,
                &accepted.format_id,
                workspace,
                cancel_token.clone(),
                || guard.set(Stage::Downloading, None),
            )
            .await?;
        guard.set(Stage::DownloadComplete, Some(downloaded.size.to_string()));

        let Some(ffmpeg) = &accepted.ffmpeg else {
            return Ok(downloaded);
        };

        let transcoder = self.transcoder();
        guard.set(Stage::Converting, Some(transcoder.extension().to_string()));
        transcoder
            .transcode(ffmpeg.clone(), &downloaded, workspace, cancel_token.clone())
            .await
    }

    /// Converted runs use the transcode target; otherwise the variant's
    /// container, falling back to whatever the tool actually wrote
    fn delivered_extension(
        &self,
        accepted: &Accepted,
        metadata: &MediaMetadata,
        file: &MediaFile,
    ) -> String {
        if accepted.ffmpeg.is_some() {
            return self.config.pipeline.transcode_extension.clone();
        }

        metadata
            .format(&accepted.format_id)
            .map(|format| format.container_ext.as_str())
            .filter(|ext| *ext != super::metadata::DEFAULT_CONTAINER)
            .or_else(|| file.extension())
            .unwrap_or("bin")
            .to_string()
    }

    fn accept(&self, request: DownloadRequest) -> Result<Accepted> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let DownloadRequest {
            url,
            format_id,
            convert_to_mp3,
            task_id,
        } = request;

        let (Some(url), Some(format_id)) = (
            url.filter(|u| !u.trim().is_empty()),
            format_id.filter(|f| !f.trim().is_empty()),
        ) else {
            return Err(Error::Validation(
                "URL and format_id are required.".to_string(),
            ));
        };

        let task_id = task_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if let Some(id) = &task_id {
            if id.len() > MAX_TASK_ID_LENGTH || !id.bytes().all(|b| b.is_ascii_graphic()) {
                return Err(Error::Validation(format!(
                    "task_id must be at most {MAX_TASK_ID_LENGTH} printable ASCII characters without spaces."
                )));
            }
        }

        let url = self.parse_url(&url)?;
        let yt_dlp = self.toolchain.yt_dlp()?;
        let ffmpeg = if convert_to_mp3 {
            Some(self.toolchain.ffmpeg()?)
        } else {
            None
        };

        let task_id = task_id.map(TaskId::from).unwrap_or_else(TaskId::generate);

        Ok(Accepted {
            url,
            format_id: format_id.trim().to_string(),
            yt_dlp,
            ffmpeg,
            task_id,
        })
    }
}
