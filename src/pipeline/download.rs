//! Download of one encoding variant into a workspace

use crate::credentials::Credentials;
use crate::error::{DownloadError, Error, Result};
use crate::tools::{ToolBinary, ToolInvocation};
use crate::validation::MediaUrl;
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// File stem of the downloaded source; yt-dlp appends the extension
pub const RAW_STEM: &str = "raw_audio";

/// A finished file inside a workspace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaFile {
    /// Location inside the workspace
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

impl MediaFile {
    /// Measure an existing file
    pub async fn measure(path: PathBuf) -> Result<Self> {
        let size = tokio::fs::metadata(&path).await?.len();
        Ok(Self { path, size })
    }

    /// Extension chosen by the tool that wrote it
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }

    /// Location inside the workspace
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Drives yt-dlp for one variant and enforces the size ceiling
#[derive(Clone, Debug)]
pub struct DownloadOrchestrator {
    credentials: Credentials,
    timeout: Duration,
    max_file_size: u64,
}

impl DownloadOrchestrator {
    /// Create an orchestrator
    pub fn new(credentials: Credentials, timeout: Duration, max_file_size: u64) -> Self {
        Self {
            credentials,
            timeout,
            max_file_size,
        }
    }

    /// Build the download call
    pub fn invocation(
        &self,
        binary: ToolBinary,
        url: &MediaUrl,
        format_id: &str,
        workspace: &Workspace,
        cancel_token: CancellationToken,
    ) -> ToolInvocation {
        let template = workspace.file(&format!("{RAW_STEM}.%(ext)s"));

        ToolInvocation::new(binary, self.timeout, cancel_token)
            .arg("--format")
            .arg(format_id)
            .arg("--output")
            .arg(template)
            .args([
                "--no-part",
                "--no-playlist",
                "--no-progress",
                "--quiet",
                "--no-warnings",
            ])
            .args(self.credentials.tool_args())
            .arg("--")
            .arg(url.as_str())
    }

    /// Fetch `format_id` of `url` into `workspace`
    ///
    /// `on_spawn` fires once the tool is running. On any failure the workspace
    /// is emptied; removing the directory itself is left to its owner.
    ///
    /// A file of exactly `max_file_size` bytes is accepted.
    pub async fn download(
        &self,
        binary: ToolBinary,
        url: &MediaUrl,
        format_id: &str,
        workspace: &Workspace,
        cancel_token: CancellationToken,
        on_spawn: impl FnOnce(),
    ) -> Result<MediaFile> {
        let result = self
            .fetch(binary, url, format_id, workspace, cancel_token, on_spawn)
            .await;

        if result.is_err() {
            workspace.discard_all().await;
        }
        result
    }

    async fn fetch(
        &self,
        binary: ToolBinary,
        url: &MediaUrl,
        format_id: &str,
        workspace: &Workspace,
        cancel_token: CancellationToken,
        on_spawn: impl FnOnce(),
    ) -> Result<MediaFile> {
        let output = self
            .invocation(binary, url, format_id, workspace, cancel_token)
            .run_with(on_spawn)
            .await?;

        if !output.success() {
            let stderr = output.stderr_text();
            warn!(url = %url, format_id, code = ?output.exit_code(), stderr = %stderr, "download failed");
            return Err(DownloadError::ToolFailed {
                exit_code: output.exit_code(),
                stderr,
            }
            .into());
        }

        let path = workspace.find_output(RAW_STEM).await?.ok_or_else(|| {
            Error::from(DownloadError::OutputNotFound {
                workspace: workspace.path().to_path_buf(),
            })
        })?;
        let file = MediaFile::measure(path).await?;

        if file.size > self.max_file_size {
            warn!(
                url = %url,
                size = file.size,
                limit = self.max_file_size,
                "download exceeds size limit"
            );
            return Err(DownloadError::TooLarge {
                size: file.size,
                limit: self.max_file_size,
            }
            .into());
        }

        info!(url = %url, format_id, size = file.size, path = ?file.path, "download complete");
        Ok(file)
    }
}
