//! Conversion of a downloaded source through ffmpeg

use super::download::MediaFile;
use crate::error::{Result, TranscodeError};
use crate::tools::{ToolBinary, ToolInvocation};
use crate::workspace::Workspace;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// File stem of the transcoded output
pub const CONVERTED_STEM: &str = "converted_audio";

/// Drives ffmpeg for one conversion
#[derive(Clone, Debug)]
pub struct Transcoder {
    bitrate: String,
    extension: String,
    timeout: Duration,
}

impl Transcoder {
    /// Create a transcoder producing `extension` files at `bitrate`
    pub fn new(bitrate: impl Into<String>, extension: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bitrate: bitrate.into(),
            extension: extension.into(),
            timeout,
        }
    }

    /// Extension of every file this transcoder produces
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Build the conversion call from `source` to `output`
    pub fn invocation(
        &self,
        binary: ToolBinary,
        source: &Path,
        output: &Path,
        cancel_token: CancellationToken,
    ) -> ToolInvocation {
        ToolInvocation::new(binary, self.timeout, cancel_token)
            .args(["-hide_banner", "-nostdin", "-y", "-i"])
            .arg(source)
            .args(["-vn", "-ab"])
            .arg(&self.bitrate)
            .args(["-map_metadata", "0"])
            .arg(output)
    }

    /// Convert `source` into a new file in `workspace`
    ///
    /// On success the source is deleted and the converted file returned. On
    /// failure both the source and any partial output are deleted.
    pub async fn transcode(
        &self,
        binary: ToolBinary,
        source: &MediaFile,
        workspace: &Workspace,
        cancel_token: CancellationToken,
    ) -> Result<MediaFile> {
        let output = workspace.file(&format!("{CONVERTED_STEM}.{}", self.extension));

        let result = self
            .convert(binary, source, &output, cancel_token)
            .await;

        match &result {
            Ok(converted) => {
                workspace.discard(&source.path).await;
                info!(
                    source_size = source.size,
                    size = converted.size,
                    extension = %self.extension,
                    "transcode complete"
                );
            }
            Err(_) => {
                workspace.discard(&source.path).await;
                workspace.discard(&output).await;
            }
        }
        result
    }

    async fn convert(
        &self,
        binary: ToolBinary,
        source: &MediaFile,
        output: &Path,
        cancel_token: CancellationToken,
    ) -> Result<MediaFile> {
        let run = self
            .invocation(binary, &source.path, output, cancel_token)
            .run()
            .await?;

        if !run.success() {
            let stderr = run.stderr_text();
            warn!(source = ?source.path, code = ?run.exit_code(), stderr = %stderr, "transcode failed");
            return Err(TranscodeError::ToolFailed {
                exit_code: run.exit_code(),
                stderr,
            }
            .into());
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(TranscodeError::OutputNotFound {
                path: output.to_path_buf(),
            }
            .into());
        }

        MediaFile::measure(output.to_path_buf()).await
    }
}
