//! Metadata extraction through yt-dlp
//!
//! The tool is asked for a single JSON document describing the resource
//! (`--dump-single-json --skip-download`). Only the fields the service exposes
//! are deserialized; everything else in the document is ignored.

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::tools::{ToolBinary, ToolInvocation};
use crate::types::{FormatDescriptor, MediaMetadata};
use crate::validation::MediaUrl;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Title used when the source has none
pub const DEFAULT_TITLE: &str = "video";

/// Author used when the source has neither uploader nor channel
pub const DEFAULT_AUTHOR: &str = "unknown";

/// Container extension used when a variant does not report one
pub const DEFAULT_CONTAINER: &str = "unknown";

/// Codec value yt-dlp uses for "stream absent"
const NO_CODEC: &str = "none";

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    language: Option<String>,
    duration: Option<f64>,
    formats: Option<Vec<RawFormat>>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    abr: Option<f64>,
    tbr: Option<f64>,
    language: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn codec(value: Option<String>) -> Option<String> {
    non_empty(value).filter(|v| v != NO_CODEC)
}

impl RawFormat {
    fn into_descriptor(self) -> Option<FormatDescriptor> {
        let format_id = non_empty(self.format_id)?;
        let filesize = self
            .filesize
            .or(self.filesize_approx)
            .filter(|size| size.is_finite() && *size >= 0.0)
            .map(|size| size as u64);

        Some(FormatDescriptor {
            format_id,
            container_ext: non_empty(self.ext).unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            audio_codec: codec(self.acodec),
            video_codec: codec(self.vcodec),
            bitrate: self.abr.or(self.tbr),
            language: non_empty(self.language),
            filesize,
        })
    }
}

impl RawInfo {
    fn into_metadata(self) -> MediaMetadata {
        let mut seen = HashSet::new();
        let formats = self
            .formats
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawFormat::into_descriptor)
            .filter(|format| seen.insert(format.format_id.clone()))
            .collect();

        MediaMetadata {
            title: non_empty(self.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            author: non_empty(self.uploader)
                .or_else(|| non_empty(self.channel))
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            thumbnail: non_empty(self.thumbnail),
            language: non_empty(self.language),
            duration: self.duration,
            formats,
        }
    }
}

/// Parse the JSON document printed by the inspection call
pub fn parse_info(document: &[u8]) -> Result<MediaMetadata> {
    let raw: RawInfo = serde_json::from_slice(document)
        .map_err(|e| Error::Extraction(format!("unreadable metadata document: {e}")))?;
    Ok(raw.into_metadata())
}

/// Runs the inspection call and normalizes its output
#[derive(Clone, Debug)]
pub struct MetadataExtractor {
    credentials: Credentials,
    timeout: Duration,
}

impl MetadataExtractor {
    /// Create an extractor
    pub fn new(credentials: Credentials, timeout: Duration) -> Self {
        Self {
            credentials,
            timeout,
        }
    }

    /// Build the inspection call for `url`
    pub fn invocation(
        &self,
        binary: ToolBinary,
        url: &MediaUrl,
        cancel_token: CancellationToken,
    ) -> ToolInvocation {
        ToolInvocation::new(binary, self.timeout, cancel_token)
            .args([
                "--dump-single-json",
                "--skip-download",
                "--no-playlist",
                "--no-warnings",
            ])
            .args(self.credentials.tool_args())
            .arg("--")
            .arg(url.as_str())
    }

    /// Inspect `url` without downloading anything
    ///
    /// # Errors
    ///
    /// [`Error::Extraction`] carrying the tool's diagnostic verbatim when the
    /// resource cannot be inspected, plus the run errors of
    /// [`ToolInvocation::run`].
    pub async fn extract(
        &self,
        binary: ToolBinary,
        url: &MediaUrl,
        cancel_token: CancellationToken,
    ) -> Result<MediaMetadata> {
        let tool = binary.name();
        let output = self.invocation(binary, url, cancel_token).run().await?;

        if !output.success() {
            let stderr = output.stderr_text();
            tracing::warn!(tool, url = %url, code = ?output.exit_code(), stderr = %stderr, "metadata extraction failed");
            let message = if stderr.is_empty() {
                format!("{tool} could not inspect {url}")
            } else {
                stderr
            };
            return Err(Error::Extraction(message));
        }

        let metadata = parse_info(&output.stdout)?;
        tracing::info!(
            url = %url,
            title = %metadata.title,
            formats = metadata.formats.len(),
            "metadata extracted"
        );
        Ok(metadata)
    }
}
