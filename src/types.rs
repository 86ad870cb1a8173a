//! Core types shared by the pipeline, the progress tracker and the API

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Unique identifier for a download task
///
/// Identifiers are opaque strings. Callers may supply their own; otherwise one
/// is generated server-side.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh random identifier (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Pipeline stage of a download task
///
/// Stages are listed in the order a run moves through them. `Converting` only
/// appears when conversion was requested; `Error` is terminal and reachable
/// from any stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Task accepted, nothing started yet
    Initializing,
    /// Workspace ready, download tool about to be spawned
    StartingDownload,
    /// Download tool running
    Downloading,
    /// Download finished and size-checked
    DownloadComplete,
    /// Transcode tool running
    Converting,
    /// Bytes are being delivered to the caller
    Streaming,
    /// All bytes delivered and workspace removed
    Completed,
    /// Run failed; detail carries the reason
    Error,
}

impl Stage {
    /// Position of this stage in the expected sequence
    pub fn ordinal(self) -> u8 {
        match self {
            Stage::Initializing => 0,
            Stage::StartingDownload => 1,
            Stage::Downloading => 2,
            Stage::DownloadComplete => 3,
            Stage::Converting => 4,
            Stage::Streaming => 5,
            Stage::Completed => 6,
            Stage::Error => 7,
        }
    }

    /// Whether the task can no longer change stage
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Error)
    }

    /// Wire name of the stage (matches the serde representation)
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "initializing",
            Stage::StartingDownload => "starting_download",
            Stage::Downloading => "downloading",
            Stage::DownloadComplete => "download_complete",
            Stage::Converting => "converting",
            Stage::Streaming => "streaming",
            Stage::Completed => "completed",
            Stage::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current progress of one task, as returned by progress queries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressSnapshot {
    /// Task identifier
    pub task_id: TaskId,
    /// Current stage
    pub stage: Stage,
    /// Stage detail (file extension, byte size, error reason, ...)
    pub detail: Option<String>,
    /// When the stage was last written
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Event broadcast on every progress write
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressEvent {
    /// Task identifier
    pub task_id: TaskId,
    /// Stage that was entered
    pub stage: Stage,
    /// Stage detail
    pub detail: Option<String>,
}

/// One selectable encoding variant of a media resource
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FormatDescriptor {
    /// Stable selector passed back when downloading
    pub format_id: String,
    /// Container extension chosen by the source (e.g. "m4a", "webm")
    pub container_ext: String,
    /// Audio codec, if the variant carries audio
    pub audio_codec: Option<String>,
    /// Video codec, if the variant carries video
    pub video_codec: Option<String>,
    /// Bitrate in kbit/s
    pub bitrate: Option<f64>,
    /// Language tag
    pub language: Option<String>,
    /// Exact or approximate size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
}

impl FormatDescriptor {
    /// Whether this variant carries audio and no video
    pub fn is_audio_only(&self) -> bool {
        self.audio_codec.is_some() && self.video_codec.is_none()
    }
}

/// Normalized metadata for a media resource
///
/// Built fresh on each extraction; never cached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaMetadata {
    /// Title ("video" when the source has none)
    pub title: String,
    /// Uploader ("unknown" when the source has none)
    pub author: String,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Language tag
    pub language: Option<String>,
    /// Duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Encoding variants in source order, unique by `format_id`
    pub formats: Vec<FormatDescriptor>,
}

impl MediaMetadata {
    /// Look up a variant by its selector
    pub fn format(&self, format_id: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| f.format_id == format_id)
    }
}

/// Body of a download request
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Media URL
    #[serde(default)]
    pub url: Option<String>,
    /// Selected variant
    #[serde(default)]
    pub format_id: Option<String>,
    /// Transcode to MP3 before delivery
    #[serde(default)]
    pub convert_to_mp3: bool,
    /// Caller-chosen task identifier (generated when absent)
    #[serde(default)]
    pub task_id: Option<String>,
}

impl DownloadRequest {
    /// Build a request for a URL and format, without conversion
    pub fn new(url: impl Into<String>, format_id: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            format_id: Some(format_id.into()),
            convert_to_mp3: false,
            task_id: None,
        }
    }

    /// Request conversion to MP3
    pub fn convert(mut self, convert: bool) -> Self {
        self.convert_to_mp3 = convert;
        self
    }

    /// Use a caller-chosen task identifier
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}
