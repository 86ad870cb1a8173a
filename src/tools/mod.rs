//! External tool discovery and invocation
//!
//! The pipeline depends on two opaque executables:
//!
//! - `yt-dlp` for metadata inspection and downloading
//! - `ffmpeg` for transcoding
//!
//! Tools are resolved per request through [`Toolchain`], so an executable that
//! appears or disappears at runtime is noticed before anything is spawned.
//! [`ToolInvocation`] runs a resolved tool with a time budget and a
//! cancellation token; losing either race kills the child process.

mod process;

pub use process::{ToolInvocation, ToolOutput};

use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

/// Executable name of the extraction/download tool
pub const YT_DLP: &str = "yt-dlp";

/// Executable name of the transcode tool
pub const FFMPEG: &str = "ffmpeg";

/// A resolved executable
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolBinary {
    name: &'static str,
    path: PathBuf,
}

impl ToolBinary {
    /// Resolve an executable
    ///
    /// An explicit path must point at an existing file. Without one, `PATH` is
    /// searched (using the `which` crate) when `search_path` is set.
    ///
    /// # Errors
    ///
    /// [`Error::ToolUnavailable`] when the executable cannot be found.
    pub fn resolve(name: &'static str, explicit: Option<&Path>, search_path: bool) -> Result<Self> {
        let unavailable = || Error::ToolUnavailable {
            tool: name.to_string(),
        };

        let path = match explicit {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => {
                tracing::warn!(tool = name, ?path, "configured tool path does not exist");
                return Err(unavailable());
            }
            None if search_path => which::which(name).map_err(|_| unavailable())?,
            None => return Err(unavailable()),
        };

        Ok(Self { name, path })
    }

    /// Executable name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolved path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Which tools are currently usable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ToolCapabilities {
    /// Metadata extraction and downloading
    pub yt_dlp: bool,
    /// Conversion to the transcode target
    pub ffmpeg: bool,
}

/// Resolves the tools the pipeline needs
#[derive(Clone, Debug)]
pub struct Toolchain {
    config: ToolsConfig,
}

impl Toolchain {
    /// Create a toolchain from configuration
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    /// Tool configuration (paths and time budgets)
    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    /// Resolve the extraction/download tool
    pub fn yt_dlp(&self) -> Result<ToolBinary> {
        ToolBinary::resolve(
            YT_DLP,
            self.config.yt_dlp_path.as_deref(),
            self.config.search_path,
        )
    }

    /// Resolve the transcode tool
    pub fn ffmpeg(&self) -> Result<ToolBinary> {
        ToolBinary::resolve(
            FFMPEG,
            self.config.ffmpeg_path.as_deref(),
            self.config.search_path,
        )
    }

    /// Probe both tools without failing
    pub fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            yt_dlp: self.yt_dlp().is_ok(),
            ffmpeg: self.ffmpeg().is_ok(),
        }
    }
}
