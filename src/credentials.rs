//! Cookie credential materialization
//!
//! The cookie file is decoded once, when the service is constructed, and the
//! resulting [`Credentials`] value is handed to every tool invocation. Nothing
//! reads the environment after start-up.

use crate::config::CookieConfig;
use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Immutable credential configuration threaded into the tools
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    cookie_file: Option<PathBuf>,
}

impl Credentials {
    /// No credentials
    pub fn none() -> Self {
        Self::default()
    }

    /// Use an existing cookie file as-is
    pub fn with_cookie_file(path: impl Into<PathBuf>) -> Self {
        Self {
            cookie_file: Some(path.into()),
        }
    }

    /// Read the encoded blob from the configured environment variable
    ///
    /// An unset or blank variable yields [`Credentials::none`].
    pub fn from_env(config: &CookieConfig) -> Result<Self> {
        match std::env::var(&config.env_var) {
            Ok(blob) if !blob.trim().is_empty() => Self::from_blob(&blob, &config.path),
            _ => {
                tracing::debug!(env_var = %config.env_var, "no cookie blob configured");
                Ok(Self::none())
            }
        }
    }

    /// Decode a base64 cookie blob and write it to `path`
    pub fn from_blob(blob: &str, path: &Path) -> Result<Self> {
        let compact: String = blob.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = STANDARD.decode(compact.as_bytes()).map_err(|e| Error::Config {
            message: format!("cookie blob is not valid base64: {e}"),
            key: Some("cookies".to_string()),
        })?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &decoded)?;

        tracing::info!(path = ?path, bytes = decoded.len(), "cookie file materialized");

        Ok(Self::with_cookie_file(path))
    }

    /// The cookie file, if one is configured
    pub fn cookie_file(&self) -> Option<&Path> {
        self.cookie_file.as_deref()
    }

    /// Tool arguments that pass the cookie file along (empty when none)
    pub fn tool_args(&self) -> Vec<OsString> {
        match &self.cookie_file {
            Some(path) => vec![OsString::from("--cookies"), path.as_os_str().to_owned()],
            None => Vec::new(),
        }
    }
}
