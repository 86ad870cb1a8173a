//! Media URL validation
//!
//! [`MediaUrl`] can only be built through [`MediaUrl::parse`], so every URL that
//! reaches an external tool has passed the structural check below. No network
//! access happens here.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Supported hosts, optional scheme and `www`, an optional path/query form,
/// then the 11-character video identifier.
const MEDIA_URL_PATTERN: &str = r"^(?:https?://)?(?:www\.)?(?:youtube|youtu|youtube-nocookie)\.(?:com|be)/(?:watch\?v=|embed/|v/|.+\?v=)?([^&=%\?]{11})";

fn media_url_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    PATTERN.get_or_init(|| Regex::new(MEDIA_URL_PATTERN).expect("MEDIA_URL_PATTERN is a valid regex"))
}

/// A URL that identifies a supported media resource
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MediaUrl {
    raw: String,
    video_id: String,
}

impl MediaUrl {
    /// Classify `input` as a supported media URL
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] when the host is not supported or the
    /// identifier token is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use audio_dl::validation::MediaUrl;
    ///
    /// let url = MediaUrl::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
    /// assert_eq!(url.video_id(), "dQw4w9WgXcQ");
    /// assert!(MediaUrl::parse("https://www.google.com").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let captures = media_url_regex()
            .captures(input)
            .ok_or_else(|| Error::InvalidUrl(input.to_string()))?;

        let video_id = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::InvalidUrl(input.to_string()))?;

        Ok(Self {
            raw: input.to_string(),
            video_id,
        })
    }

    /// The URL exactly as supplied
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The 11-character identifier token
    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

impl fmt::Display for MediaUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Whether `input` would be accepted by [`MediaUrl::parse`]
pub fn is_media_url(input: &str) -> bool {
    media_url_regex().is_match(input)
}
