//! Naming helpers for delivered files

/// Base filename used when a title has no usable characters
pub const FALLBACK_NAME: &str = "audio";

/// Reduce a title to a safe filename stem
///
/// Keeps alphanumeric characters (any script), spaces, and hyphens, then trims
/// trailing whitespace. An empty result becomes [`FALLBACK_NAME`].
///
/// # Examples
///
/// ```
/// use audio_dl::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("Song: Live @ Home!"), "Song Live  Home");
/// assert_eq!(sanitize_title("???"), "audio");
/// ```
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
        .collect();
    let trimmed = kept.trim_end();

    if trimmed.trim_start().is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<sanitized title>.<extension>`
pub fn attachment_filename(title: &str, extension: &str) -> String {
    format!("{}.{}", sanitize_title(title), extension)
}

/// MIME type for a delivered container extension
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" | "aac" => "audio/mp4",
        "webm" => "audio/webm",
        "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// `Content-Disposition` value for an attachment
///
/// Header values must be ASCII, so the plain `filename` parameter carries an
/// ASCII-only rendition of the name. When the title contains anything else,
/// the full name is added as an RFC 5987 `filename*` parameter.
pub fn content_disposition(title: &str, extension: &str) -> String {
    let full = attachment_filename(title, extension);
    if full.is_ascii() {
        return format!("attachment; filename=\"{full}\"");
    }

    let ascii: String = sanitize_title(title)
        .chars()
        .filter(char::is_ascii)
        .collect();
    let ascii = ascii.trim();
    let ascii = if ascii.is_empty() { FALLBACK_NAME } else { ascii };

    format!(
        "attachment; filename=\"{ascii}.{extension}\"; filename*=UTF-8''{}",
        urlencoding::encode(&full)
    )
}
