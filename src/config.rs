//! Configuration types for audio-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// External tool discovery and time budgets
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Time budget for a metadata inspection, in seconds (default: 60)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub metadata_timeout: Duration,

    /// Time budget for a download, in seconds (default: 600)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub download_timeout: Duration,

    /// Time budget for a transcode, in seconds (default: 600)
    #[serde(default = "default_transcode_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub transcode_timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            search_path: true,
            metadata_timeout: default_metadata_timeout(),
            download_timeout: default_download_timeout(),
            transcode_timeout: default_transcode_timeout(),
        }
    }
}

/// Acquisition pipeline settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PipelineConfig {
    /// Directory under which per-run workspaces are created (default: system temp dir)
    #[serde(default = "default_workspace_root")]
    #[schema(value_type = String)]
    pub workspace_root: PathBuf,

    /// Largest accepted download in bytes (default: 100 MiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Streaming chunk size in bytes (default: 65536)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Audio bitrate passed to the transcoder (default: "192k")
    #[serde(default = "default_transcode_bitrate")]
    pub transcode_bitrate: String,

    /// Target container of the transcoder (default: "mp3")
    #[serde(default = "default_transcode_extension")]
    pub transcode_extension: String,

    /// Longest accepted URL (default: 2048)
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            max_file_size: default_max_file_size(),
            chunk_size: default_chunk_size(),
            transcode_bitrate: default_transcode_bitrate(),
            transcode_extension: default_transcode_extension(),
            max_url_length: default_max_url_length(),
        }
    }
}

/// Cookie credential materialization
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CookieConfig {
    /// Environment variable holding the base64-encoded cookie file (default: "YTDLP_COOKIES_B64")
    #[serde(default = "default_cookie_env_var")]
    pub env_var: String,

    /// Where the decoded cookie file is written
    #[serde(default = "default_cookie_path")]
    #[schema(value_type = String)]
    pub path: PathBuf,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            env_var: default_cookie_env_var(),
            path: default_cookie_path(),
        }
    }
}

/// Progress store lifetime settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressConfig {
    /// How long finished tasks stay queryable, in seconds (default: 600)
    #[serde(default = "default_retention", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub retention: Duration,

    /// How long an unfinished task may go without updates, in seconds (default: 3600)
    #[serde(default = "default_idle_ttl", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub idle_ttl: Duration,

    /// Interval between eviction sweeps, in seconds (default: 60)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub sweep_interval: Duration,

    /// Capacity of the progress event broadcast channel (default: 256)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            idle_ttl: default_idle_ttl(),
            sweep_interval: default_sweep_interval(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Main configuration for MediaService
///
/// Fields are organized into logical sub-configs:
/// - [`tools`](ToolsConfig) - external binary paths and time budgets
/// - [`pipeline`](PipelineConfig) - workspaces, size ceiling, transcode target
/// - [`cookies`](CookieConfig) - credential blob location
/// - [`progress`](ProgressConfig) - task retention
/// - [`server`](ServerIntegrationConfig) - REST API
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// External tool paths and time budgets
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Cookie credential settings
    #[serde(default)]
    pub cookies: CookieConfig,

    /// Progress store settings
    #[serde(default)]
    pub progress: ProgressConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let checks: [(bool, &str, &str); 7] = [
            (self.pipeline.max_file_size == 0, "max_file_size", "must be greater than zero"),
            (self.pipeline.chunk_size == 0, "chunk_size", "must be greater than zero"),
            (self.pipeline.max_url_length == 0, "max_url_length", "must be greater than zero"),
            (self.tools.metadata_timeout.is_zero(), "metadata_timeout", "must be greater than zero"),
            (self.tools.download_timeout.is_zero(), "download_timeout", "must be greater than zero"),
            (self.tools.transcode_timeout.is_zero(), "transcode_timeout", "must be greater than zero"),
            (self.progress.event_capacity == 0, "event_capacity", "must be greater than zero"),
        ];

        if let Some((_, key, message)) = checks.iter().find(|(failed, _, _)| *failed) {
            return Err(Error::Config {
                message: format!("{key} {message}"),
                key: Some((*key).to_string()),
            });
        }

        if self.pipeline.transcode_extension.is_empty()
            || !self
                .pipeline
                .transcode_extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(Error::Config {
                message: "transcode_extension must be a plain alphanumeric extension".to_string(),
                key: Some("transcode_extension".to_string()),
            });
        }

        Ok(())
    }
}

/// External access settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Rate limiting configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Requests per second per IP across all routes (default: 100)
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size (default: 200)
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// Stricter per-route limits applied on top of the global bucket
    #[serde(default = "default_route_limits")]
    pub routes: Vec<RouteLimit>,

    /// Endpoints exempt from rate limiting
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,

    /// IPs exempt from rate limiting (e.g., localhost)
    #[serde(default = "default_exempt_ips")]
    #[schema(value_type = Vec<String>)]
    pub exempt_ips: Vec<std::net::IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
            routes: default_route_limits(),
            exempt_paths: default_exempt_paths(),
            exempt_ips: default_exempt_ips(),
        }
    }
}

/// A per-route limit: at most `requests` within every `period`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouteLimit {
    /// Exact request path (e.g. "/download")
    pub path: String,
    /// Requests allowed per period
    pub requests: u32,
    /// Period length in seconds
    #[serde(with = "duration_serde")]
    #[schema(value_type = u64)]
    pub period: Duration,
}

fn default_true() -> bool {
    true
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_transcode_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir()
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_transcode_bitrate() -> String {
    "192k".to_string()
}

fn default_transcode_extension() -> String {
    "mp3".to_string()
}

fn default_max_url_length() -> usize {
    2048
}

fn default_cookie_env_var() -> String {
    "YTDLP_COOKIES_B64".to_string()
}

fn default_cookie_path() -> PathBuf {
    std::env::temp_dir().join("audio-dl-cookies.txt")
}

fn default_retention() -> Duration {
    Duration::from_secs(600)
}

fn default_idle_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_event_capacity() -> usize {
    256
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_requests_per_second() -> u32 {
    100
}

fn default_burst_size() -> u32 {
    200
}

fn default_route_limits() -> Vec<RouteLimit> {
    vec![
        RouteLimit {
            path: "/metadata".to_string(),
            requests: 5,
            period: Duration::from_secs(10),
        },
        RouteLimit {
            path: "/download".to_string(),
            requests: 2,
            period: Duration::from_secs(60),
        },
    ]
}

fn default_exempt_paths() -> Vec<String> {
    vec![
        "/events".to_string(), // SSE is long-lived
        "/ping".to_string(),   // Liveness checks should always work
        "/progress".to_string(),
    ]
}

fn default_exempt_ips() -> Vec<std::net::IpAddr> {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    vec![
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
    ]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
