//! Common test utilities for audio-dl integration tests
//!
//! Fake `yt-dlp` and `ffmpeg` executables are tiny shell scripts that follow
//! the real tools' argument contracts, so every test drives the production
//! code path end to end.

#![allow(dead_code)]

use audio_dl::api::create_router;
use audio_dl::{Config, Credentials, MediaService};
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Metadata document printed by the fake extractor
pub const INFO_JSON: &str = r#"{
  "id": "dQw4w9WgXcQ",
  "title": "Rick Astley - Never Gonna Give You Up (Official Video)",
  "uploader": "Rick Astley",
  "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
  "duration": 213,
  "formats": [
    {"format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2", "vcodec": "none", "abr": 129.5},
    {"format_id": "251", "ext": "webm", "acodec": "opus", "vcodec": "none", "abr": 135.2},
    {"format_id": "18", "ext": "mp4", "acodec": "mp4a.40.2", "vcodec": "avc1.42001E", "tbr": 501.2}
  ]
}"#;

/// Knobs for the fake tools
#[derive(Clone, Debug)]
pub struct FakeTools {
    /// Metadata document to print
    pub info_json: String,
    /// Size of the file the fake download writes
    pub download_size: u64,
    /// Seconds the fake download sleeps after writing its file
    pub download_delay: u32,
}

impl Default for FakeTools {
    fn default() -> Self {
        Self {
            info_json: INFO_JSON.to_string(),
            download_size: 150_000,
            download_delay: 0,
        }
    }
}

/// Write an executable shell script and return its path
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Write fake `yt-dlp` and `ffmpeg` into `dir`
///
/// Both log their argument lists (`ytdlp.log`, `ffmpeg.log`). The fake
/// downloader writes `download_size` zero bytes using the extension the
/// selected format advertises in `info_json`.
pub fn write_fake_tools(dir: &Path, tools: &FakeTools) -> (PathBuf, PathBuf) {
    let info = dir.join("info.json");
    std::fs::write(&info, &tools.info_json).unwrap();

    let yt_dlp = write_script(
        dir,
        "yt-dlp",
        &format!(
            r#"echo "$@" >> '{log}'
out=""
fmt=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
    -f|--format) fmt="$2"; shift ;;
  esac
  shift
done
if [ -z "$out" ]; then
  cat '{info}'
  exit 0
fi
ext=m4a
[ "$fmt" = 251 ] && ext=webm
target=$(echo "$out" | sed "s/%(ext)s/$ext/")
head -c {size} /dev/zero > "$target"
sleep {delay}
exit 0"#,
            log = dir.join("ytdlp.log").display(),
            info = info.display(),
            size = tools.download_size,
            delay = tools.download_delay,
        ),
    );

    let ffmpeg = write_script(
        dir,
        "ffmpeg",
        &format!(
            r#"echo "$@" >> '{log}'
in=""
last=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift ;;
  esac
  last="$1"
  shift
done
cp "$in" "$last""#,
            log = dir.join("ffmpeg.log").display(),
        ),
    );

    (yt_dlp, ffmpeg)
}

/// A running service plus the router serving it
pub struct TestApp {
    pub service: Arc<MediaService>,
    pub router: Router,
    pub dir: TempDir,
}

impl TestApp {
    /// Service with default fake tools
    pub async fn spawn() -> Self {
        Self::spawn_with(FakeTools::default(), |_| {}).await
    }

    /// Service with customized fake tools and config
    pub async fn spawn_with(tools: FakeTools, adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let (yt_dlp, ffmpeg) = write_fake_tools(dir.path(), &tools);

        let mut config = Config::default();
        config.tools.yt_dlp_path = Some(yt_dlp);
        config.tools.ffmpeg_path = Some(ffmpeg);
        config.tools.search_path = false;
        config.pipeline.workspace_root = dir.path().join("work");
        adjust(&mut config);

        let service = Arc::new(
            MediaService::with_credentials(config, Credentials::none())
                .await
                .unwrap(),
        );
        let router = create_router(service.clone(), service.config().clone());

        Self {
            service,
            router,
            dir,
        }
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Workspace directories still on disk
    pub fn live_workspaces(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("work"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Live workspaces once background removal of dropped ones has settled
    pub async fn settled_workspaces(&self) -> usize {
        for _ in 0..200 {
            if self.live_workspaces() == 0 {
                return 0;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.live_workspaces()
    }

    /// Argument lines the fake ffmpeg recorded
    pub fn ffmpeg_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("ffmpeg.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

pub async fn body_bytes(response: Response) -> axum::body::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
