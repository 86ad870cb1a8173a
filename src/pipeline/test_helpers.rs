//! Shared test helpers: fake tool executables and service construction.
//!
//! The fakes are small shell scripts that honour the same argument contract as
//! the real tools, so the pipeline code under test is exactly the production
//! code path.

use crate::config::Config;
use crate::credentials::Credentials;
use crate::pipeline::MediaService;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Metadata document the fake extractor prints
pub(crate) const SAMPLE_INFO_JSON: &str = r#"{
  "id": "dQw4w9WgXcQ",
  "title": "Rick Astley - Never Gonna Give You Up (Official Video)",
  "uploader": "Rick Astley",
  "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
  "language": "en",
  "duration": 213,
  "formats": [
    {"format_id": "139", "ext": "m4a", "acodec": "mp4a.40.5", "vcodec": "none", "abr": 48.8, "filesize": 1300000},
    {"format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2", "vcodec": "none", "abr": 129.5, "language": "en"},
    {"format_id": "251", "ext": "webm", "acodec": "opus", "vcodec": "none", "abr": 135.2},
    {"format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2", "vcodec": "none", "abr": 129.5},
    {"format_id": "18", "ext": "mp4", "acodec": "mp4a.40.2", "vcodec": "avc1.42001E", "tbr": 501.2, "filesize_approx": 13000000},
    {"ext": "mhtml", "acodec": "none", "vcodec": "none"}
  ]
}"#;

/// How the fake yt-dlp behaves when asked to download
#[derive(Clone, Debug)]
pub(crate) enum FakeDownload {
    /// Write `raw_audio.<ext>` of `size` bytes and exit 0
    File { ext: &'static str, size: u64 },
    /// Leave a partial file, print `stderr`, exit with `code`
    Fail { code: i32, stderr: &'static str },
    /// Exit 0 without producing anything
    NoOutput,
    /// Exit 0 leaving only a `.part` file
    PartialOnly,
    /// Sleep far longer than any test timeout
    Hang,
}

/// How the fake yt-dlp behaves when asked for metadata
#[derive(Clone, Debug)]
pub(crate) enum FakeInspect {
    /// Print `SAMPLE_INFO_JSON`
    Sample,
    /// Print the given document
    Json(&'static str),
    /// Print `stderr` and exit 1
    Fail(&'static str),
}

/// How the fake ffmpeg behaves
#[derive(Clone, Copy, Debug)]
pub(crate) enum FakeTranscode {
    /// Copy input to output
    Convert,
    /// Write a partial output, then fail
    Fail,
    /// Sleep far longer than any test timeout
    Hang,
}

/// Write an executable shell script and return its path
#[cfg(unix)]
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Write a fake yt-dlp into `dir`
///
/// Every invocation appends its arguments (one line per call) to `args.log`.
#[cfg(unix)]
pub(crate) fn write_fake_ytdlp(dir: &Path, inspect: FakeInspect, download: FakeDownload) -> PathBuf {
    let log = dir.join("args.log");
    let info_path = dir.join("info.json");

    let inspect_body = match inspect {
        FakeInspect::Sample => {
            std::fs::write(&info_path, SAMPLE_INFO_JSON).unwrap();
            format!("cat '{}'\n  exit 0", info_path.display())
        }
        FakeInspect::Json(doc) => {
            std::fs::write(&info_path, doc).unwrap();
            format!("cat '{}'\n  exit 0", info_path.display())
        }
        FakeInspect::Fail(stderr) => format!("echo '{stderr}' >&2\n  exit 1"),
    };

    let download_body = match download {
        FakeDownload::File { ext, size } => format!(
            "target=$(echo \"$out\" | sed 's/%(ext)s/{ext}/')\n  head -c {size} /dev/zero > \"$target\"\n  exit 0"
        ),
        FakeDownload::Fail { code, stderr } => format!(
            "target=$(echo \"$out\" | sed 's/%(ext)s/webm/')\n  echo partial > \"$target.part\"\n  echo partial > \"$target\"\n  echo '{stderr}' >&2\n  exit {code}"
        ),
        FakeDownload::NoOutput => "exit 0".to_string(),
        FakeDownload::PartialOnly => {
            "target=$(echo \"$out\" | sed 's/%(ext)s/webm/')\n  echo partial > \"$target.part\"\n  exit 0"
                .to_string()
        }
        FakeDownload::Hang => "sleep 30\n  exit 0".to_string(),
    };

    let body = format!(
        r#"echo "$@" >> '{log}'
mode=inspect
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; mode=download; shift ;;
  esac
  shift
done
if [ "$mode" = inspect ]; then
  {inspect_body}
fi
if [ "$mode" = download ]; then
  {download_body}
fi"#,
        log = log.display(),
    );

    write_script(dir, "yt-dlp", &body)
}

/// Write a fake ffmpeg into `dir`
#[cfg(unix)]
pub(crate) fn write_fake_ffmpeg(dir: &Path, behaviour: FakeTranscode) -> PathBuf {
    let action = match behaviour {
        FakeTranscode::Convert => "cp \"$in\" \"$last\"\nexit 0",
        FakeTranscode::Fail => {
            "echo partial > \"$last\"\necho 'Invalid data found when processing input' >&2\nexit 1"
        }
        FakeTranscode::Hang => "sleep 30\nexit 0",
    };

    let body = format!(
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
{action}"#,
        log = dir.join("ffmpeg.log").display(),
    );

    write_script(dir, "ffmpeg", &body)
}

/// Config pointing at the given tools with workspaces under `root/work`
pub(crate) fn test_config(root: &Path, yt_dlp: Option<PathBuf>, ffmpeg: Option<PathBuf>) -> Config {
    let mut config = Config::default();
    config.tools.yt_dlp_path = yt_dlp;
    config.tools.ffmpeg_path = ffmpeg;
    config.tools.search_path = false;
    config.pipeline.workspace_root = root.join("work");
    config.pipeline.max_file_size = 4096;
    config.pipeline.chunk_size = 1000;
    config.cookies.env_var = "AUDIO_DL_TEST_COOKIES_NEVER_SET".to_string();
    config.cookies.path = root.join("cookies.txt");
    config
}

/// A service wired to fake tools, plus the tempdir that keeps them alive
pub(crate) struct FakeSetup {
    pub(crate) service: MediaService,
    pub(crate) dir: TempDir,
}

impl FakeSetup {
    /// Directory workspaces are created in
    pub(crate) fn work_root(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Number of workspace directories still on disk
    pub(crate) fn live_workspaces(&self) -> usize {
        match std::fs::read_dir(self.work_root()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    /// Live workspaces once background removal of dropped ones has settled
    pub(crate) async fn settled_workspaces(&self) -> usize {
        for _ in 0..200 {
            if self.live_workspaces() == 0 {
                return 0;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.live_workspaces()
    }

    /// Argument lines recorded by the fake yt-dlp
    pub(crate) fn ytdlp_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("args.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Argument lines recorded by the fake ffmpeg
    pub(crate) fn ffmpeg_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("ffmpeg.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Build a service around fake tools
#[cfg(unix)]
pub(crate) async fn fake_service(
    inspect: FakeInspect,
    download: FakeDownload,
    transcode: Option<FakeTranscode>,
) -> FakeSetup {
    fake_service_with(inspect, download, transcode, |_| {}).await
}

/// Build a service around fake tools, adjusting the config first
#[cfg(unix)]
pub(crate) async fn fake_service_with(
    inspect: FakeInspect,
    download: FakeDownload,
    transcode: Option<FakeTranscode>,
    adjust: impl FnOnce(&mut Config),
) -> FakeSetup {
    let dir = tempfile::tempdir().unwrap();
    let yt_dlp = write_fake_ytdlp(dir.path(), inspect, download);
    let ffmpeg = transcode.map(|t| write_fake_ffmpeg(dir.path(), t));

    let mut config = test_config(dir.path(), Some(yt_dlp), ffmpeg);
    adjust(&mut config);

    let service = MediaService::with_credentials(config, Credentials::none())
        .await
        .unwrap();

    FakeSetup { service, dir }
}
