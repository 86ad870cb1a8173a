//! Cookie blob handling at service start-up.
//!
//! These tests mutate process environment variables, so they run serially.

#[cfg(unix)]
mod common;

use audio_dl::{Config, Error, MediaService};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serial_test::serial;

const ENV_VAR: &str = "AUDIO_DL_IT_COOKIES";

fn config_in(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.tools.search_path = false;
    config.pipeline.workspace_root = dir.join("work");
    config.cookies.env_var = ENV_VAR.to_string();
    config.cookies.path = dir.join("secrets").join("cookies.txt");
    config
}

#[tokio::test]
#[serial]
async fn blob_is_materialized_once_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let cookies = "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc\n";
    // SAFETY: serialized with every other env-mutating test in this binary
    unsafe { std::env::set_var(ENV_VAR, format!("  {}\n", STANDARD.encode(cookies))) };

    let config = config_in(dir.path());
    let cookie_path = config.cookies.path.clone();
    let service = MediaService::new(config).await;

    unsafe { std::env::remove_var(ENV_VAR) };

    assert!(service.is_ok(), "{:?}", service.err());
    assert_eq!(std::fs::read_to_string(&cookie_path).unwrap(), cookies);
}

#[tokio::test]
#[serial]
async fn malformed_blob_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    // SAFETY: serialized with every other env-mutating test in this binary
    unsafe { std::env::set_var(ENV_VAR, "not base64 at all!") };

    let result = MediaService::new(config_in(dir.path())).await;

    unsafe { std::env::remove_var(ENV_VAR) };

    assert!(matches!(result, Err(Error::Config { .. })), "{result:?}");
}

#[tokio::test]
#[serial]
async fn missing_blob_means_no_cookie_file() {
    let dir = tempfile::tempdir().unwrap();
    // SAFETY: serialized with every other env-mutating test in this binary
    unsafe { std::env::remove_var(ENV_VAR) };

    let config = config_in(dir.path());
    let cookie_path = config.cookies.path.clone();
    MediaService::new(config).await.unwrap();

    assert!(!cookie_path.exists());
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn cookie_file_is_passed_to_the_extractor() {
    let dir = tempfile::tempdir().unwrap();
    let (yt_dlp, _ffmpeg) = common::write_fake_tools(dir.path(), &common::FakeTools::default());
    // SAFETY: serialized with every other env-mutating test in this binary
    unsafe { std::env::set_var(ENV_VAR, STANDARD.encode("cookie-data")) };

    let mut config = config_in(dir.path());
    config.tools.yt_dlp_path = Some(yt_dlp);
    let cookie_path = config.cookies.path.clone();
    let service = MediaService::new(config).await;

    unsafe { std::env::remove_var(ENV_VAR) };

    let service = service.unwrap();
    service.metadata(common::URL).await.unwrap();

    let log = std::fs::read_to_string(dir.path().join("ytdlp.log")).unwrap();
    assert!(
        log.contains(&format!("--cookies {}", cookie_path.display())),
        "{log}"
    );
}
