//! REST API server demo
//!
//! Runs audio-dl with the REST API enabled. `yt-dlp` and `ffmpeg` are looked
//! up on `PATH`.
//!
//! After starting, you can:
//! - Open the landing page at http://localhost:8000/
//! - View Swagger UI at http://localhost:8000/swagger-ui
//! - Inspect a video via GET http://localhost:8000/metadata?url=...
//! - Download audio via POST http://localhost:8000/download
//! - Follow progress via GET http://localhost:8000/progress?task_id=... or /events
//!
//! Set `AUDIO_DL_BIND` to listen elsewhere, `YTDLP_COOKIES_B64` to pass a
//! base64-encoded cookie file to yt-dlp, and `RUST_LOG` to tune logging.

use audio_dl::config::{ApiConfig, Config, ServerIntegrationConfig};
use audio_dl::{MediaService, run_with_shutdown};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("audio_dl=info,tower_http=info")),
        )
        .init();

    let bind_address: SocketAddr = std::env::var("AUDIO_DL_BIND")
        .ok()
        .map(|addr| addr.parse())
        .transpose()?
        .unwrap_or_else(|| ApiConfig::default().bind_address);

    let config = Config {
        server: ServerIntegrationConfig {
            api: ApiConfig {
                bind_address,
                ..Default::default()
            },
        },
        ..Default::default()
    };

    let service = Arc::new(MediaService::new(config).await?);
    let capabilities = service.capabilities();

    println!("audio-dl REST API on http://{bind_address}");
    println!("  yt-dlp available: {}", capabilities.yt_dlp);
    println!("  ffmpeg available: {}", capabilities.ffmpeg);
    println!();
    println!("Example commands:");
    println!("  curl 'http://{bind_address}/metadata?url=https://youtu.be/dQw4w9WgXcQ'");
    println!("  curl -OJ -X POST http://{bind_address}/download \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!(
        "    -d '{{\"url\": \"https://youtu.be/dQw4w9WgXcQ\", \"format_id\": \"140\", \"convert_to_mp3\": true}}'"
    );
    println!("  curl -N http://{bind_address}/events");

    let server = service.spawn_api_server();

    // Ctrl+C / SIGTERM cancels in-flight runs and stops the listener
    run_with_shutdown(&service).await?;
    server.await??;

    Ok(())
}
