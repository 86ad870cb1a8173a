//! REST API server module
//!
//! Provides an OpenAPI 3.1 compliant REST API for inspecting media URLs,
//! downloading their audio and following per-task progress.

use crate::{Config, MediaService, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;

/// Path of the OpenAPI document loaded by the Swagger UI
pub const SWAGGER_DOCUMENT_PATH: &str = "/api-docs/openapi.json";
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Media
/// - `GET /metadata?url=` - Normalized metadata and audio formats
/// - `POST /download` - Audio file as an attachment (`X-Task-Id` header)
///
/// ## Progress
/// - `GET /progress?task_id=` - Latest stage of a task
/// - `GET /events` - Server-sent events stream of every stage transition
///
/// ## System
/// - `GET /` - Static landing page
/// - `GET /ping` - Liveness probe
/// - `GET /capabilities` - Tool availability
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled),
///   backed by `GET /api-docs/openapi.json`
pub fn create_router(service: Arc<MediaService>, config: Arc<Config>) -> Router {
    let state = AppState::new(service, config.clone());

    let router = Router::new()
        // Media
        .route("/metadata", get(routes::get_metadata))
        .route("/download", post(routes::download))
        // Progress
        .route("/progress", get(routes::get_progress))
        .route("/events", get(routes::event_stream))
        // System
        .route("/", get(routes::landing))
        .route("/ping", get(routes::ping))
        .route("/capabilities", get(routes::get_capabilities))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state).
    // The UI loads its own copy of the document so it never collides with
    // the plain `/openapi.json` route.
    let router = if config.server.api.swagger_ui {
        router.merge(
            SwaggerUi::new("/swagger-ui").url(SWAGGER_DOCUMENT_PATH, ApiDoc::openapi()),
        )
    } else {
        router
    };

    let router = router.with_state(state);

    // Apply rate limiting middleware if enabled in config
    let router = if config.server.api.rate_limit.enabled {
        let limiter = Arc::new(rate_limit::RateLimiter::new(
            config.server.api.rate_limit.clone(),
        ));
        router.layer(middleware::from_fn_with_state(
            limiter,
            rate_limit::rate_limit_middleware,
        ))
    } else {
        router
    };

    let router = if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin. The `X-Task-Id` header is
/// exposed so browser clients can read it from download responses.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    let layer = if allow_any || origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
    };

    layer
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(routes::TASK_ID_HEADER)])
}

/// Start the API server on the configured bind address.
///
/// Runs until the service shuts down. In-flight requests are allowed to
/// finish; pipelines still running are cancelled by the same shutdown.
///
/// # Example
///
/// ```no_run
/// use audio_dl::{MediaService, Config};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let service = Arc::new(MediaService::new((*config).clone()).await?);
///
/// // Start API server (blocks until shutdown)
/// audio_dl::api::start_api_server(service, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(service: Arc<MediaService>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;
    let shutdown = service.shutdown_token();

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(service, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    // Must use into_make_service_with_connect_info to provide ConnectInfo<SocketAddr>
    // for the rate limiting middleware
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
