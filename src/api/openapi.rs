//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the audio-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the audio-dl REST API
///
/// The document can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "audio-dl REST API",
        version = "0.1.0",
        description = "Inspect media URLs and download their audio tracks, optionally converted to MP3, with per-task progress tracking",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        // Media
        crate::api::routes::get_metadata,
        crate::api::routes::download,

        // Progress
        crate::api::routes::get_progress,
        crate::api::routes::event_stream,

        // System
        crate::api::routes::ping,
        crate::api::routes::landing,
        crate::api::routes::get_capabilities,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::TaskId,
        crate::types::Stage,
        crate::types::ProgressSnapshot,
        crate::types::ProgressEvent,
        crate::types::FormatDescriptor,
        crate::types::MediaMetadata,
        crate::types::DownloadRequest,
        crate::tools::ToolCapabilities,

        // API request/response types from routes
        crate::api::routes::MetadataQuery,
        crate::api::routes::ProgressQuery,
        crate::api::routes::PingResponse,

        // Error types from error.rs
        crate::error::ApiError,
    )),
    tags(
        (name = "media", description = "Media - Inspect metadata and download audio"),
        (name = "progress", description = "Progress - Poll task stages or subscribe to live events"),
        (name = "system", description = "System endpoints - Liveness, landing page, capabilities, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
