//! Media handlers: metadata inspection and audio download.

use super::{MetadataQuery, TASK_ID_HEADER};
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{DownloadRequest, MediaMetadata};
use axum::{
    Json,
    body::Body,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::Response,
};

/// GET /metadata - Inspect a media URL
#[utoipa::path(
    get,
    path = "/metadata",
    tag = "media",
    params(("url" = String, Query, description = "Media URL to inspect")),
    responses(
        (status = 200, description = "Normalized metadata", body = MediaMetadata),
        (status = 400, description = "Missing, oversized or unsupported URL, or the resource cannot be inspected", body = crate::error::ApiError),
        (status = 503, description = "yt-dlp is not available", body = crate::error::ApiError)
    )
)]
pub async fn get_metadata(
    State(state): State<AppState>,
    Query(query): Query<MetadataQuery>,
) -> Result<Json<MediaMetadata>> {
    let url = query.url.unwrap_or_default();
    let metadata = state.service.metadata(&url).await?;
    Ok(Json(metadata))
}

/// POST /download - Download one variant as an attachment
///
/// The whole acquisition (and conversion, when requested) finishes before the
/// response head is sent, so every pipeline failure becomes an error status.
/// The body is then streamed in fixed-size chunks.
#[utoipa::path(
    post,
    path = "/download",
    tag = "media",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Audio file stream with Content-Disposition and X-Task-Id headers", content_type = "application/octet-stream"),
        (status = 400, description = "Missing fields, oversized or unsupported URL, or the resource cannot be inspected", body = crate::error::ApiError),
        (status = 413, description = "Downloaded file exceeds the size limit", body = crate::error::ApiError),
        (status = 502, description = "yt-dlp or ffmpeg failed", body = crate::error::ApiError),
        (status = 503, description = "A required tool is not available", body = crate::error::ApiError),
        (status = 504, description = "A tool exceeded its time budget", body = crate::error::ApiError)
    )
)]
pub async fn download(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|e| Error::Validation(e.body_text()))?;

    let download = state.service.download(request).await?;

    let headers = download.headers.clone();

    tracing::info!(
        task_id = %download.task_id,
        filename = %download.filename,
        size = download.size,
        "streaming download"
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.content_type)
        .header(header::CONTENT_LENGTH, download.size)
        .header(header::CONTENT_DISPOSITION, headers.content_disposition)
        .header(TASK_ID_HEADER, headers.task_id)
        .body(Body::from_stream(download.into_stream()))
        .map_err(|e| Error::Other(format!("failed to build response: {e}")))?;

    Ok(response)
}
