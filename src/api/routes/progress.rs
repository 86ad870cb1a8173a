//! Progress handlers: per-task polling and the live event stream.

use super::ProgressQuery;
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{ProgressSnapshot, TaskId};
use axum::{
    Json,
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// GET /progress - Latest stage of a task
#[utoipa::path(
    get,
    path = "/progress",
    tag = "progress",
    params(("task_id" = String, Query, description = "Task identifier from the X-Task-Id header")),
    responses(
        (status = 200, description = "Latest progress snapshot", body = ProgressSnapshot),
        (status = 400, description = "task_id is missing", body = crate::error::ApiError),
        (status = 404, description = "Unknown task", body = crate::error::ApiError)
    )
)]
pub async fn get_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<ProgressSnapshot>> {
    let task_id = query
        .task_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Validation("task_id is required.".into()))?;

    let snapshot = state.service.task_progress(&TaskId::from(task_id))?;
    Ok(Json(snapshot))
}

/// GET /events - Server-sent progress events
///
/// Every stage transition of every task is pushed as an event named after the
/// stage, with the JSON-encoded [`ProgressEvent`](crate::types::ProgressEvent)
/// as data.
#[utoipa::path(
    get,
    path = "/events",
    tag = "progress",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let receiver = state.service.subscribe();
    let stream = BroadcastStream::new(receiver);

    let sse_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok(SseEvent::default()
                .event(event.stage.as_str())
                .data(json_data))),
            Err(e) => {
                tracing::warn!("Failed to serialize event to JSON: {}", e);
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!("SSE client lagged, skipped {} events", skipped);
            Some(Ok(SseEvent::default().event("error").data(format!(
                r#"{{"error":"lagged","skipped":{}}}"#,
                skipped
            ))))
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}
