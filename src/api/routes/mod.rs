//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`media`] - Metadata inspection and audio download
//! - [`progress`] - Task progress queries and the event stream
//! - [`system`] - Liveness, landing page, capabilities, OpenAPI

use serde::{Deserialize, Serialize};

mod media;
mod progress;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use media::*;
pub use progress::*;
pub use system::*;

/// Response header carrying the task identifier of a download
pub const TASK_ID_HEADER: &str = "x-task-id";

// ============================================================================
// Query/Response Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /metadata
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct MetadataQuery {
    /// Media URL to inspect (at most 2048 characters)
    pub url: Option<String>,
}

/// Query parameters for GET /progress
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ProgressQuery {
    /// Task identifier returned in the `X-Task-Id` header or chosen by the caller
    pub task_id: Option<String>,
}

/// Response for GET /ping
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PingResponse {
    /// Always "ok"
    pub status: String,
}
