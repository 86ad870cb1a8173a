//! System handlers: liveness, landing page, capabilities, OpenAPI.

use super::PingResponse;
use crate::api::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
};

const LANDING_PAGE: &str = include_str!("../../../assets/index.html");

/// GET /ping - Liveness probe
#[utoipa::path(
    get,
    path = "/ping",
    tag = "system",
    responses(
        (status = 200, description = "Service is alive", body = PingResponse)
    )
)]
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok".to_string(),
    })
}

/// GET / - Static landing page
#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses(
        (status = 200, description = "HTML landing page", content_type = "text/html")
    )
)]
pub async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// GET /capabilities - Which external tools are usable
#[utoipa::path(
    get,
    path = "/capabilities",
    tag = "system",
    responses(
        (status = 200, description = "Current tool availability", body = crate::tools::ToolCapabilities)
    )
)]
pub async fn get_capabilities(State(state): State<AppState>) -> impl IntoResponse {
    let capabilities = state.service.capabilities();
    (StatusCode::OK, Json(capabilities))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3.1 specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}
