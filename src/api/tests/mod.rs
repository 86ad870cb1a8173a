use super::*;
use crate::credentials::Credentials;
use crate::pipeline::test_helpers::test_config;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceExt;


/// A service with no usable tools; enough for every route that never spawns one
async fn create_test_service() -> (Arc<MediaService>, tempfile::TempDir) {
    create_test_service_with(|_| {}).await
}

async fn create_test_service_with(
    adjust: impl FnOnce(&mut Config),
) -> (Arc<MediaService>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path(), None, None);
    adjust(&mut config);
    let service = MediaService::with_credentials(config, Credentials::none())
        .await
        .unwrap();
    (Arc::new(service), temp_dir)
}

/// Router for a service, using the service's own configuration
fn router_for(service: &Arc<MediaService>) -> Router {
    create_router(service.clone(), service.config().clone())
}

async fn get_request(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
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

async fn body_bytes(response: Response) -> axum::body::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_api_server_stops_on_shutdown() {
    let (service, _temp_dir) = create_test_service().await;

    // Port 0 = OS assigns a free port
    let mut config = (**service.config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let service = service.clone();
        let config = config.clone();
        async move { start_api_server(service, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    service.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .expect("server should stop after shutdown")
        .unwrap();
    assert!(result.is_ok(), "server returned {result:?}");
}

#[tokio::test]
async fn test_spawn_api_server_method() {
    let (service, _temp_dir) = create_test_service_with(|config| {
        config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    })
    .await;

    let api_handle = service.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;
    service.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .expect("server should stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (service, _temp_dir) = create_test_service_with(|config| {
        config.server.api.cors_enabled = true;
        config.server.api.cors_origins = vec!["*".to_string()];
    })
    .await;
    let app = router_for(&service);

    let request = Request::builder()
        .uri("/ping")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(
        headers.contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
    let exposed = headers
        .get("access-control-expose-headers")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(exposed.contains("x-task-id"), "got {exposed:?}");
}

#[tokio::test]
async fn test_cors_disabled() {
    let (service, _temp_dir) = create_test_service_with(|config| {
        config.server.api.cors_enabled = false;
    })
    .await;
    let app = router_for(&service);

    let request = Request::builder()
        .uri("/ping")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_openapi_json_endpoint() {
    let (service, _temp_dir) = create_test_service().await;

    let response = get_request(router_for(&service), "/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let spec = body_json(response).await;
    assert!(spec["openapi"].as_str().unwrap().starts_with("3."));
    assert_eq!(spec["info"]["title"], "audio-dl REST API");
    for path in ["/metadata", "/download", "/progress", "/ping"] {
        assert!(spec["paths"][path].is_object(), "missing {path}");
    }
    assert!(spec["paths"]["/download"]["post"].is_object());
}

#[tokio::test]
async fn test_swagger_ui_enabled() {
    let (service, _temp_dir) = create_test_service_with(|config| {
        config.server.api.swagger_ui = true;
    })
    .await;

    let response = get_request(router_for(&service), "/swagger-ui/").await;
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Swagger UI should be accessible when enabled"
    );

    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(
        body.contains("<!DOCTYPE html>") || body.contains("<html"),
        "Response should contain HTML"
    );
    assert!(body.contains("swagger") || body.contains("Swagger"));
}

#[tokio::test]
async fn test_swagger_ui_disabled() {
    let (service, _temp_dir) = create_test_service_with(|config| {
        config.server.api.swagger_ui = false;
    })
    .await;

    let response = get_request(router_for(&service), "/swagger-ui/").await;
    assert_eq!(
        response.status(),
        StatusCode::NOT_FOUND,
        "Swagger UI should not be accessible when disabled"
    );
}

#[tokio::test]
async fn test_default_config_router_serves_docs_and_routes() {
    let (service, _temp_dir) = create_test_service().await;
    let config = Arc::new(Config::default());
    assert!(config.server.api.swagger_ui);

    let app = create_router(service, config);

    for path in ["/ping", "/openapi.json", SWAGGER_DOCUMENT_PATH, "/swagger-ui/"] {
        let response = get_request(app.clone(), path).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
    }

    let plain = body_json(get_request(app.clone(), "/openapi.json").await).await;
    let swagger = body_json(get_request(app, SWAGGER_DOCUMENT_PATH).await).await;
    assert_eq!(plain, swagger);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (service, _temp_dir) = create_test_service().await;

    let response = get_request(router_for(&service), "/queue").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limiting_returns_429_when_exceeded() {
    let (service, _temp_dir) = create_test_service_with(|config| {
        config.server.api.rate_limit = crate::config::RateLimitConfig {
            enabled: true,
            requests_per_second: 1,
            burst_size: 3,
            routes: vec![],
            exempt_paths: vec!["/ping".to_string()],
            exempt_ips: vec![],
        };
    })
    .await;
    let app = router_for(&service);
    let client: SocketAddr = "192.0.2.10:50000".parse().unwrap();

    let request = |uri: &str| {
        let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        request.extensions_mut().insert(ConnectInfo(client));
        request
    };

    for _ in 0..3 {
        let response = app.clone().oneshot(request("/capabilities")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(request("/capabilities")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("Retry-After header");
    assert!(retry_after >= 1);

    let body = body_json(response).await;
    assert_eq!(body["code"], "rate_limited");
    assert_eq!(body["error"], "Too many requests");
    assert_eq!(body["retry_after_seconds"], retry_after);

    // Exempt paths keep working
    let response = app.clone().oneshot(request("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_download_route_has_its_own_limit() {
    let (service, _temp_dir) = create_test_service_with(|config| {
        config.server.api.rate_limit.enabled = true;
        config.server.api.rate_limit.routes = vec![crate::config::RouteLimit {
            path: "/download".to_string(),
            requests: 1,
            period: Duration::from_secs(60),
        }];
    })
    .await;
    let app = router_for(&service);
    let client: SocketAddr = "192.0.2.11:50000".parse().unwrap();

    let request = || {
        let mut request = Request::builder()
            .method("POST")
            .uri("/download")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(client));
        request
    };

    // The first request reaches the handler and fails validation
    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
