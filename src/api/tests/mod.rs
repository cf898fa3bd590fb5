use super::*;
use crate::downloader::test_helpers::ScriptedAdapter;
use crate::error::ApiError;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;


/// Helper to create a test MediaDownloader instance wrapped in Arc
async fn create_test_downloader() -> (Arc<MediaDownloader>, tempfile::TempDir) {
    create_test_downloader_with(ScriptedAdapter::succeeding("Clip")).await
}

async fn create_test_downloader_with(
    adapter: ScriptedAdapter,
) -> (Arc<MediaDownloader>, tempfile::TempDir) {
    let (downloader, temp_dir) =
        crate::downloader::test_helpers::create_test_downloader(Arc::new(adapter)).await;
    (Arc::new(downloader), temp_dir)
}

fn test_router(downloader: &Arc<MediaDownloader>) -> Router {
    let config = downloader.get_config();
    create_router(downloader.clone(), config)
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn error_code(response: axum::response::Response) -> String {
    body_json::<ApiError>(response).await.error.code
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    // Port 0 = OS assigns a free port
    let mut config = (*downloader.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let downloader = downloader.clone();
        async move { start_api_server(downloader, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be running");
    api_handle.abort();
}

#[tokio::test]
async fn test_health_endpoint() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = test_router(&downloader);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["adapter"], "scripted");
}

#[tokio::test]
async fn test_cors_enabled() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_openapi_endpoint() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = test_router(&downloader);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = body_json(response).await;
    assert!(json["paths"]["/api/v1/jobs"].is_object());
}

#[tokio::test]
async fn test_sse_event_stream() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = test_router(&downloader);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/events")
                .header("Accept", "text/event-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(
        content_type.contains("text/event-stream"),
        "Content-Type should be text/event-stream, got: {}",
        content_type
    );

    // Read the first frame after emitting an event
    downloader.emit_event(crate::types::Event::Shutdown);
    let mut body = response.into_body().into_data_stream();
    let frame = tokio::time::timeout(Duration::from_secs(1), async {
        use tokio_stream::StreamExt;
        body.next().await
    })
    .await
    .unwrap()
    .unwrap()
    .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: shutdown"), "got frame: {text}");
}

#[test]
fn test_event_names_are_snake_case() {
    use crate::types::{Event, JobId, Status};

    assert_eq!(
        routes::event_name(&Event::JobCreated {
            id: JobId(1),
            url: "https://example.com".into()
        }),
        "job_created"
    );
    assert_eq!(
        routes::event_name(&Event::Progress {
            id: JobId(1),
            status: Status::Downloading,
            progress: 10,
            message: None,
        }),
        "progress"
    );
    assert_eq!(routes::event_name(&Event::Shutdown), "shutdown");
}
