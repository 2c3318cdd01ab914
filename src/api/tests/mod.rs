use super::*;
use crate::Config;
use crate::manager::test_helpers::create_test_manager_with;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tower::ServiceExt; // for oneshot()


const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:tv="https://showrss.info">
    <channel>
        <title>showRSS: feed</title>
        <link>http://showrss.info</link>
        <description>test feed</description>
        <item>
            <title>Show Name S02E05 720p</title>
            <link>magnet:?xt=urn:btih:ABC123&amp;dn=Show</link>
            <pubDate>Tue, 14 Nov 2023 22:13:20 +0000</pubDate>
            <tv:show_name>Show Name</tv:show_name>
            <tv:info_hash>ABC123</tv:info_hash>
        </item>
        <item>
            <title>Other.Show.1x03.HDTV</title>
            <link>magnet:?xt=urn:btih:DEF456&amp;dn=Other</link>
        </item>
    </channel>
</rss>"#;

/// Write the fixture feed into `dir` and return its `file://` locator
fn write_feed(dir: &Path) -> String {
    let file = dir.join("feed.xml");
    std::fs::write(&file, FEED).unwrap();
    url::Url::from_file_path(&file).unwrap().to_string()
}

/// Manager with default configuration and both fixture episodes stored
async fn create_seeded_manager() -> (EpisodeManager, tempfile::TempDir) {
    let (manager, temp_dir) = create_test_manager_with(Config::default()).await;
    let uri = write_feed(temp_dir.path());
    manager.check_feed(&uri, None).await.unwrap();
    (manager, temp_dir)
}

/// Send one request through a fresh router, returning status and JSON body
async fn send(
    manager: &EpisodeManager,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let app = create_router(manager.clone());

    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_api_server_stops_on_cancel() {
    let mut config = Config::default();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let (manager, _temp_dir) = create_test_manager_with(config).await;

    let shutdown = CancellationToken::new();
    let api_handle = tokio::spawn(start_api_server(manager, shutdown.clone()));

    // Give it a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .expect("server should stop after cancellation")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_api_server_reports_bind_failure() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = Config::default();
    config.api.bind_address = blocker.local_addr().unwrap();
    let (manager, _temp_dir) = create_test_manager_with(config).await;

    let result = start_api_server(manager, CancellationToken::new()).await;
    assert!(matches!(result, Err(crate::Error::Io(_))));
}

#[tokio::test]
async fn test_cors_enabled() {
    let (manager, _temp_dir) = create_test_manager_with(Config::default()).await;
    let app = create_router(manager);

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/health")
        .header("Origin", "http://example.com")
        .header("Access-Control-Request-Method", "GET")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_cors_restricted_origins() {
    let mut config = Config::default();
    config.api.cors_origins = vec!["http://allowed.example".to_string()];
    let (manager, _temp_dir) = create_test_manager_with(config).await;

    let preflight = |origin: &str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/episodes")
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "GET")
            .body(Body::empty())
            .unwrap()
    };

    let allowed = create_router(manager.clone())
        .oneshot(preflight("http://allowed.example"))
        .await
        .unwrap();
    assert_eq!(
        allowed
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://allowed.example")
    );

    let denied = create_router(manager)
        .oneshot(preflight("http://other.example"))
        .await
        .unwrap();
    assert!(denied.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_cors_disabled() {
    let mut config = Config::default();
    config.api.cors_enabled = false;
    let (manager, _temp_dir) = create_test_manager_with(config).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://example.com")
        .body(Body::empty())
        .unwrap();

    let response = create_router(manager).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get("access-control-allow-origin")
            .is_none()
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (manager, _temp_dir) = create_test_manager_with(Config::default()).await;
    let (status, _) = send(&manager, "GET", "/downloads", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
