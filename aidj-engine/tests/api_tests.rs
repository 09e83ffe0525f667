//! HTTP API tests
//!
//! Exercise the router with `tower::ServiceExt::oneshot`, no socket needed.

mod helpers;

use aidj_engine::api::{create_router, AppContext};
use aidj_engine::DjSession;
use axum::body::Body;
use axum::Router;
use helpers::{catalog, test_config, Mocks, ScriptedVision};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> (Router, Arc<DjSession>, Mocks) {
    let mocks = Mocks::new(ScriptedVision::new(Vec::new(), Duration::from_millis(50)));
    let session = Arc::new(DjSession::new(
        test_config(),
        mocks.collaborators(),
        catalog(),
    ));
    let router = create_router(AppContext {
        session: Arc::clone(&session),
        port: 5790,
    });
    (router, session, mocks)
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (router, _session, _mocks) = app();
    let (status, body) = call(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "aidj-engine");
    assert_eq!(body["port"], 5790);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (router, session, _mocks) = app();

    let (status, _) = call(&router, "POST", "/session/start", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&router, "POST", "/session/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["status"].as_str().unwrap().starts_with("error"));

    let (status, body) = call(&router, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);
    assert_eq!(body["transition_state"], "Idle");
    assert_eq!(body["catalog_size"], 7);

    let (status, _) = call(&router, "POST", "/session/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_announce_validation() {
    let (router, session, _mocks) = app();
    session.start().await.unwrap();

    let (status, body) = call(
        &router,
        "POST",
        "/announcements",
        Some(json!({"text": "Welcome to the party", "priority": "high"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    assert!(body["announcement_id"].is_string());

    let (status, _) = call(
        &router,
        "POST",
        "/announcements",
        Some(json!({"text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    session.stop().await;
    let (status, _) = call(
        &router,
        "POST",
        "/announcements",
        Some(json!({"text": "too late"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_play_endpoint() {
    let (router, session, _mocks) = app();

    let (status, _) = call(&router, "POST", "/playback/play", Some(json!({"track_id": "pop1"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    session.start().await.unwrap();
    let (status, _) = call(&router, "POST", "/playback/play", Some(json!({"track_id": "nope"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&router, "POST", "/playback/play", Some(json!({"track_id": "pop1"}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["track"]["id"], "pop1");
    session.stop().await;
}

#[tokio::test]
async fn test_catalog_search() {
    let (router, _session, _mocks) = app();
    let (status, body) = call(&router, "GET", "/catalog/search?q=ex", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert_eq!(ids.len(), 4);
    assert!(ids.iter().all(|id| id.starts_with("ex")));
}

#[tokio::test]
async fn test_mood_endpoints() {
    let (router, _session, _mocks) = app();
    let (status, body) = call(&router, "GET", "/mood", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sampling_enabled"], true);
    assert!(body["sample"].is_null());

    let (status, _) = call(&router, "POST", "/mood/sample", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}
