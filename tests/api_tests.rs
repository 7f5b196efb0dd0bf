use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use taste_curator::{
    api::{create_router, AppState},
    db::{DatasetStore, MemoryDatasetStore},
    models::{DownloadApproval, MediaKind, RecommendationRecord, RecordFilter},
    services::{providers::InMemoryMediaServer, retry::RetryPolicy, Engine, EngineSettings},
};

struct TestApp {
    router: Router,
    store: Arc<MemoryDatasetStore>,
    media: Arc<InMemoryMediaServer>,
}

async fn create_test_app(records: Vec<RecommendationRecord>) -> TestApp {
    let store = Arc::new(MemoryDatasetStore::seeded(records).await.unwrap());
    let media = Arc::new(
        InMemoryMediaServer::new()
            .with_section("1", "Movies", MediaKind::Movie)
            .with_item("1", "101", "603", "The Matrix")
            .with_item("1", "102", "680", "Pulp Fiction"),
    );
    let engine = Engine::new(store.clone(), media.clone(), EngineSettings::default())
        .with_retry_policy(RetryPolicy::immediate(0));
    let state = AppState::new(engine).with_defaults(false, Some(5));

    TestApp {
        router: create_router(state),
        store,
        media,
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
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
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(vec![]).await;
    let (status, body) = send(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = create_test_app(vec![]).await;
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "nightly-7")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "nightly-7");
}

#[tokio::test]
async fn test_targeted_run_builds_collection() {
    let app = create_test_app(vec![]).await;

    let (status, report) = send(
        &app.router,
        "POST",
        "/api/v1/runs",
        Some(json!({
            "userId": "admin",
            "batches": [{
                "libraryId": "1",
                "suggestions": [
                    {"externalId": "603", "title": "The Matrix"},
                    {"externalId": "11", "title": "Star Wars"}
                ]
            }]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["mode"], "targeted");
    assert_eq!(report["status"], "success");
    assert_eq!(report["usersSucceeded"], 1);
    let library = &report["users"][0]["libraries"][0];
    assert_eq!(library["ledger"]["createdActive"], 1);
    assert_eq!(library["ledger"]["createdPending"], 1);
    assert_eq!(library["reconcile"]["created"], true);

    let collection = app
        .media
        .collection("1", "Inspired by your Immaculate Taste")
        .unwrap();
    assert_eq!(collection.items, vec!["101".to_string()]);

    let (status, progress) = send(&app.router, "GET", "/api/v1/runs/progress", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["phase"], "finished");
}

#[tokio::test]
async fn test_batch_without_user_is_rejected() {
    let app = create_test_app(vec![]).await;
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/v1/runs",
        Some(json!({"batches": [{"libraryId": "1", "suggestions": []}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.media.mutations(), 0);
}

#[tokio::test]
async fn test_progress_before_any_run() {
    let app = create_test_app(vec![]).await;
    let (status, _) = send(&app.router, "GET", "/api/v1/runs/progress", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_approvals_update_records() {
    let app = create_test_app(vec![
        RecommendationRecord::new("admin", "1", MediaKind::Movie, "11"),
        RecommendationRecord::new("admin", "1", MediaKind::Movie, "12"),
    ])
    .await;

    let (status, summary) = send(
        &app.router,
        "POST",
        "/api/v1/approvals",
        Some(json!({
            "userId": "admin",
            "mediaKind": "movie",
            "actions": [
                {"libraryId": "1", "externalId": "11", "action": "approve"},
                {"libraryId": "1", "externalId": "12", "action": "reject", "reason": "seen it"},
                {"libraryId": "1", "externalId": "13", "action": "approve"},
                {"libraryId": "1", "externalId": "11", "action": "shrug"}
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["approved"], 1);
    assert_eq!(summary["rejected"], 1);
    assert_eq!(summary["missing"], 1);
    assert_eq!(summary["ignored"], 1);

    let records = app
        .store
        .find_records(&RecordFilter::scope("admin", "1").with_ids(vec!["11".to_string()]))
        .await
        .unwrap();
    assert_eq!(records[0].download_approval, DownloadApproval::Approved);
    let rejections = app.store.find_rejections("admin", MediaKind::Movie).await.unwrap();
    assert_eq!(rejections.len(), 1);
}

#[tokio::test]
async fn test_reset_unknown_library_is_not_found() {
    let app = create_test_app(vec![]).await;
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/v1/reset",
        Some(json!({"libraryId": "9"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_clears_library() {
    let app = create_test_app(vec![RecommendationRecord::new(
        "admin",
        "1",
        MediaKind::Movie,
        "603",
    )])
    .await;
    app.media
        .seed_collection("1", "Inspired by your Immaculate Taste", &["101"]);

    let (status, summary) = send(
        &app.router,
        "POST",
        "/api/v1/reset",
        Some(json!({"libraryId": "1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["recordsDeleted"], 1);
    assert_eq!(summary["collectionsDeleted"], 1);
    assert_eq!(summary["markerWritten"], true);
    assert_eq!(app.store.count_records(&RecordFilter::default()).await.unwrap(), 0);
}
