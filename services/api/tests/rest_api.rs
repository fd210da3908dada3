//! The HTTP surface, driven through the router without binding a socket.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use study_api_lib::{
    adapters::InMemoryStore,
    config::Config,
    web::{api_router, AppState},
};
use tower::ServiceExt;

fn app() -> Router {
    let mut vars = HashMap::new();
    vars.insert("STORAGE_BACKEND", "memory");
    vars.insert("RECOVERY_BACKOFF_MS", "0");
    let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
    let state = AppState::with_store(Arc::new(config), Arc::new(InMemoryStore::new()));
    api_router(Arc::new(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-id", "alice");
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(app: &Router) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/materials",
        Some(json!({
            "title": "Waves",
            "sections": [
                {"type": "heading", "content": "Waves"},
                {"type": "text", "content": "A wave carries energy."}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["material"].clone()
}

#[tokio::test]
async fn test_create_then_fetch() {
    let app = app();
    let material = create(&app).await;
    assert_eq!(material["version"], 1);
    assert_eq!(material["owner_id"], "alice");

    let id = material["id"].as_str().unwrap();
    let (status, body) = send(&app, "GET", &format!("/materials/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["material"], material);

    let (status, body) = send(&app, "GET", "/materials", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["materials"].as_array().unwrap().len(), 1);
    assert_eq!(body["materials"][0]["section_count"], 2);
}

#[tokio::test]
async fn test_operation_is_applied_and_recorded() {
    let app = app();
    let material = create(&app).await;
    let id = material["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/materials/{}/operations", id),
        Some(json!({
            "operation": {
                "type": "add_section",
                "section": {"type": "equation", "content": "{v = f * lambda}"},
                "position": 2
            },
            "session_id": "lesson-1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["material"]["version"], 2);
    assert_eq!(body["material"]["sections"].as_array().unwrap().len(), 3);
    assert_eq!(body["material"]["metadata"]["formula_count"], 1);

    let (status, body) = send(&app, "GET", &format!("/materials/{}/history", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["operation"]["type"], "add_section");
    assert_eq!(entries[0]["actor_id"], "alice");
    assert_eq!(entries[0]["session_id"], "lesson-1");
    assert_eq!(entries[0]["version_before"], 1);
    assert_eq!(entries[0]["version_after"], 2);
}

#[tokio::test]
async fn test_rejected_operation_reports_validation_issues() {
    let app = app();
    let material = create(&app).await;
    let id = material["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/materials/{}/operations", id),
        Some(json!({
            "operation": {"type": "remove_section", "section_id": "nope"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["validation"]["is_valid"], false);
    assert_eq!(body["validation"]["errors"][0]["code"], "SECTION_NOT_FOUND");

    let (_, body) = send(&app, "GET", &format!("/materials/{}", id), None).await;
    assert_eq!(body["material"]["version"], 1);
}

#[tokio::test]
async fn test_validate_endpoint_is_a_dry_run() {
    let app = app();
    let material = create(&app).await;
    let id = material["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/materials/{}/operations/validate", id),
        Some(json!({
            "operation": {
                "type": "add_section",
                "section": {"type": "equation", "content": "{x + 1"},
                "position": 0
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validation"]["is_valid"], true);
    assert_eq!(body["validation"]["warnings"][0]["code"], "UNBALANCED_BRACES");

    let (_, body) = send(&app, "GET", &format!("/materials/{}", id), None).await;
    assert_eq!(body["material"]["version"], 1);
}

#[tokio::test]
async fn test_unknown_and_deleted_materials_are_not_found() {
    let app = app();
    let (status, body) = send(&app, "GET", "/materials/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "MATERIAL_NOT_FOUND");

    let material = create(&app).await;
    let id = material["id"].as_str().unwrap();
    let (status, _) = send(&app, "DELETE", &format!("/materials/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/materials/{}/history", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_title_is_a_bad_request() {
    let app = app();
    let (status, body) = send(&app, "POST", "/materials", Some(json!({"title": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");
}
