//! End-to-end tests of the paste API surface through the router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use pastegate_server::app;
use pastegate_server::config::Config;
use pastegate_server::store::PasteStore;

fn test_app(count_on_fetch: bool) -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(PasteStore::open(dir.path()).unwrap());
    let config = Arc::new(Config {
        db_path: dir.path().display().to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        count_on_fetch,
        reap_interval: Duration::from_secs(300),
    });
    (dir, app(store, config))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn view_request(id: &str, forwarded_for: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/pastes/{}/view", id))
        .header("x-forwarded-for", forwarded_for)
        .body(Body::empty())
        .unwrap()
}

async fn create(app: &Router, body: Value) -> Value {
    let (status, body) = send(app, json_request("POST", "/api/pastes", &body)).await;
    assert_eq!(status, StatusCode::OK, "create failed: {}", body);
    assert_eq!(body["success"], true);
    body["data"].clone()
}

#[tokio::test]
async fn create_and_fetch_round_trip() {
    let (_dir, app) = test_app(false);

    let created = create(&app, json!({ "content": "print('hi')" })).await;
    let id = created["id"].as_str().unwrap();
    assert_eq!(id.len(), 5);
    assert_eq!(created["language"], "python");
    assert_eq!(created["visibility"], true);
    assert_eq!(created["views"], 0);

    let (status, body) = send(&app, get(&format!("/api/pastes/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "print('hi')");
    assert_eq!(body["data"]["id"], id);
}

#[tokio::test]
async fn create_rejects_empty_content() {
    let (_dir, app) = test_app(false);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/pastes", &json!({ "content": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation error");
    assert!(body["details"].as_array().is_some());
}

#[tokio::test]
async fn password_protected_flow() {
    let (_dir, app) = test_app(false);

    let created = create(
        &app,
        json!({
            "content": "classified",
            "protection": true,
            "password": "secret"
        }),
    )
    .await;
    let id = created["id"].as_str().unwrap();
    // The stored credential never leaves the server.
    assert!(created["password"].is_null());

    let (status, body) = send(&app, get(&format!("/api/pastes/{}", id))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["requiresPassword"], true);
    assert!(body.get("data").is_none());

    // A wrong credential is indistinguishable from a missing one.
    let (status, wrong) = send(&app, get(&format!("/api/pastes/{}?password=wrong", id))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, body);

    let (status, body) = send(&app, get(&format!("/api/pastes/{}?password=secret", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "classified");
    assert!(body["data"]["password"].is_null());
}

#[tokio::test]
async fn expired_pastes_are_indistinguishable_from_missing_ones() {
    let (_dir, app) = test_app(false);

    let expires = (Utc::now() - ChronoDuration::hours(1)).to_rfc3339();
    let created = create(
        &app,
        json!({ "content": "stale", "expiresAt": expires }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, expired_body) = send(&app, get(&format!("/api/pastes/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, missing_body) = send(&app, get("/api/pastes/zZzZ9")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(expired_body, missing_body);

    // The view endpoint conflates them the same way.
    let (status, _) = send(&app, view_request(id, "1.1.1.1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn view_counting_dedups_by_viewer() {
    let (_dir, app) = test_app(false);

    let created = create(&app, json!({ "content": "popular" })).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(&app, view_request(id, "1.1.1.1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["views"], 1);

    // Repeat from the same viewer: idempotent.
    let (_, body) = send(&app, view_request(id, "1.1.1.1")).await;
    assert_eq!(body["views"], 1);

    let (_, body) = send(&app, view_request(id, "2.2.2.2")).await;
    assert_eq!(body["views"], 2);

    let (_, body) = send(&app, get(&format!("/api/pastes/{}", id))).await;
    assert_eq!(body["data"]["views"], 2);
}

#[tokio::test]
async fn fetch_does_not_count_views_by_default() {
    let (_dir, app) = test_app(false);

    let created = create(&app, json!({ "content": "quiet" })).await;
    let id = created["id"].as_str().unwrap();

    for _ in 0..3 {
        let (status, _) = send(&app, get(&format!("/api/pastes/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&app, get(&format!("/api/pastes/{}", id))).await;
    assert_eq!(body["data"]["views"], 0);
}

#[tokio::test]
async fn pagination_yields_each_paste_exactly_once() {
    let (_dir, app) = test_app(false);

    let mut ids = std::collections::HashSet::new();
    for i in 0..7 {
        let created = create(&app, json!({ "content": format!("paste number {}", i) })).await;
        ids.insert(created["id"].as_str().unwrap().to_owned());
    }

    let mut seen = std::collections::HashSet::new();
    for page in 1..=3 {
        let (status, body) =
            send(&app, get(&format!("/api/pastes?page={}&limit=3", page))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 7);
        assert_eq!(body["pagination"]["pages"], 3);
        for item in body["data"].as_array().unwrap() {
            assert!(seen.insert(item["id"].as_str().unwrap().to_owned()));
        }
    }
    assert_eq!(seen, ids);
}

#[tokio::test]
async fn private_pastes_are_owner_scoped() {
    let (_dir, app) = test_app(false);

    create(
        &app,
        json!({ "content": "mine", "visibility": false, "ownerId": "user-1" }),
    )
    .await;
    create(&app, json!({ "content": "everyone's" })).await;

    let (_, body) = send(&app, get("/api/pastes")).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["content"], "everyone's");

    let (_, body) = send(&app, get("/api/pastes?userId=user-1")).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["content"], "mine");
}

#[tokio::test]
async fn list_filters_by_search_and_language() {
    let (_dir, app) = test_app(false);

    create(
        &app,
        json!({ "content": "def main(): pass", "language": "python", "title": "Snake" }),
    )
    .await;
    create(
        &app,
        json!({ "content": "fn main() {}", "language": "rust" }),
    )
    .await;

    let (_, body) = send(&app, get("/api/pastes?language=rust")).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["language"], "rust");

    let (_, body) = send(&app, get("/api/pastes?search=snake")).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["title"], "Snake");
}

#[tokio::test]
async fn update_replaces_supplied_fields_and_keeps_the_id() {
    let (_dir, app) = test_app(false);

    let created = create(&app, json!({ "content": "v1", "title": "draft" })).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/pastes/{}", id),
            &json!({ "content": "v2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);
    assert_eq!(body["data"]["content"], "v2");
    assert_eq!(body["data"]["title"], "draft");

    let (status, body) = send(
        &app,
        json_request("PUT", "/api/pastes/zZzZ9", &json!({ "content": "v2" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn delete_removes_the_paste() {
    let (_dir, app) = test_app(false);

    let created = create(&app, json!({ "content": "temporary" })).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/pastes/{}", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&app, get(&format!("/api/pastes/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/pastes/{}", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn count_on_fetch_mode_counts_during_granted_fetches() {
    let (_dir, app) = test_app(true);

    let created = create(&app, json!({ "content": "eager" })).await;
    let id = created["id"].as_str().unwrap();

    let request = Request::builder()
        .uri(format!("/api/pastes/{}", id))
        .header("x-forwarded-for", "3.3.3.3")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    // The count runs on a detached task; poll until it lands. Polling
    // reuses the same viewer so its own counts dedup away.
    let mut views = serde_json::Value::Null;
    for _ in 0..100 {
        let poll = Request::builder()
            .uri(format!("/api/pastes/{}", id))
            .header("x-forwarded-for", "3.3.3.3")
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(&app, poll).await;
        views = body["data"]["views"].clone();
        if views == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(views, 1);
}
