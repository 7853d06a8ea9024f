mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::*;

fn reel_body() -> Value {
    json!({
        "videos": [
            { "id": "id:1", "name": "one.mp4", "remotePath": "/Reel/one.mp4" },
            { "id": "id:2", "name": "two.mov", "path": "/Reel/two.mov", "durationLabel": "0:42" }
        ],
        "title": "Demo",
        "directorInfo": { "name": "Ada", "agency": "North", "showEmail": true, "awards": 2 },
        "editState": { "trim": [0, 12] }
    })
}

async fn create(app: &TestApp) -> Value {
    let response = app.send_json("POST", "/reels", reel_body()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn create_then_fetch() {
    let app = spawn_app().await;
    let created = create(&app).await;
    let id = created["id"].as_str().unwrap();

    assert_eq!(created["title"], "Demo");
    assert_eq!(created["videos"][1]["remotePath"], "/Reel/two.mov");
    assert_eq!(created["createdAt"], created["updatedAt"]);

    let response = app.get(&format!("/reels?id={}", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched, created);
    assert_eq!(fetched["directorInfo"]["agency"], "North");
    assert_eq!(fetched["directorInfo"]["showEmail"], true);
    assert_eq!(fetched["directorInfo"]["awards"], 2);
    assert_eq!(fetched["editState"]["trim"][1], 12);
}

#[tokio::test]
async fn list_returns_all_reels() {
    let app = spawn_app().await;
    create(&app).await;
    create(&app).await;

    let body = body_json(app.get("/reels").await).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn create_rejects_missing_or_empty_videos() {
    let app = spawn_app().await;

    let response = app.send_json("POST", "/reels", json!({ "title": "No videos" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.send_json("POST", "/reels", json!({ "videos": [] })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());

    let response = app.send_json("POST", "/reels", json!({ "videos": "nope" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_replaces_only_given_fields() {
    let app = spawn_app().await;
    let created = create(&app).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .send_json("PUT", "/reels", json!({ "id": id, "title": "New" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;

    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["title"], "New");
    assert_eq!(updated["createdAt"], created["createdAt"]);
    assert_eq!(updated["videos"], created["videos"]);
    assert_eq!(updated["directorInfo"], created["directorInfo"]);
}

#[tokio::test]
async fn update_with_null_clears_field() {
    let app = spawn_app().await;
    let created = create(&app).await;

    let response = app
        .send_json(
            "PUT",
            "/reels",
            json!({ "id": created["id"], "directorInfo": null }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;

    assert!(updated.get("directorInfo").is_none());
    assert_eq!(updated["title"], "Demo");
    assert_eq!(updated["editState"], created["editState"]);
}

#[tokio::test]
async fn update_validation() {
    let app = spawn_app().await;
    let created = create(&app).await;

    let response = app.send_json("PUT", "/reels", json!({ "title": "x" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send_json(
            "PUT",
            "/reels",
            json!({ "id": created["id"], "createdAt": "2020-01-01T00:00:00Z" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send_json("PUT", "/reels", json!({ "id": "missing", "title": "x" }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_then_fetch_is_not_found() {
    let app = spawn_app().await;
    let created = create(&app).await;
    let id = created["id"].as_str().unwrap();

    let response = app.send_json("DELETE", &format!("/reels?id={}", id), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    let response = app.get(&format!("/reels?id={}", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send_json("DELETE", &format!("/reels?id={}", id), json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send_json("DELETE", "/reels", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reels_survive_restart() {
    let app = spawn_app().await;
    let created = create(&app).await;

    let reopened = dropreel::domain::reels::ReelStore::open(&app.state.config.reels_path)
        .await
        .unwrap();
    let reel = reopened.get(created["id"].as_str().unwrap()).await.unwrap();
    assert_eq!(reel.title.as_deref(), Some("Demo"));
    assert_eq!(reel.videos.len(), 2);
}
