#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dropreel::config::Config;
use dropreel::models::Credential;
use dropreel::{AppState, build_app};

pub const APP_BASE_URL: &str = "http://app.test";
pub const FOLDER: &str = "/Reel";

/// Application wired to a fake Dropbox
pub struct TestApp {
    pub dropbox: MockServer,
    pub state: Arc<AppState>,
    pub app: Router,
    _dir: TempDir,
}

pub fn test_config(dropbox_uri: &str, dir: &TempDir) -> Config {
    let env: HashMap<&str, String> = HashMap::from([
        ("DROPBOX_APP_KEY", "test-key".to_string()),
        ("DROPBOX_APP_SECRET", "test-secret".to_string()),
        ("DROPBOX_AUTH_URL", format!("{}/oauth2/authorize", dropbox_uri)),
        ("DROPBOX_API_URL", dropbox_uri.to_string()),
        ("DROPBOX_CONTENT_URL", dropbox_uri.to_string()),
        ("DROPBOX_FOLDER_PATH", FOLDER.to_string()),
        ("DROPBOX_TIMEOUT_SECS", "2".to_string()),
        ("APP_BASE_URL", APP_BASE_URL.to_string()),
        ("TOKEN_STORE", "memory".to_string()),
        ("COOKIE_SECURE", "false".to_string()),
        (
            "REELS_PATH",
            dir.path().join("reels.json").display().to_string(),
        ),
    ]);
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub async fn spawn_app() -> TestApp {
    let dropbox = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(
        AppState::new(test_config(&dropbox.uri(), &dir))
            .await
            .unwrap(),
    );
    let app = build_app(state.clone());

    TestApp {
        dropbox,
        state,
        app,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn seed(&self, credential: Credential) {
        assert!(self.state.tokens.adopt(&credential).await.unwrap());
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn credential(access_token: &str, expires_in_secs: i64) -> Credential {
    Credential {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(Utc::now() + Duration::seconds(expires_in_secs)),
    }
}

pub fn token_body(access_token: &str, refresh_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 14400,
        "account_id": "dbid:test",
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }
    body
}

pub fn account_body() -> Value {
    json!({
        "account_id": "dbid:test",
        "name": { "display_name": "Test Director" },
        "email": "director@example.com"
    })
}

pub fn expired_token_body() -> Value {
    json!({
        "error_summary": "expired_access_token/..",
        "error": { ".tag": "expired_access_token" }
    })
}

pub fn invalid_token_body() -> Value {
    json!({
        "error_summary": "invalid_access_token/...",
        "error": { ".tag": "invalid_access_token" }
    })
}

/// Token endpoint answering one grant type
pub async fn mount_token(server: &MockServer, grant_type: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains(format!("grant_type={}", grant_type)))
        .respond_with(response)
        .mount(server)
        .await;
}
