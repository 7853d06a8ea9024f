mod common;

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::*;
use dropreel::error::DropReelError;
use dropreel::services::tokens::RefreshError;

#[tokio::test]
async fn exchanged_token_is_returned_until_expiry() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("sl.first", Some("refresh-1"))))
        .expect(1)
        .mount(&app.dropbox)
        .await;

    let credential = app.state.tokens.exchange_code("auth-code-1").await.unwrap();
    assert_eq!(credential.access_token, "sl.first");
    assert_eq!(credential.refresh_token.as_deref(), Some("refresh-1"));

    let token = app.state.tokens.get_valid_access_token().await.unwrap();
    assert_eq!(token, "sl.first");
    assert_eq!(app.state.tokens.current_credential().await, Some(credential));
}

#[tokio::test]
async fn rejected_exchange_leaves_store_empty() {
    let app = spawn_app().await;
    mount_token(
        &app.dropbox,
        "authorization_code",
        ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "code doesn't exist or has expired"
        })),
    )
    .await;

    let result = app.state.tokens.exchange_code("stale-code").await;
    match result {
        Err(DropReelError::AuthExchange { status, .. }) => assert_eq!(status, Some(400)),
        other => panic!("expected AuthExchange error, got {:?}", other),
    }
    assert!(app.state.tokens.current_credential().await.is_none());
    assert!(app.state.tokens.get_valid_access_token().await.is_none());
}

#[tokio::test]
async fn expired_credential_is_refreshed_exactly_once() {
    let app = spawn_app().await;
    app.seed(credential("sl.old", -3600)).await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("sl.new", None)))
        .expect(1)
        .mount(&app.dropbox)
        .await;

    let first = app.state.tokens.get_valid_access_token().await.unwrap();
    let second = app.state.tokens.get_valid_access_token().await.unwrap();
    assert_eq!(first, "sl.new");
    assert_eq!(second, "sl.new");

    let stored = app.state.tokens.current_credential().await.unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
    assert!(stored.expires_at.unwrap() > Utc::now() + Duration::hours(3));
}

#[tokio::test]
async fn revoked_refresh_token_degrades_to_unauthenticated() {
    let app = spawn_app().await;
    let original = credential("sl.old", -3600);
    app.seed(original.clone()).await;
    mount_token(
        &app.dropbox,
        "refresh_token",
        ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "refresh token is invalid or revoked"
        })),
    )
    .await;

    assert!(app.state.tokens.get_valid_access_token().await.is_none());
    assert!(app.state.tokens.refresh_access_token().await.is_none());
    assert_eq!(app.state.tokens.current_credential().await, Some(original));
}

#[tokio::test]
async fn expired_credential_without_refresh_token_is_unauthenticated() {
    let app = spawn_app().await;
    let mut stale = credential("sl.old", -60);
    stale.refresh_token = None;
    app.seed(stale).await;

    assert!(app.state.tokens.get_valid_access_token().await.is_none());
    assert!(matches!(
        app.state.tokens.try_refresh().await,
        Err(RefreshError::NoRefreshToken)
    ));
}

#[tokio::test]
async fn forced_refresh_without_credential_reports_why() {
    let app = spawn_app().await;
    assert!(matches!(
        app.state.tokens.try_refresh().await,
        Err(RefreshError::NoCredential)
    ));
}

#[tokio::test]
async fn reset_is_idempotent() {
    let app = spawn_app().await;
    app.seed(credential("sl.live", 3600)).await;

    let first = app.state.tokens.reset().await;
    let second = app.state.tokens.reset().await;
    assert!(first.success);
    assert!(second.success);
    assert!(app.state.tokens.current_credential().await.is_none());
    assert!(app.state.tokens.get_valid_access_token().await.is_none());
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let app = spawn_app().await;
    app.seed(credential("sl.old", -3600)).await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("sl.new", None))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&app.dropbox)
        .await;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let tokens = app.state.tokens.clone();
            tokio::spawn(async move { tokens.get_valid_access_token().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().as_deref(), Some("sl.new"));
    }
}
