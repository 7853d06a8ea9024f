//! Video listing endpoints (/videos/*)

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::AppState;
use crate::constants::THUMBNAIL_CACHE_SECS;
use crate::models::VideoRecord;
use crate::services::error::{ApiError, LogErr};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/resolve", get(resolve_video))
        .route("/videos/thumbnail", get(thumbnail))
}

#[derive(Deserialize)]
struct PathQuery {
    path: Option<String>,
}

async fn require_token(state: &AppState) -> Result<String, ApiError> {
    state.tokens.get_valid_access_token().await.ok_or_else(|| {
        ApiError::new(StatusCode::UNAUTHORIZED, "Not authenticated with Dropbox")
            .with_field("suggestedAction", "authenticate")
    })
}

#[derive(Serialize)]
struct VideoListResponse {
    folder: String,
    videos: Vec<VideoRecord>,
}

/// GET /videos - Videos in the requested (or configured) folder
async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<VideoListResponse>, ApiError> {
    let access_token = require_token(&state).await?;

    match state
        .videos
        .list_videos(&access_token, query.path.as_deref())
        .await
    {
        Ok((folder, videos)) => Ok(Json(VideoListResponse { folder, videos })),
        Err(e) => {
            warn!("Video listing failed: {}", e);
            // Offer the root contents so the client can pick a valid folder
            let root_entries = state
                .videos
                .list_root(&access_token)
                .await
                .unwrap_or_default();
            let root_entries = serde_json::to_value(root_entries).unwrap_or_default();
            Err(ApiError::from(e).with_field("rootEntries", root_entries))
        }
    }
}

/// GET /videos/resolve - Stream link and duration for one video
async fn resolve_video(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<VideoRecord>, ApiError> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("path is required"))?;
    let access_token = require_token(&state).await?;

    Ok(Json(state.videos.resolve_video(&access_token, &path).await?))
}

/// GET /videos/thumbnail - JPEG thumbnail proxied from Dropbox
async fn thumbnail(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("path is required"))?;

    let access_token = state
        .tokens
        .get_valid_access_token()
        .await
        .ok_or_else(|| ApiError::internal("Not authenticated with Dropbox"))?;

    let result = state.videos.thumbnail(&access_token, &path).await;
    // Transport failures, throttling and outages are not a missing image
    let (context, status) = match &result {
        Err(e) if matches!(e.remote_status(), None | Some(429) | Some(500..)) => {
            ("Dropbox thumbnail request failed", StatusCode::BAD_GATEWAY)
        }
        _ => ("Thumbnail not available", StatusCode::NOT_FOUND),
    };
    let thumbnail = result.log_status(context, status)?;

    let Some(bytes) = thumbnail else {
        return Err(ApiError::not_found("Thumbnail not available"));
    };

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg".to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", THUMBNAIL_CACHE_SECS),
            ),
        ],
        bytes,
    )
        .into_response())
}
