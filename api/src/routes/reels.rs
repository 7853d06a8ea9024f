//! Reel CRUD endpoints (/reels)

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::domain::reels::{NewReel, ReelUpdate};
use crate::models::{DirectorInfo, ReelRecord, VideoRecord};
use crate::services::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/reels",
        get(get_reels)
            .post(create_reel)
            .put(update_reel)
            .delete(delete_reel),
    )
}

#[derive(Deserialize)]
struct IdQuery {
    id: Option<String>,
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// GET /reels - One reel by id, or all of them
async fn get_reels(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Response, ApiError> {
    match query.id {
        Some(id) => {
            let reel = state
                .reels
                .get(&id)
                .await
                .ok_or_else(|| ApiError::not_found("Reel not found"))?;
            Ok(Json(reel).into_response())
        }
        None => Ok(Json(state.reels.list().await).into_response()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReelRequest {
    #[serde(default)]
    videos: Vec<VideoRecord>,
    title: Option<String>,
    description: Option<String>,
    director_info: Option<DirectorInfo>,
    edit_state: Option<serde_json::Value>,
}

/// POST /reels - Create a reel from an ordered list of videos
async fn create_reel(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateReelRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReelRecord>), ApiError> {
    let Json(req) = body.map_err(bad_body)?;
    if req.videos.is_empty() {
        return Err(ApiError::bad_request("videos must be a non-empty array"));
    }

    let reel = state
        .reels
        .create(NewReel {
            videos: req.videos,
            title: req.title,
            description: req.description,
            director_info: req.director_info,
            edit_state: req.edit_state,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(reel)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateReelRequest {
    id: Option<String>,
    created_at: Option<serde_json::Value>,
    #[serde(flatten)]
    update: ReelUpdate,
}

/// PUT /reels - Replace any fields of a reel except id and createdAt
async fn update_reel(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UpdateReelRequest>, JsonRejection>,
) -> Result<Json<ReelRecord>, ApiError> {
    let Json(req) = body.map_err(bad_body)?;
    let id = req
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("id is required"))?;
    if req.created_at.is_some() {
        return Err(ApiError::bad_request("createdAt cannot be changed"));
    }

    Ok(Json(state.reels.update(&id, req.update).await?))
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    message: String,
}

/// DELETE /reels - Remove a reel by id
async fn delete_reel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("id is required"))?;

    if !state.reels.delete(&id).await? {
        return Err(ApiError::not_found("Reel not found"));
    }

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Reel {} deleted", id),
    }))
}
