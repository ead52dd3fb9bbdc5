//! Admin route handlers for editing the leaderboard

use super::{core_error_response, error_response, AppState};
use crate::leaderboard::PointStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

pub async fn list_users(State(state): State<AppState>) -> impl IntoResponse {
    match state.leaderboard.list().await {
        Ok(users) => Json(serde_json::json!({ "users": users })).into_response(),
        Err(e) => core_error_response(e),
    }
}

pub async fn reset_leaderboard(State(state): State<AppState>) -> impl IntoResponse {
    match state.leaderboard.reset().await {
        Ok(count) => {
            tracing::info!("Leaderboard reset ({} users)", count);
            Json(serde_json::json!({ "success": true, "reset": count })).into_response()
        }
        Err(e) => core_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct PointsRequest {
    pub points: i64,
}

/// Overwrite a user's balance
pub async fn set_points(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<PointsRequest>,
) -> impl IntoResponse {
    match state.leaderboard.set_points(&username, req.points).await {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => core_error_response(e),
    }
}

/// Add to a user's balance
pub async fn add_points(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<PointsRequest>,
) -> impl IntoResponse {
    if req.points <= 0 {
        return error_response(StatusCode::BAD_REQUEST, "points must be positive");
    }

    match state.leaderboard.add_points(&username, req.points).await {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => core_error_response(e),
    }
}

/// Delete a user. A running award session is left alone and skips its ticks.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    match state.leaderboard.delete(&username).await {
        Ok(()) => Json(serde_json::json!({ "message": format!("Deleted {}", username) }))
            .into_response(),
        Err(e) => core_error_response(e),
    }
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.leaderboard.delete_by_id(&id).await {
        Ok(()) => Json(serde_json::json!({ "message": format!("Deleted entry with ID {}", id) }))
            .into_response(),
        Err(e) => core_error_response(e),
    }
}
