//! HTTP route handlers for players

use super::{core_error_response, error_response, AppState};
use crate::error::SessionError;
use crate::exercises;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

// ============================================================================
// Health Check
// ============================================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ============================================================================
// Leaderboard & Users
// ============================================================================

pub async fn get_leaderboard(State(state): State<AppState>) -> impl IntoResponse {
    match state.leaderboard.list().await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => core_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
}

/// Join the game. Returns the existing entry if the name is taken.
pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> impl IntoResponse {
    match state.leaderboard.register(&req.username).await {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => core_error_response(e),
    }
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    match state.leaderboard.get(&username).await {
        Ok(Some(entry)) => Json(entry).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => core_error_response(e),
    }
}

pub async fn list_exercises() -> impl IntoResponse {
    Json(serde_json::json!({ "exercises": exercises::CATALOG }))
}

#[derive(Debug, Deserialize)]
pub struct RecordExerciseRequest {
    /// Catalog id of the completed exercise
    pub exercise: String,
}

/// Record a completed exercise. The server draws the points.
pub async fn record_exercise(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<RecordExerciseRequest>,
) -> impl IntoResponse {
    let verdict = match exercises::judge(&req.exercise, &state.point_range, &mut rand::rng()) {
        Ok(verdict) => verdict,
        Err(e) => return core_error_response(e),
    };

    match state
        .leaderboard
        .record_exercise(&username, verdict.points_earned)
        .await
    {
        Ok(entry) => Json(serde_json::json!({
            "exercise": verdict.exercise.id,
            "points_earned": verdict.points_earned,
            "feedback": verdict.feedback,
            "encouragement": verdict.encouragement,
            "entry": entry,
        }))
        .into_response(),
        Err(e) => core_error_response(e),
    }
}

// ============================================================================
// Passive award sessions
// ============================================================================

pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.active_sessions().await;
    Json(serde_json::json!({ "sessions": sessions }))
}

pub async fn start_session(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    match state.sessions.start(&username).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "started": username.trim().to_lowercase() })),
        )
            .into_response(),
        Err(e @ SessionError::InvalidUsername) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ SessionError::AlreadyRunning(_)) => {
            error_response(StatusCode::CONFLICT, e.to_string())
        }
        Err(e @ SessionError::UserNotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        Err(SessionError::Storage(e)) => core_error_response(e),
    }
}

/// Idempotent: stopping a user without a session still returns 204
pub async fn stop_session(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    state.sessions.stop(&username).await;
    StatusCode::NO_CONTENT
}
