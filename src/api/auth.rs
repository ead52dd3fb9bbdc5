//! Authentication middleware for the admin routes

use super::{error_response, AppState};
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Authentication middleware
///
/// If `api_key` is configured in AppState, validates the Authorization header.
/// Expected format: `Authorization: Bearer <api_key>`
///
/// If no `api_key` is configured, all requests are allowed (local mode).
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected_key) = &state.api_key else {
        return next.run(request).await;
    };

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.map(bearer_token) {
        Some(Some(provided_key)) if provided_key == expected_key => next.run(request).await,
        Some(Some(_)) => error_response(StatusCode::UNAUTHORIZED, "Invalid API key"),
        Some(None) => error_response(
            StatusCode::UNAUTHORIZED,
            "Invalid Authorization header format. Expected: Bearer <api_key>",
        ),
        None => error_response(
            StatusCode::UNAUTHORIZED,
            "API key required. Set Authorization: Bearer <api_key>",
        ),
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}
