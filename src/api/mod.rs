//! HTTP API module for Brain Gym
//!
//! Player routes (join, passive sessions, leaderboard, award events) and
//! admin routes for editing the leaderboard.

mod admin_routes;
mod auth;
pub mod routes;
mod sse;

use crate::awards::{AwardEvent, PointRange, SessionManager};
use crate::error::{CoreError, Result};
use crate::leaderboard::Leaderboard;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub leaderboard: Leaderboard,
    pub sessions: Arc<SessionManager>,
    /// Per-tick award events, fanned out to SSE clients
    pub event_tx: broadcast::Sender<AwardEvent>,
    /// Range used when an exercise completion does not name its points
    pub point_range: PointRange,
    /// Protects the admin routes when set
    pub api_key: Option<String>,
    /// Flipped to `true` on shutdown; open event streams end when it is
    drain: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(
        leaderboard: Leaderboard,
        sessions: Arc<SessionManager>,
        event_tx: broadcast::Sender<AwardEvent>,
        point_range: PointRange,
        api_key: Option<String>,
    ) -> Self {
        let (drain, _) = watch::channel(false);
        AppState {
            leaderboard,
            sessions,
            event_tx,
            point_range,
            api_key,
            drain: Arc::new(drain),
        }
    }
}

/// How long open connections get to finish once sessions are stopped
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Start the HTTP API server and run until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    // Check if port is already in use (another instance running)
    if tokio::net::TcpStream::connect(addr).await.is_ok() {
        tracing::error!(
            "Port {} is already in use. Another braingym instance may be running; \
             use `curl http://{}/health` to check.",
            addr.port(),
            addr
        );
        return Err(CoreError::Api(format!("Port {} already in use", addr.port())));
    }

    tracing::info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, state, shutdown, DRAIN_TIMEOUT).await
}

/// Serve on a bound listener. Once `shutdown` resolves every award session
/// is stopped before connections drain, and the drain is cut off after
/// `drain_timeout`.
pub(crate) async fn serve_listener<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
    drain_timeout: Duration,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sessions = state.sessions.clone();
    let drain = state.drain.clone();
    let (draining_tx, draining_rx) = oneshot::channel::<()>();

    let graceful = async move {
        shutdown.await;
        tracing::info!("Stopping all auto-point sessions");
        sessions.stop_all().await;
        drain.send_replace(true);
        let _ = draining_tx.send(());
    };

    let server = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(graceful)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        biased;
        result = &mut server => return result.map_err(|e| CoreError::Api(e.to_string())),
        _ = draining_rx => {}
    }

    match tokio::time::timeout(drain_timeout, &mut server).await {
        Ok(result) => result.map_err(|e| CoreError::Api(e.to_string())),
        Err(_) => {
            tracing::warn!(
                "Connections still open after {:?}, shutting down without them",
                drain_timeout
            );
            Ok(())
        }
    }
}

/// JSON error body used by every handler
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Map a store error onto an HTTP status
pub(crate) fn core_error_response(err: CoreError) -> Response {
    let status = match &err {
        CoreError::NotFound(..) => StatusCode::NOT_FOUND,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Request failed: {}", err);
    }
    error_response(status, err.to_string())
}

/// Create the API router with all routes
pub(crate) fn create_router(state: AppState) -> Router {
    // CORS configuration - the game client is served from another origin in development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let player_routes = Router::new()
        .route("/leaderboard", get(routes::get_leaderboard))
        .route("/users", post(routes::register_user))
        .route("/users/:username", get(routes::get_user))
        .route("/exercises", get(routes::list_exercises))
        .route("/users/:username/exercises", post(routes::record_exercise))
        .route("/sessions", get(routes::list_sessions))
        .route("/sessions/:username", post(routes::start_session))
        .route("/sessions/:username", delete(routes::stop_session))
        .route("/events", get(sse::events_handler));

    let admin_routes = Router::new()
        .route("/leaderboard", get(admin_routes::list_users))
        .route("/reset", post(admin_routes::reset_leaderboard))
        .route("/users/:username/points", put(admin_routes::set_points))
        .route("/users/:username/points", post(admin_routes::add_points))
        .route("/users/:username", delete(admin_routes::delete_user))
        .route("/entries/:id", delete(admin_routes::delete_entry))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        // Health check (public)
        .route("/health", get(routes::health))
        .nest("/api", player_routes.nest("/admin", admin_routes))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AwardConfig;
    use crate::db::Database;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state(api_key: Option<&str>) -> AppState {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let leaderboard = Leaderboard::new(db);
        let (event_tx, _) = broadcast::channel(16);
        let sessions = SessionManager::new(
            Arc::new(leaderboard.clone()),
            &AwardConfig::default(),
            event_tx.clone(),
        )
        .unwrap();

        AppState::new(
            leaderboard,
            Arc::new(sessions),
            event_tx,
            PointRange::default(),
            api_key.map(str::to_string),
        )
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state(None));
        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_register_and_fetch_user() {
        let app = create_router(test_state(None));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/users",
                serde_json::json!({ "username": " Alice " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["username"], "alice");

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/users/alice"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(empty_request("GET", "/api/users/ghost"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_lifecycle_status_codes() {
        let state = test_state(None);
        state.leaderboard.register("alice").await.unwrap();
        let sessions = state.sessions.clone();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/api/sessions/alice"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/api/sessions/alice"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/api/sessions/ghost"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/sessions"))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "sessions": ["alice"] })
        );

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(empty_request("DELETE", "/api/sessions/alice"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
        assert!(sessions.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_exercise_draws_points_on_server() {
        let state = test_state(None);
        state.leaderboard.register("alice").await.unwrap();
        let app = create_router(state);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/users/alice/exercises",
                serde_json::json!({ "exercise": "cross-crawl", "points": i64::MAX }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let points = body["points_earned"].as_i64().unwrap();
        assert!((40..=79).contains(&points));
        assert_eq!(body["exercise"], "cross-crawl");
        assert!(body["feedback"].as_str().unwrap().contains("Cross Crawl"));
        assert!(!body["encouragement"].as_str().unwrap().is_empty());
        assert_eq!(body["entry"]["points"], points);
        assert_eq!(body["entry"]["exercises_completed"], 1);
    }

    #[tokio::test]
    async fn test_record_exercise_rejects_unknown_exercise() {
        let state = test_state(None);
        state.leaderboard.register("alice").await.unwrap();
        let leaderboard = state.leaderboard.clone();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/users/alice/exercises",
                serde_json::json!({ "exercise": "teleport" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/users/alice/exercises",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert!(response.status().is_client_error());

        let alice = leaderboard.get("alice").await.unwrap().unwrap();
        assert_eq!(alice.points, 0);
        assert_eq!(alice.exercises_completed, 0);
    }

    #[tokio::test]
    async fn test_list_exercises() {
        let app = create_router(test_state(None));
        let response = app
            .oneshot(empty_request("GET", "/api/exercises"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["exercises"].as_array().unwrap().len(),
            crate::exercises::CATALOG.len()
        );
    }

    #[tokio::test]
    async fn test_admin_add_points_refuses_overflow() {
        let state = test_state(None);
        state.leaderboard.register("alice").await.unwrap();
        state
            .leaderboard
            .set_points("alice", i64::MAX - 5)
            .await
            .unwrap();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/users/alice/points",
                serde_json::json!({ "points": 6 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(empty_request("GET", "/api/leaderboard"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await[0]["points"], i64::MAX - 5);
    }

    #[tokio::test]
    async fn test_shutdown_stops_sessions_and_ends_event_streams() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let state = test_state(None);
        state.leaderboard.register("alice").await.unwrap();
        state.sessions.start("alice").await.unwrap();
        let sessions = state.sessions.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_listener(
            listener,
            state,
            async move {
                let _ = shutdown_rx.await;
            },
            Duration::from_secs(30),
        ));

        // Hold an event stream open across the shutdown
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/events HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 200"));

        shutdown_tx.send(()).unwrap();

        // Well under the drain timeout: the event stream has to end on its own
        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server did not drain")
            .unwrap();
        assert!(result.is_ok());
        assert!(sessions.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_drain_is_bounded_by_timeout() {
        use tokio::io::AsyncWriteExt;

        let state = test_state(None);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_listener(
            listener,
            state,
            async move {
                let _ = shutdown_rx.await;
            },
            Duration::from_millis(200),
        ));

        // A connection that never finishes sending its request
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /health HTTP/1.1\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("drain was not bounded")
            .unwrap();
        assert!(result.is_ok());
        drop(stream);
    }

    #[tokio::test]
    async fn test_admin_routes_require_api_key() {
        let state = test_state(Some("secret"));
        state.leaderboard.register("alice").await.unwrap();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/admin/leaderboard"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("PUT")
            .uri("/api/admin/users/alice/points")
            .header("content-type", "application/json")
            .header("Authorization", "Bearer secret")
            .body(Body::from(r#"{"points": 250}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["points"], 250);

        // Player routes stay open
        let response = app
            .oneshot(empty_request("GET", "/api/leaderboard"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_edit_flow() {
        let state = test_state(None);
        state.leaderboard.register("alice").await.unwrap();
        let bob = state.leaderboard.register("bob").await.unwrap();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/users/alice/points",
                serde_json::json!({ "points": 30 }),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["points"], 30);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/users/alice/points",
                serde_json::json!({ "points": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/admin/users/alice/points",
                serde_json::json!({ "points": -1 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", &format!("/api/admin/entries/{}", bob.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/api/admin/reset"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["reset"], 1);

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/admin/users/alice"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(empty_request("DELETE", "/api/admin/users/alice"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
