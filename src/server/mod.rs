//! Dashboard Backend
//!
//! HTTP server built with Axum.
//!
//! # Endpoints
//!
//! - `GET /api/config` - Current dashboard configuration
//! - `GET /api/events` - Live event stream (SSE), optionally `?feed=<kind>`
//! - `POST /api/events/:kind` - Publish a weather, docker or system payload
//! - `POST /api/reload` - Re-read dashboard files and notify sessions
//!
//! Edits to `config.toml` / `themes.toml` are picked up without a request
//! when a [`DashboardWatcher`] is running.
//! - `GET /health` - Liveness, uptime and subscriber count
//! - `GET /static/*` - Static assets from the configured directory
//!
//! # Example
//!
//! ```rust,no_run
//! use herbst::config::ServerSettings;
//! use herbst::server::{serve, AppState, DashboardStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ServerSettings::default();
//!     let dashboard = DashboardStore::open(settings.resolved_config_dir())?;
//!     serve(AppState::new(dashboard), &settings).await?;
//!     Ok(())
//! }
//! ```

pub mod dashboard;
pub mod dto;
pub mod error;
pub mod hub;
pub mod routes;
pub mod state;
pub mod watcher;

pub use dashboard::{DashboardError, DashboardFile};
pub use error::{ApiError, ApiResult};
pub use hub::{EventHub, HubConfig};
pub use state::{AppState, DashboardStore};
pub use watcher::DashboardWatcher;

use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::ServerSettings;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let api_routes = Router::new()
        .route("/config", get(routes::config::get_config))
        .route("/events", get(routes::events::stream_events))
        .route("/events/:kind", post(routes::events::publish_event))
        .route("/reload", post(routes::reload::reload));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(routes::health::health))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Bind and serve until Ctrl+C or SIGTERM
pub async fn serve(state: AppState, settings: &ServerSettings) -> Result<(), ApiError> {
    let router = build_router(state, Path::new(&settings.static_dir));

    let addr = settings.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(addr = %addr, static_dir = %settings.static_dir, "herbst listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("herbst shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
    use crate::live::{FeedState, LiveStateStore, ReconnectPolicy, SseChannel};
    use crate::schema::{validate, Feed, HerbstConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    fn live_config() -> HerbstConfig {
        validate(&json!({
            "title": "lab",
            "theme": "default",
            "services": [{"name": "NAS", "url": "https://nas.local"}],
            "system": {"enabled": true},
            "docker": {"enabled": true}
        }))
        .unwrap()
    }

    fn create_test_app() -> (Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bg.txt"), "background").unwrap();
        let state = AppState::new(DashboardStore::fixed(live_config()));
        (build_router(state, dir.path()), dir)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = create_test_app();
        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["subscribers"], 0);
    }

    #[tokio::test]
    async fn test_get_config_wire_shape() {
        let (app, _dir) = create_test_app();
        let response = app.oneshot(get("/api/config")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["title"], "lab");
        assert_eq!(body["system"]["enabled"], true);
        assert_eq!(body["docker"]["socketPath"], "/var/run/docker.sock");
        assert_eq!(body["services"][0]["onlineBadge"], false);

        // what we serve must validate on the client side
        assert_eq!(validate(&body).unwrap(), live_config());
    }

    #[tokio::test]
    async fn test_publish_accepts_valid_payload() {
        let (app, _dir) = create_test_app();
        let response = app
            .oneshot(post("/api/events/system", r#"{"cpuPercent": 12.5}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["event"], "system");
    }

    #[tokio::test]
    async fn test_publish_rejects_malformed_payload() {
        let (app, _dir) = create_test_app();
        let response = app
            .oneshot(post("/api/events/docker", r#"{"kind": "sideways"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_publish_unknown_feed() {
        let (app, _dir) = create_test_app();
        let response = app.oneshot(post("/api/events/printer", "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_events_rejects_unknown_feed_filter() {
        let (app, _dir) = create_test_app();
        let response = app.oneshot(get("/api/events?feed=printer")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_events_content_type() {
        let (app, _dir) = create_test_app();
        let response = app.oneshot(get("/api/events?feed=system")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
    }

    #[tokio::test]
    async fn test_static_files() {
        let (app, _dir) = create_test_app();
        let response = app.oneshot(get("/static/bg.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reload_from_files() {
        let config_dir = tempdir().unwrap();
        let static_dir = tempdir().unwrap();
        let state = AppState::new(DashboardStore::open(config_dir.path()).unwrap());
        let app = build_router(state, static_dir.path());

        std::fs::write(
            config_dir.path().join(dashboard::CONFIG_FILENAME),
            "title = \"after\"\ntheme = \"light\"\n",
        )
        .unwrap();

        let response = app.clone().oneshot(post("/api/reload", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["title"], "after");

        let response = app.oneshot(get("/api/config")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["title"], "after");
        assert_eq!(body["themeVars"]["color-bg"], "#f9fafb");
    }

    #[tokio::test]
    async fn test_reload_with_broken_file() {
        let config_dir = tempdir().unwrap();
        let static_dir = tempdir().unwrap();
        let state = AppState::new(DashboardStore::open(config_dir.path()).unwrap());
        let app = build_router(state, static_dir.path());

        std::fs::write(config_dir.path().join(dashboard::CONFIG_FILENAME), "title = ").unwrap();

        let response = app.oneshot(post("/api/reload", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_session_streams_from_server() {
        let static_dir = tempdir().unwrap();
        let app = build_router(AppState::new(DashboardStore::fixed(live_config())), static_dir.path());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let channel = Arc::new(SseChannel::new(&base).unwrap());
        let store = LiveStateStore::start(&live_config(), channel, ReconnectPolicy::default());
        let mut rx = store.subscribe();

        let wait = Duration::from_secs(5);
        tokio::time::timeout(
            wait,
            rx.wait_for(|s| {
                s.state(Feed::System) == FeedState::Streaming
                    && s.state(Feed::Docker) == FeedState::Streaming
            }),
        )
        .await
        .unwrap()
        .unwrap();

        let client = reqwest::Client::new();
        client
            .post(format!("{}/api/events/system", base))
            .body(r#"{"cpuPercent": 42.0, "memoryUsed": 1, "memoryTotal": 4}"#)
            .send()
            .await
            .unwrap();
        client
            .post(format!("{}/api/events/docker", base))
            .body(r#"{"kind": "snapshot", "containers": [{"id": "c1", "name": "web", "image": "nginx", "state": "running", "status": "Up", "created": 1700000000}]}"#)
            .send()
            .await
            .unwrap();

        let snapshot = tokio::time::timeout(
            wait,
            rx.wait_for(|s| s.system.data.is_some() && s.docker.data.is_some()),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(snapshot.system.data.as_ref().map(|d| d.cpu_percent), Some(42.0));
        assert_eq!(snapshot.containers().len(), 1);
        // weather is disabled and must not be touched
        assert_eq!(snapshot.state(Feed::Weather), FeedState::Disconnected);

        client
            .post(format!("{}/api/reload", base))
            .send()
            .await
            .unwrap();
        tokio::time::timeout(wait, rx.wait_for(|s| s.reload_requested))
            .await
            .unwrap()
            .unwrap();

        store.shutdown().await;
    }
}
