//! HTTP/WS route handlers (spec §6 C9). Router assembly grounded on
//! `ferrex-server/src/routes/mod.rs`'s nest-and-merge pattern; error
//! surface grounded on `ferrex-server/src/infra/errors.rs`.

pub mod batch;
pub mod export;
pub mod health;
pub mod models;
pub mod monitor;
pub mod postprocess;
pub mod realtime;
pub mod settings;
pub mod transcribe;
pub mod websocket;

use std::path::PathBuf;

use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::require_bearer_token;
use crate::state::AppState;

/// Origins the desktop shell (Tauri) loads the UI from (spec §6 CORS).
const ALLOWED_ORIGINS: &[&str] = &["tauri://localhost", "https://tauri.localhost", "http://localhost:1420"];

pub fn build_router(state: AppState) -> Router {
    let dev = state.config.dev;

    let mut router = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/shutdown", post(health::shutdown))
        .route("/api/transcribe", post(transcribe::transcribe))
        .route("/api/transcribe/cancel", post(transcribe::cancel))
        .route("/api/batch-transcribe", post(batch::start))
        .route("/api/batch-transcribe/cancel", post(batch::cancel))
        .route("/api/realtime/start", post(realtime::start))
        .route("/api/realtime/stop", post(realtime::stop))
        .route("/api/realtime/pause", post(realtime::pause))
        .route("/api/realtime/resume", post(realtime::resume))
        .route("/api/realtime/status", get(realtime::status))
        .route("/api/monitor/start", post(monitor::start))
        .route("/api/monitor/stop", post(monitor::stop))
        .route("/api/monitor/status", get(monitor::status))
        .route("/api/monitor/mark-processed", post(monitor::mark_processed))
        .route("/api/models/:engine/load", post(models::load))
        .route("/api/models/:engine/unload", post(models::unload))
        .route("/api/models/:engine/info", get(models::info))
        .route("/api/format-text", post(postprocess::format_text))
        .route("/api/correct-text", post(postprocess::correct_text))
        .route("/api/diarize", post(postprocess::diarize))
        .route("/api/settings", get(settings::get_settings).patch(settings::patch_settings))
        .route("/api/config", get(settings::get_config).patch(settings::patch_config))
        .route("/api/export/:format", post(export::export))
        .route("/ws", get(websocket::upgrade));

    if dev {
        router = router
            .route("/openapi.json", get(health::openapi_stub))
            .route("/docs", get(health::docs_stub))
            .route("/redoc", get(health::docs_stub));
    }

    router
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            ALLOWED_ORIGINS.iter().map(|o| o.parse().unwrap()),
        ))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Allowed roots for client-supplied paths: the user's home directory and
/// the server process's current working directory (spec §6 "project dir
/// or user home").
pub fn allowed_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        roots.push(PathBuf::from(home));
    }
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    roots
}
