//! Shared fixtures for the integration suite, in the style of
//! `ferrex-server/tests/auth_integration_test.rs`'s `setup_test_state()`/
//! `test_request_json()`/`parse_json_response()` helpers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use kotoba_server::collaborators::{FakeTranscriptionEngine, TranscriptionEngine};
use kotoba_server::config::Config;
use kotoba_server::engine::EngineRegistry;
use kotoba_server::handlers::build_router;
use kotoba_server::settings::SettingsStore;
use kotoba_server::state::AppState;

/// Builds a real `Router` over a real `AppState`, with the production
/// `EngineRegistry` (which always reports `Unsupported`) replaced by one
/// backed by `FakeTranscriptionEngine`, matching the dependency-injection
/// seam `collaborators.rs` documents as existing for exactly this purpose.
/// Returns the router plus the state, so tests needing to reach into
/// worker slots directly (the busy scenario) still can.
pub fn test_app() -> (Router, AppState) {
    let config = Config::parse_from(["kotoba-server"]);
    let data_dir = tempfile::tempdir().unwrap().keep();
    let settings = SettingsStore::load(&data_dir, None);

    let mut state = AppState::new(config, settings);
    state.events.bind_scheduler(tokio::runtime::Handle::current());
    state.engine = Arc::new(EngineRegistry::new(Box::new(|_name| {
        Ok(Arc::new(FakeTranscriptionEngine::default()) as Arc<dyn TranscriptionEngine>)
    })));

    let router = build_router(state.clone());
    (router, state)
}

pub fn bearer_header(token: &str) -> String {
    format!("Bearer {token}")
}

pub async fn request_json(
    router: Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("authorization", bearer_header(token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, parsed)
}
