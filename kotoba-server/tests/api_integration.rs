//! End-to-end coverage of scenarios S1, S3, S6, S9 against a real
//! `axum::Router` via `tower::ServiceExt::oneshot`, backed by
//! `FakeTranscriptionEngine` (SPEC_FULL.md §15). Style grounded on
//! `ferrex-server/tests/auth_integration_test.rs`.

mod support;

use std::time::Duration;

use axum::http::StatusCode;
use futures_util::StreamExt;
use serde_json::json;

use kotoba_core::{CancelFlag, Occupant, WorkerKind};

use support::{request_json, test_app};

/// S1 — `/api/health` is reachable with no token; every other route
/// behind the bearer-token middleware is not, and becomes reachable once
/// the current token is presented.
#[tokio::test]
async fn s1_health_is_public_settings_requires_auth() {
    let (router, state) = test_app();

    let (status, body) = request_json(router.clone(), "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = request_json(router.clone(), "GET", "/api/settings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = state.tokens.current_token();
    let (status, _) = request_json(router, "GET", "/api/settings", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

/// S3 — a transcription request made while the transcription slot is
/// already occupied is rejected with `Busy` (409), never queued or
/// blocked on. The slot is occupied directly (rather than racing two real
/// requests against the fake engine's near-instant `transcribe()`) so the
/// scenario is deterministic.
#[tokio::test]
async fn s3_concurrent_transcribe_is_rejected_as_busy() {
    let (router, state) = test_app();
    let token = state.tokens.current_token();

    let handle = std::thread::spawn(|| std::thread::sleep(Duration::from_secs(5)));
    let won = state
        .workers
        .slot(WorkerKind::Transcription)
        .try_set(Occupant::new(handle, CancelFlag::new()))
        .is_ok();
    assert!(won, "slot starts vacant");

    let audio_path = std::env::current_dir().unwrap().join("s3_busy_probe.wav");
    std::fs::write(&audio_path, b"not real audio, just needs to exist").unwrap();

    let (status, body) = request_json(
        router,
        "POST",
        "/api/transcribe",
        Some(&token),
        Some(json!({ "file_path": audio_path.to_string_lossy() })),
    )
    .await;

    std::fs::remove_file(&audio_path).ok();

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "別の処理が実行中です");
}

/// S6 — flooding the Event Bus past its per-subscriber capacity drops the
/// oldest events instead of blocking the emitter or panicking, and the
/// server built on the same `AppState` keeps serving requests afterward.
#[tokio::test]
async fn s6_event_bus_overflow_does_not_block_or_crash() {
    let (router, state) = test_app();
    let capacity = state.config.event_queue_capacity;

    let mut stream = Box::pin(state.events.subscribe());
    for i in 0..(capacity + 25) {
        state.events.emit("volume_changed", json!({ "i": i }));
    }

    let first = stream.next().await.unwrap();
    assert_eq!(first.data["i"], 25);

    let (status, _) = request_json(router, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

/// S9 — a client-supplied path that lexically escapes every allowed root
/// via `..` is rejected as a validation error, never reaching the
/// filesystem-existence check or the engine.
#[tokio::test]
async fn s9_path_traversal_is_rejected_as_validation_error() {
    let (router, state) = test_app();
    let token = state.tokens.current_token();

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| "/root".to_string());
    let escaping_path = format!("{home}/../../../etc/passwd");

    let (status, body) = request_json(
        router,
        "POST",
        "/api/transcribe",
        Some(&token),
        Some(json!({ "file_path": escaping_path })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "リクエストの内容が正しくありません");
}
