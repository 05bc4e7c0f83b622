//! `/api/realtime/{start,stop,pause,resume,status}` (spec §6, §4.7).
//! Grounded on `original_source/src/api/routers/realtime.py`.

use std::sync::Mutex;

use axum::extract::State;
use axum::Json;
use kotoba_core::{CancelFlag, Occupant, WorkerKind};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::engine::ENGINE_NAMES;
use crate::errors::{AppError, AppResult};
use crate::realtime::{self as realtime_worker, RealtimeHandle};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RealtimeControlRequest {
    #[serde(default = "default_model_size")]
    model_size: String,
    #[serde(default = "default_buffer_duration")]
    buffer_duration: f64,
}

fn default_model_size() -> String {
    "base".to_string()
}

fn default_buffer_duration() -> f64 {
    3.0
}

#[derive(Serialize)]
pub struct RealtimeStatusResponse {
    is_running: bool,
    is_paused: bool,
    model_size: Option<String>,
}

/// The last-started realtime worker's handle, needed by `pause`/`resume`/
/// `status` since those don't have a natural place to read it from the
/// `WorkerSlot` (which only knows about cancellation and liveness).
static ACTIVE_HANDLE: Lazy<Mutex<Option<(RealtimeHandle, String)>>> = Lazy::new(|| Mutex::new(None));

pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<RealtimeControlRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if !(1.0..=10.0).contains(&request.buffer_duration) {
        return Err(AppError::validation().with_detail("buffer_duration out of range"));
    }

    let cancel = CancelFlag::new();
    let handle = RealtimeHandle::new();
    let slot = state.workers.slot(WorkerKind::Realtime);

    let state_for_thread = state.clone();
    let handle_for_thread = handle.clone();
    let buffer_duration = request.buffer_duration;
    let (gate, gate_handle) = kotoba_core::start_gate();
    let worker_handle = std::thread::spawn(move || {
        if !gate.wait() {
            return;
        }
        let source = Box::new(NullAudioSource);
        let vad = Box::new(AlwaysSpeechVad);
        let _ = realtime_worker::run(
            &state_for_thread,
            ENGINE_NAMES[0],
            buffer_duration,
            source,
            vad,
            handle_for_thread,
        );
    });

    if let Err(_occupant) = slot.try_set(Occupant::new(worker_handle, cancel)) {
        gate_handle.release(false);
        return Err(AppError::busy().with_detail("realtime worker already running"));
    }
    gate_handle.release(true);

    *ACTIVE_HANDLE.lock().unwrap() = Some((handle, request.model_size));

    Ok(Json(serde_json::json!({ "message": "リアルタイム文字起こしを開始しました" })))
}

pub async fn stop(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let entry = ACTIVE_HANDLE.lock().unwrap().take();
    match entry {
        Some((handle, _)) => {
            handle.stop();
            if let Some(flag) = state.workers.slot(WorkerKind::Realtime).cancel_flag() {
                flag.cancel();
            }
            Ok(Json(serde_json::json!({ "message": "停止しました" })))
        }
        None => Err(AppError::not_found().with_detail("realtime worker is not running")),
    }
}

pub async fn pause() -> AppResult<Json<serde_json::Value>> {
    with_active_handle(|handle| handle.pause())
}

pub async fn resume() -> AppResult<Json<serde_json::Value>> {
    with_active_handle(|handle| handle.resume())
}

fn with_active_handle(f: impl FnOnce(&RealtimeHandle)) -> AppResult<Json<serde_json::Value>> {
    let guard = ACTIVE_HANDLE.lock().unwrap();
    match guard.as_ref() {
        Some((handle, _)) => {
            f(handle);
            Ok(Json(serde_json::json!({ "message": "ok" })))
        }
        None => Err(AppError::not_found().with_detail("realtime worker is not running")),
    }
}

pub async fn status() -> Json<RealtimeStatusResponse> {
    let guard = ACTIVE_HANDLE.lock().unwrap();
    match guard.as_ref() {
        Some((handle, model_size)) => Json(RealtimeStatusResponse {
            is_running: handle.is_running(),
            is_paused: handle.is_paused(),
            model_size: Some(model_size.clone()),
        }),
        None => Json(RealtimeStatusResponse {
            is_running: false,
            is_paused: false,
            model_size: None,
        }),
    }
}

/// A capture source with nothing behind it (audio capture is an external
/// collaborator, spec §1): yields silence at the expected cadence so the
/// loop structure runs without a real microphone wired in.
struct NullAudioSource;

impl crate::collaborators::AudioSource for NullAudioSource {
    fn read_frame(&mut self) -> AppResult<Vec<i16>> {
        std::thread::sleep(std::time::Duration::from_millis(30));
        Ok(vec![0i16; 480])
    }
}

struct AlwaysSpeechVad;

impl crate::collaborators::VoiceActivityDetector for AlwaysSpeechVad {
    fn is_speech(&mut self, _frame: &[i16], _sample_rate: u32) -> bool {
        true
    }
}
