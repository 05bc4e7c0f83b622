//! `POST /api/transcribe` and `/api/transcribe/cancel` (spec §6, §4.5).
//! Grounded on `original_source/src/api/routers/transcription.py`'s
//! `transcribe_audio`/`cancel_transcription` handlers.

use std::path::PathBuf;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use kotoba_core::{CancelFlag, WorkerKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::ENGINE_NAMES;
use crate::errors::{AppError, AppResult};
use crate::handlers::allowed_roots;
use crate::state::AppState;
use crate::transcription::{self, TranscriptionOptions};

#[derive(Deserialize)]
pub struct TranscribeRequest {
    file_path: String,
    #[serde(default)]
    enable_diarization: bool,
    #[serde(default = "default_true")]
    remove_fillers: bool,
    #[serde(default = "default_true")]
    add_punctuation: bool,
    #[serde(default = "default_true")]
    format_paragraphs: bool,
    #[serde(default)]
    use_llm_correction: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct TranscribeResponse {
    text: String,
    segments: Vec<Value>,
    duration: Option<f64>,
}

/// Runs a single-file transcription synchronously on a dedicated OS
/// thread, blocking the request until it's done (spec §4.5 step order:
/// validate, then run the checkpointed pipeline to completion).
pub async fn transcribe(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> AppResult<Json<TranscribeResponse>> {
    let candidate = PathBuf::from(&request.file_path);
    let validated = kotoba_core::paths::validate_path(&candidate, &allowed_roots(), true)
        .map_err(AppError::new)?;
    if !validated.exists() {
        return Err(AppError::not_found().with_detail("file does not exist"));
    }

    let cancel = CancelFlag::new();
    let occupant_cancel = cancel.clone();
    let slot = state.workers.slot(WorkerKind::Transcription);

    let state_for_thread = state.clone();
    let path_for_thread = validated.clone();
    let options = TranscriptionOptions {
        enable_diarization: request.enable_diarization,
        enable_formatting: request.remove_fillers || request.add_punctuation || request.format_paragraphs,
        llm_provider: request.use_llm_correction.then(|| "local".to_string()),
    };

    let started = Instant::now();
    let (gate, gate_handle) = kotoba_core::start_gate();
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = std::thread::spawn(move || {
        if !gate.wait() {
            return;
        }
        let result = transcription::run(
            &state_for_thread,
            ENGINE_NAMES[0],
            &path_for_thread,
            &options,
            None,
            None,
            None,
            &occupant_cancel,
        );
        let _ = tx.send(result);
    });

    if let Err(_occupant) = slot.try_set(kotoba_core::Occupant::new(handle, cancel)) {
        gate_handle.release(false);
        return Err(AppError::busy().with_detail("transcription worker already running"));
    }
    gate_handle.release(true);

    let outcome = rx
        .recv()
        .map_err(|_| AppError::internal().with_detail("transcription thread disconnected"))??;

    Ok(Json(TranscribeResponse {
        text: outcome.text,
        segments: outcome
            .segments
            .into_iter()
            .map(|s| serde_json::json!({"text": s.text, "start": s.start, "end": s.end}))
            .collect(),
        duration: Some(started.elapsed().as_secs_f64()),
    }))
}

pub async fn cancel(State(state): State<AppState>) -> AppResult<Json<Value>> {
    match state.workers.slot(WorkerKind::Transcription).cancel_flag() {
        Some(flag) => {
            flag.cancel();
            Ok(Json(serde_json::json!({ "message": "キャンセルを要求しました" })))
        }
        None => Err(AppError::not_found().with_detail("no transcription in progress")),
    }
}
