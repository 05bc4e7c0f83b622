//! `POST /api/batch-transcribe` and `/cancel` (spec §6, §4.6). Grounded
//! on `original_source/src/api/routers/transcription.py`'s
//! `batch_transcribe`/`cancel_batch` handlers.

use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use kotoba_core::{CancelFlag, Occupant, WorkerKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::batch as batch_worker;
use crate::engine::ENGINE_NAMES;
use crate::errors::{AppError, AppResult};
use crate::handlers::allowed_roots;
use crate::state::AppState;
use crate::transcription::TranscriptionOptions;

#[derive(Deserialize)]
pub struct BatchTranscribeRequest {
    file_paths: Vec<String>,
    #[serde(default)]
    enable_diarization: bool,
    #[serde(default = "default_true")]
    remove_fillers: bool,
    #[serde(default = "default_true")]
    add_punctuation: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct BatchTranscribeResponse {
    message: String,
    total_files: usize,
}

const MAX_BATCH_FILES: usize = 100;

pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<BatchTranscribeRequest>,
) -> AppResult<Json<BatchTranscribeResponse>> {
    if request.file_paths.is_empty() || request.file_paths.len() > MAX_BATCH_FILES {
        return Err(AppError::validation().with_detail("file_paths must have 1-100 entries"));
    }

    let roots = allowed_roots();
    let mut validated_paths = Vec::with_capacity(request.file_paths.len());
    for raw in &request.file_paths {
        let validated = kotoba_core::paths::validate_path(&PathBuf::from(raw), &roots, true)
            .map_err(AppError::new)?;
        validated_paths.push(validated);
    }

    let cancel = CancelFlag::new();
    let worker_cancel = cancel.clone();
    let slot = state.workers.slot(WorkerKind::Batch);

    let options = TranscriptionOptions {
        enable_diarization: request.enable_diarization,
        enable_formatting: request.remove_fillers || request.add_punctuation,
        llm_provider: None,
    };
    let total = validated_paths.len();
    let state_for_thread = state.clone();

    let (gate, gate_handle) = kotoba_core::start_gate();
    let handle = std::thread::spawn(move || {
        if !gate.wait() {
            return;
        }
        let _ = batch_worker::run(
            &state_for_thread,
            ENGINE_NAMES[0],
            &validated_paths,
            &options,
            None,
            None,
            None,
            &worker_cancel,
        );
    });

    if let Err(_occupant) = slot.try_set(Occupant::new(handle, cancel)) {
        gate_handle.release(false);
        return Err(AppError::busy().with_detail("batch worker already running"));
    }
    gate_handle.release(true);

    Ok(Json(BatchTranscribeResponse {
        message: "バッチ処理を開始しました".to_string(),
        total_files: total,
    }))
}

pub async fn cancel(State(state): State<AppState>) -> AppResult<Json<Value>> {
    match state.workers.slot(WorkerKind::Batch).cancel_flag() {
        Some(flag) => {
            flag.cancel();
            Ok(Json(serde_json::json!({ "message": "キャンセルを要求しました" })))
        }
        None => Err(AppError::not_found().with_detail("no batch job in progress")),
    }
}
