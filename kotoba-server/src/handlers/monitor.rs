//! `/api/monitor/{start,stop,status,mark-processed}` (spec §6, §4.8).
//! Grounded on `original_source/src/api/routers/monitor.py`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use axum::extract::State;
use axum::Json;
use kotoba_core::{CancelFlag, Occupant, ProcessedFileSet, WorkerKind};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::handlers::allowed_roots;
use crate::monitor::{self as folder_monitor, MonitorHandle};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MonitorRequest {
    folder_path: String,
    #[serde(default = "default_check_interval")]
    check_interval: u64,
}

fn default_check_interval() -> u64 {
    10
}

#[derive(Serialize)]
pub struct MonitorStatusResponse {
    is_running: bool,
    folder_path: Option<String>,
    check_interval: u64,
    total_processed: usize,
    total_failed: usize,
}

#[derive(Deserialize)]
pub struct MarkProcessedRequest {
    file_path: String,
}

struct ActiveMonitor {
    handle: MonitorHandle,
    folder_path: String,
    check_interval: u64,
}

static ACTIVE_MONITOR: Lazy<Mutex<Option<ActiveMonitor>>> = Lazy::new(|| Mutex::new(None));
static TOTAL_FAILED: AtomicUsize = AtomicUsize::new(0);

pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<MonitorRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if !(5..=60).contains(&request.check_interval) {
        return Err(AppError::validation().with_detail("check_interval must be 5-60 seconds"));
    }

    let candidate = PathBuf::from(&request.folder_path);
    let validated = kotoba_core::paths::validate_path(&candidate, &allowed_roots(), false)
        .map_err(AppError::new)?;
    if !validated.is_dir() {
        return Err(AppError::not_found().with_detail("folder does not exist"));
    }

    let cancel = CancelFlag::new();
    let handle = MonitorHandle::new();
    let slot = state.workers.slot(WorkerKind::FolderMonitor);

    let state_for_thread = state.clone();
    let handle_for_thread = handle.clone();
    let dir_for_thread = validated.clone();
    let check_interval = request.check_interval;
    let capacity = state.config.processed_set_capacity;
    let (gate, gate_handle) = kotoba_core::start_gate();
    let worker_handle = std::thread::spawn(move || {
        if !gate.wait() {
            return;
        }
        let _ = folder_monitor::run(
            &state_for_thread,
            &dir_for_thread,
            std::time::Duration::from_secs(check_interval),
            capacity,
            handle_for_thread,
        );
    });

    if let Err(_occupant) = slot.try_set(Occupant::new(worker_handle, cancel)) {
        gate_handle.release(false);
        return Err(AppError::busy().with_detail("folder monitor already running"));
    }
    gate_handle.release(true);

    *ACTIVE_MONITOR.lock().unwrap() = Some(ActiveMonitor {
        handle,
        folder_path: validated.to_string_lossy().to_string(),
        check_interval,
    });

    Ok(Json(serde_json::json!({ "message": "フォルダ監視を開始しました" })))
}

pub async fn stop(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let entry = ACTIVE_MONITOR.lock().unwrap().take();
    match entry {
        Some(active) => {
            active.handle.stop();
            if let Some(occupant) = state.workers.slot(WorkerKind::FolderMonitor).take() {
                occupant.join_bounded(std::time::Duration::from_secs(5));
            }
            Ok(Json(serde_json::json!({ "message": "フォルダ監視を停止しました" })))
        }
        None => Err(AppError::not_found().with_detail("folder monitor is not running")),
    }
}

pub async fn status() -> Json<MonitorStatusResponse> {
    let guard = ACTIVE_MONITOR.lock().unwrap();
    match guard.as_ref() {
        Some(active) => Json(MonitorStatusResponse {
            is_running: active.handle.is_running(),
            folder_path: Some(active.folder_path.clone()),
            check_interval: active.check_interval,
            total_processed: 0,
            total_failed: TOTAL_FAILED.load(Ordering::SeqCst),
        }),
        None => Json(MonitorStatusResponse {
            is_running: false,
            folder_path: None,
            check_interval: default_check_interval(),
            total_processed: 0,
            total_failed: 0,
        }),
    }
}

pub async fn mark_processed(
    Json(request): Json<MarkProcessedRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let path = PathBuf::from(&request.file_path);
    let validated = kotoba_core::paths::validate_path(&path, &allowed_roots(), false)
        .map_err(AppError::new)?;
    let dir = validated
        .parent()
        .ok_or_else(|| AppError::validation().with_detail("path has no parent directory"))?;

    let mut set = ProcessedFileSet::load(dir, 50_000);
    set.mark_processed(validated)?;
    Ok(Json(serde_json::json!({ "message": "処理済みとしてマークしました" })))
}
