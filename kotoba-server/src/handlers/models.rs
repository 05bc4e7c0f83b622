//! `/api/models/{engine}/{load,unload,info}` (spec §6). Grounded on
//! `original_source/src/api/routers/models.py`: the engine path segment
//! must be exactly `kotoba` or `faster-whisper`.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::engine::is_known_engine;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ModelInfoResponse {
    engine: String,
    is_loaded: bool,
}

fn require_known_engine(engine: &str) -> AppResult<()> {
    if is_known_engine(engine) {
        Ok(())
    } else {
        Err(AppError::validation().with_detail(format!("unknown engine: {engine}")))
    }
}

pub async fn load(
    State(state): State<AppState>,
    Path(engine): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    require_known_engine(&engine)?;
    state
        .engine
        .with_engine(&engine, state.config.engine_acquire_timeout(), |_| Ok(()))?;
    Ok(Json(serde_json::json!({ "message": "モデルをロードしました" })))
}

pub async fn unload(
    State(state): State<AppState>,
    Path(engine): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    require_known_engine(&engine)?;
    state.engine.unload(&engine, state.config.engine_acquire_timeout())?;
    Ok(Json(serde_json::json!({ "message": "モデルをアンロードしました" })))
}

pub async fn info(
    State(state): State<AppState>,
    Path(engine): Path<String>,
) -> AppResult<Json<ModelInfoResponse>> {
    require_known_engine(&engine)?;
    let is_loaded = state.engine.info(&engine, state.config.engine_acquire_timeout())?;
    Ok(Json(ModelInfoResponse { engine, is_loaded }))
}
