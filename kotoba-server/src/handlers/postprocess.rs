//! `/api/format-text`, `/api/correct-text`, `/api/diarize` (spec §6).
//! Grounded on `original_source/src/api/routers/postprocess.py`: all
//! three are thin dispatches onto an optional collaborator, reporting
//! `Unsupported` (501) when it isn't installed.

use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::collaborators::validate_provider;
use crate::errors::{AppError, AppResult};
use crate::handlers::allowed_roots;
use crate::state::AppState;

const MAX_TEXT_LEN: usize = 1_000_000;

#[derive(Deserialize)]
pub struct FormatTextRequest {
    text: String,
}

#[derive(Serialize)]
pub struct TextResponse {
    text: String,
}

pub async fn format_text(Json(request): Json<FormatTextRequest>) -> AppResult<Json<TextResponse>> {
    if request.text.len() > MAX_TEXT_LEN {
        return Err(AppError::validation().with_detail("text too long"));
    }
    // No formatter collaborator is installed by default (spec §1); the
    // pipeline's own formatting step (`transcription::run`) degrades to
    // the original text the same way.
    Err(AppError::unsupported().with_detail("no text formatter collaborator configured"))
}

#[derive(Deserialize)]
pub struct CorrectTextRequest {
    text: String,
    #[serde(default = "default_provider")]
    provider: String,
}

fn default_provider() -> String {
    "local".to_string()
}

pub async fn correct_text(Json(request): Json<CorrectTextRequest>) -> AppResult<Json<TextResponse>> {
    if request.text.len() > MAX_TEXT_LEN {
        return Err(AppError::validation().with_detail("text too long"));
    }
    validate_provider(&request.provider)?;

    if matches!(request.provider.as_str(), "claude" | "openai") {
        let env_var = if request.provider == "claude" {
            "ANTHROPIC_API_KEY"
        } else {
            "OPENAI_API_KEY"
        };
        if std::env::var(env_var).is_err() {
            return Err(AppError::validation().with_detail(format!("{env_var} is not set")));
        }
    }

    Err(AppError::unsupported().with_detail("no corrector collaborator configured"))
}

#[derive(Deserialize)]
pub struct DiarizeRequest {
    file_path: String,
    #[serde(default)]
    segments: Vec<serde_json::Value>,
}

#[derive(Serialize)]
pub struct DiarizeResponse {
    segments: Vec<serde_json::Value>,
}

const MAX_SEGMENTS: usize = 100_000;

pub async fn diarize(
    State(_state): State<AppState>,
    Json(request): Json<DiarizeRequest>,
) -> AppResult<Json<DiarizeResponse>> {
    if request.segments.len() > MAX_SEGMENTS {
        return Err(AppError::validation().with_detail("too many segments"));
    }

    let candidate = PathBuf::from(&request.file_path);
    let validated = kotoba_core::paths::validate_path(&candidate, &allowed_roots(), true)
        .map_err(AppError::new)?;
    if !validated.exists() {
        return Err(AppError::not_found().with_detail("file does not exist"));
    }

    Err(AppError::unsupported().with_detail("no diarization collaborator configured"))
}
