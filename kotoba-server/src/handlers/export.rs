//! `POST /api/export/{format}` (spec §6, §8 Non-goals). Grounded on
//! `original_source/src/api/routers/export.py`: `txt`/`json` are simple
//! enough to implement natively; `docx`/`xlsx`/`srt`/`vtt` are the
//! explicitly out-of-scope exporters (spec §8) and report `Unsupported`
//! until a real exporter collaborator is wired in.

use std::fs;
use std::path::PathBuf;

use axum::extract::Path;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::handlers::allowed_roots;

const MAX_TEXT_LEN: usize = 10_000_000;
const MAX_SEGMENTS: usize = 100_000;

#[derive(Deserialize)]
pub struct ExportRequest {
    text: String,
    #[serde(default)]
    segments: Vec<Value>,
    output_path: String,
}

#[derive(Serialize)]
pub struct ExportResponse {
    success: bool,
    output_path: String,
    message: String,
}

fn expected_extension(format: &str) -> Option<&'static str> {
    match format {
        "txt" => Some("txt"),
        "docx" => Some("docx"),
        "xlsx" => Some("xlsx"),
        "srt" => Some("srt"),
        "vtt" => Some("vtt"),
        "json" => Some("json"),
        _ => None,
    }
}

pub async fn export(
    Path(format): Path<String>,
    Json(request): Json<ExportRequest>,
) -> AppResult<Json<ExportResponse>> {
    if request.text.len() > MAX_TEXT_LEN {
        return Err(AppError::validation().with_detail("text too long"));
    }
    if request.segments.len() > MAX_SEGMENTS {
        return Err(AppError::validation().with_detail("too many segments"));
    }

    let expected_ext = expected_extension(&format)
        .ok_or_else(|| AppError::validation().with_detail(format!("unknown export format: {format}")))?;

    let candidate = PathBuf::from(&request.output_path);
    let validated = kotoba_core::paths::validate_path(&candidate, &allowed_roots(), false)
        .map_err(AppError::new)?;

    let actual_ext = validated.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !actual_ext.is_empty() && !actual_ext.eq_ignore_ascii_case(expected_ext) {
        return Err(AppError::validation().with_detail("output path extension does not match format"));
    }

    match format.as_str() {
        "txt" => {
            fs::write(&validated, &request.text)?;
        }
        "json" => {
            let segments = if request.segments.is_empty() {
                vec![serde_json::json!({"text": request.text, "start": 0, "end": 0, "speaker": ""})]
            } else {
                request.segments.clone()
            };
            let payload = serde_json::json!({ "text": request.text, "segments": segments });
            fs::write(&validated, serde_json::to_vec_pretty(&payload)?)?;
        }
        "srt" | "vtt" => {
            if request.segments.is_empty() {
                return Err(AppError::validation().with_detail("segments required for subtitle export"));
            }
            return Err(AppError::unsupported().with_detail(format!("{format} exporter not installed")));
        }
        _ => {
            return Err(AppError::unsupported().with_detail(format!("{format} exporter not installed")));
        }
    }

    Ok(Json(ExportResponse {
        success: true,
        output_path: validated.to_string_lossy().to_string(),
        message: "エクスポートが完了しました".to_string(),
    }))
}
