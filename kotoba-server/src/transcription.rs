//! Single-file transcription pipeline (spec §4.5 C5). Grounded on
//! `original_source/src/transcription_worker_base.py`'s exact step
//! ordering (validate → load → transcribe → optional diarize → optional
//! correct → emit) and checkpoint values, adapted to emit through the
//! Event Bus instead of Qt signals/callbacks.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use kotoba_core::{normalize_segments, CancelFlag, Segment};
use kotoba_core::progress::{
    PROGRESS_AFTER_TRANSCRIBE, PROGRESS_BEFORE_TRANSCRIBE, PROGRESS_COMPLETE,
    PROGRESS_DIARIZATION_START, PROGRESS_MODEL_LOADED, PROGRESS_MODEL_LOADING, PROGRESS_VALIDATED,
};

use crate::collaborators::{Corrector, Diarizer, TextFormatter};
use crate::errors::{AppError, AppResult};
use crate::event_bus::EventBus;
use crate::state::AppState;

/// Options threaded through a single transcription (spec §6
/// `/api/transcribe` request body).
#[derive(Debug, Clone, Default)]
pub struct TranscriptionOptions {
    pub enable_diarization: bool,
    pub enable_formatting: bool,
    pub llm_provider: Option<String>,
}

/// The pipeline's successful outcome: the plain text plus its normalized
/// segments (spec §3 "normalized segment").
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub text: String,
    pub segments: Vec<Segment>,
}

/// Runs the full checkpointed pipeline for one audio file, emitting
/// `progress` events at each checkpoint and a terminal `finished` or
/// `error` event. Cancellation is checked cooperatively at every
/// checkpoint boundary (spec §4.5 "checked at each checkpoint boundary").
pub fn run(
    state: &AppState,
    engine_name: &str,
    audio_path: &Path,
    options: &TranscriptionOptions,
    diarizer: Option<&dyn Diarizer>,
    formatter: Option<&dyn TextFormatter>,
    corrector: Option<&dyn Corrector>,
    cancel: &CancelFlag,
) -> AppResult<TranscriptionOutcome> {
    let events = &state.events;
    let path_str = audio_path.to_string_lossy().to_string();

    emit_progress(events, PROGRESS_VALIDATED);
    if bail_if_cancelled(events, cancel) {
        return Err(cancelled());
    }

    emit_progress(events, PROGRESS_MODEL_LOADING);
    if bail_if_cancelled(events, cancel) {
        return Err(cancelled());
    }

    let raw_result = state.engine.with_engine(
        engine_name,
        state.config.engine_acquire_timeout(),
        |engine| {
            emit_progress(events, PROGRESS_MODEL_LOADED);
            emit_progress(events, PROGRESS_BEFORE_TRANSCRIBE);
            let result = engine.transcribe(&path_str, true)?;
            emit_progress(events, PROGRESS_AFTER_TRANSCRIBE);
            Ok(result)
        },
    )?;

    if bail_if_cancelled(events, cancel) {
        return Err(cancelled());
    }

    let mut segments = normalize_segments(&raw_result);
    let mut text = raw_result
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    if options.enable_diarization {
        emit_progress(events, PROGRESS_DIARIZATION_START);
        if let Some(diarizer) = diarizer {
            match diarizer.diarize(&path_str, &raw_result) {
                Ok(diarized) => segments = normalize_segments(&diarized),
                Err(err) => {
                    // Collaborator failure degrades gracefully (spec
                    // §7 "pipeline continues, partial result returned").
                    tracing::warn!(error = %err, "diarization failed, continuing without speaker labels");
                }
            }
        } else {
            tracing::warn!("diarization requested but no diarizer collaborator is configured");
        }
    }

    if options.enable_formatting {
        if let Some(formatter) = formatter {
            if let Ok(formatted) = formatter.format(&text) {
                text = formatted;
            }
        }
    }

    if let Some(provider) = &options.llm_provider {
        if let Some(corrector) = corrector {
            if corrector.provider() == provider {
                if let Ok(corrected) = corrector.correct(&text) {
                    text = corrected;
                }
            }
        }
    }

    if bail_if_cancelled(events, cancel) {
        return Err(cancelled());
    }

    emit_progress(events, PROGRESS_COMPLETE);
    events.emit("finished", json!({ "text": text }));

    Ok(TranscriptionOutcome { text, segments })
}

fn emit_progress(events: &Arc<EventBus>, percentage: u8) {
    events.emit("progress", json!({ "percentage": percentage }));
}

fn bail_if_cancelled(events: &Arc<EventBus>, cancel: &CancelFlag) -> bool {
    if cancel.is_cancelled() {
        events.emit("error", json!({ "category": "cancelled" }));
        true
    } else {
        false
    }
}

fn cancelled() -> AppError {
    AppError::new(kotoba_core::ErrorCategory::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::settings::SettingsStore;
    use clap::Parser;

    fn test_state() -> AppState {
        let config = Config::parse_from(["kotoba-server"]);
        let settings = SettingsStore::load(std::path::Path::new("/nonexistent"), None);
        let state = AppState::new(config, settings);
        state.engine.with_engine("kotoba", std::time::Duration::from_millis(10), |_| Ok(())).ok();
        state
    }

    #[test]
    fn cancellation_before_load_skips_finished_event() {
        let state = test_state();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = run(
            &state,
            "kotoba",
            Path::new("clip.wav"),
            &TranscriptionOptions::default(),
            None,
            None,
            None,
            &cancel,
        );
        assert!(result.is_err());
    }
}
