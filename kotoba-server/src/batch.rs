//! Sequential batch orchestration (spec §4.6 C6). Grounded on
//! `original_source/src/batch_processor.py`'s counters/queue shape and
//! `original_source/src/constants.py`'s `BATCH_WORKERS_MAX = 1` rationale
//! (the engine mutex serializes anyway, so sequencing avoids thread-pool
//! lifetime complexity, per spec §4.6).

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use kotoba_core::CancelFlag;

use crate::collaborators::{Corrector, Diarizer, TextFormatter};
use crate::errors::AppResult;
use crate::state::AppState;
use crate::transcription::{self, TranscriptionOptions};

/// Japanese label used for batch sidecar files, matching the source's
/// `<stem>_文字起こし.txt` naming.
pub(crate) const SIDECAR_LABEL: &str = "文字起こし";

#[derive(Debug, Default)]
pub struct BatchCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Processes `paths` one at a time through the same pipeline as a single
/// transcription, emitting `batch_progress` per item and `batch_finished`
/// at the end. Cancellation is checked between items; a cancellation
/// mid-item is passed down into that item's own checkpoint checks.
pub fn run(
    state: &AppState,
    engine_name: &str,
    paths: &[PathBuf],
    options: &TranscriptionOptions,
    diarizer: Option<&dyn Diarizer>,
    formatter: Option<&dyn TextFormatter>,
    corrector: Option<&dyn Corrector>,
    cancel: &CancelFlag,
) -> AppResult<BatchCounts> {
    let events = &state.events;
    let mut counts = BatchCounts {
        total: paths.len(),
        ..Default::default()
    };

    for (index, path) in paths.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        events.emit(
            "batch_progress",
            json!({
                "index": index,
                "total": counts.total,
                "path": path.to_string_lossy(),
            }),
        );

        match transcription::run(
            state,
            engine_name,
            path,
            options,
            diarizer,
            formatter,
            corrector,
            cancel,
        ) {
            Ok(outcome) => {
                if let Err(err) = write_sidecar(path, &outcome.text) {
                    tracing::error!(path = %path.display(), error = %err, "failed to write batch sidecar");
                    counts.failed += 1;
                } else {
                    counts.succeeded += 1;
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "batch item failed");
                counts.failed += 1;
            }
        }
    }

    events.emit(
        "batch_finished",
        json!({
            "total": counts.total,
            "succeeded": counts.succeeded,
            "failed": counts.failed,
        }),
    );

    Ok(counts)
}

/// Writes `<stem>_文字起こし.txt` next to `source`, atomically (temp file
/// + rename), mirroring `kotoba_core::processed_set`'s write discipline.
fn write_sidecar(source: &Path, text: &str) -> std::io::Result<()> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    let sidecar_path = dir.join(format!("{stem}_{SIDECAR_LABEL}.txt"));
    let temp_path = dir.join(format!("{stem}_{SIDECAR_LABEL}.txt.tmp"));

    let write_result = (|| -> std::io::Result<()> {
        fs::write(&temp_path, text)?;
        let file = fs::File::open(&temp_path)?;
        file.sync_all()?;
        fs::rename(&temp_path, &sidecar_path)?;
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    write_result
}
