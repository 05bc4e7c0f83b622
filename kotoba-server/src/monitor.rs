//! Folder watcher (spec §4.8 C8). Ported near-verbatim from
//! `original_source/src/folder_monitor.py`: polling scan, TOCTOU-hardened
//! readiness check, durable processed-set. State-machine/event-emission
//! shape grounded on `ferrex-server/src/infra/scan/scan_manager.rs`.

use std::fs::OpenOptions;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use kotoba_core::paths::SUPPORTED_EXTENSIONS;
use kotoba_core::ProcessedFileSet;

use crate::batch::SIDECAR_LABEL;
use crate::errors::AppResult;
use crate::state::AppState;

#[derive(Clone)]
pub struct MonitorHandle {
    running: Arc<AtomicBool>,
}

impl MonitorHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for MonitorHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `watched_dir` every `check_interval` and emits `new_files_detected`
/// for every file that is an audio/video file, not already processed, and
/// passes the readiness check. Runs until [`MonitorHandle::stop`].
pub fn run(
    state: &AppState,
    watched_dir: &Path,
    check_interval: Duration,
    capacity: usize,
    handle: MonitorHandle,
) -> AppResult<()> {
    let processed = ProcessedFileSet::load(watched_dir, capacity);

    while handle.is_running() {
        let found = scan_once(watched_dir, &processed)?;
        state.events.emit(
            "status_update",
            json!({ "watched_dir": watched_dir.to_string_lossy(), "found": found.len() }),
        );
        if !found.is_empty() {
            let absolute: Vec<String> = found.iter().map(|p| p.to_string_lossy().to_string()).collect();
            state.events.emit("new_files_detected", json!({ "paths": absolute }));
        }

        // Interruptible sleep: wake early if stopped mid-wait, matching
        // `_stop_event.wait(timeout=...)`'s early-return behavior.
        let step = Duration::from_millis(200);
        let mut waited = Duration::ZERO;
        while waited < check_interval && handle.is_running() {
            std::thread::sleep(step.min(check_interval - waited));
            waited += step;
        }
    }

    Ok(())
}

/// Collects files that are audio, not yet sidecar'd or processed, and
/// ready (spec §4.8). Deliberately does **not** mark discovered files as
/// processed itself: `original_source/src/folder_monitor.py`'s `run()`
/// leaves that to the caller, invoked only after a transcription actually
/// succeeds ("処理済みマークは文字起こし成功後にmain.pyから呼ばれる"). A
/// file that is discovered but whose downstream job never runs, crashes,
/// or fails must still be offered again by the next scan — marking it
/// here would silently and permanently drop it instead.
fn scan_once(watched_dir: &Path, processed: &ProcessedFileSet) -> AppResult<Vec<PathBuf>> {
    let mut ready = Vec::new();
    let entries = match std::fs::read_dir(watched_dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %watched_dir.display(), error = %err, "failed to scan watched directory");
            return Ok(ready);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_audio_file(&path) {
            continue;
        }
        if has_sidecar(&path) || processed.contains(&path) {
            continue;
        }
        if is_file_ready(&path) {
            ready.push(path);
        }
    }

    Ok(ready)
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn has_sidecar(path: &Path) -> bool {
    let stem = match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => stem,
        None => return false,
    };
    path.with_file_name(format!("{stem}_{SIDECAR_LABEL}.txt")).exists()
}

/// TOCTOU-hardened readiness check (spec §4.8): size must be non-zero,
/// an advisory exclusive lock must be obtainable (Unix only — see the
/// platform-gap note in `DESIGN.md`), a 1-byte read must succeed, and the
/// size must be stable across a 1 s recheck.
fn is_file_ready(path: &Path) -> bool {
    let size_before = match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => meta.len(),
        _ => return false,
    };

    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };

    #[cfg(unix)]
    {
        if !try_flock(&file) {
            return false;
        }
    }

    let mut probe = [0u8; 1];
    if file.read(&mut probe).is_err() {
        return false;
    }

    #[cfg(unix)]
    {
        unlock_flock(&file);
    }
    drop(file);

    std::thread::sleep(Duration::from_secs(1));
    matches!(std::fs::metadata(path), Ok(meta) if meta.len() == size_before)
}

#[cfg(unix)]
fn try_flock(file: &std::fs::File) -> bool {
    use std::os::unix::io::AsRawFd;
    // SAFETY: `fd` is a valid, open file descriptor for the duration of
    // this call.
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

#[cfg(unix)]
fn unlock_flock(file: &std::fs::File) {
    use std::os::unix::io::AsRawFd;
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_supported_extensions_case_insensitively() {
        assert!(is_audio_file(Path::new("clip.WAV")));
        assert!(is_audio_file(Path::new("clip.mp3")));
        assert!(!is_audio_file(Path::new("clip.txt")));
    }

    #[test]
    fn detects_existing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("meeting.wav");
        std::fs::write(&audio, b"data").unwrap();
        assert!(!has_sidecar(&audio));
        std::fs::write(dir.path().join("meeting_文字起こし.txt"), "done").unwrap();
        assert!(has_sidecar(&audio));
    }

    #[test]
    fn empty_file_is_never_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();
        assert!(!is_file_ready(&path));
    }
}
