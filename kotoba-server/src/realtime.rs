//! Realtime streaming transcription worker (spec §4.7 C7). Ported
//! almost line-for-line from `original_source/src/api/realtime_worker.py`:
//! 30 ms frame capture, throttled volume reporting, VAD-gated flush, a
//! 60 s ring buffer with overflow-shift (`kotoba_core::ring_buffer`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use kotoba_core::AudioRingBuffer;

use crate::collaborators::{AudioSource, VoiceActivityDetector};
use crate::errors::AppResult;
use crate::state::AppState;

const SAMPLE_RATE: u32 = 16_000;
const FRAME_DURATION_SECS: f64 = 0.03;
const VOLUME_THROTTLE: Duration = Duration::from_millis(100);
/// Minimum buffered duration, in samples, below which a flush candidate
/// is discarded rather than transcribed (spec §4.7 "< 0.3 s").
const MIN_FLUSH_SAMPLES: usize = (SAMPLE_RATE as f64 * 0.3) as usize;
/// Non-speech buffered duration, in samples, above which a flush is
/// triggered even without hitting the full buffer window (spec §4.7
/// "non-speech with > 0.5 s buffered").
const NON_SPEECH_FLUSH_SAMPLES: usize = (SAMPLE_RATE as f64 * 0.5) as usize;

/// Shared run/pause flags, held by the HTTP handlers that start/stop/
/// pause/resume the worker and by the capture loop itself.
#[derive(Clone)]
pub struct RealtimeHandle {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl RealtimeHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

impl Default for RealtimeHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the capture→VAD→flush loop until [`RealtimeHandle::stop`] is
/// called. Intended to run on its own OS thread (spec §5: "every worker
/// is a real OS thread").
pub fn run(
    state: &AppState,
    engine_name: &str,
    buffer_duration_secs: f64,
    mut source: Box<dyn AudioSource>,
    mut vad: Box<dyn VoiceActivityDetector>,
    handle: RealtimeHandle,
) -> AppResult<()> {
    let events = &state.events;
    let buffer_samples = (SAMPLE_RATE as f64 * buffer_duration_secs) as usize;
    let mut ring = AudioRingBuffer::with_default_capacity();
    let mut last_volume_emit = Instant::now() - VOLUME_THROTTLE;

    events.emit("status_changed", json!({ "status": "開始しました" }));

    while handle.is_running() {
        if handle.is_paused() {
            std::thread::sleep(Duration::from_millis(100));
            continue;
        }

        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(error = %err, "audio capture failed, stopping realtime worker");
                break;
            }
        };

        let float_frame: Vec<f32> = frame.iter().map(|&s| s as f32 / 32768.0).collect();

        if last_volume_emit.elapsed() >= VOLUME_THROTTLE {
            let volume = rms(&float_frame);
            events.emit("volume_changed", json!({ "volume": volume }));
            last_volume_emit = Instant::now();
        }

        ring.push(&float_frame);

        let is_speech = vad.is_speech(&frame, SAMPLE_RATE);
        let buffered = ring.len();
        let should_flush = buffered >= buffer_samples || (!is_speech && buffered > NON_SPEECH_FLUSH_SAMPLES);

        if should_flush {
            if buffered > MIN_FLUSH_SAMPLES {
                let samples = ring.take();
                process_buffer(state, engine_name, &samples);
            } else {
                ring.discard();
            }
        }
    }

    events.emit("status_changed", json!({ "status": "停止しました" }));
    Ok(())
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    frame.iter().map(|s| s.abs()).sum::<f32>() / frame.len() as f32
}

fn process_buffer(state: &AppState, engine_name: &str, samples: &[f32]) {
    let result = state.engine.with_engine(
        engine_name,
        state.config.engine_acquire_timeout(),
        |engine| engine.transcribe_samples(samples, SAMPLE_RATE),
    );

    match result {
        Ok(Some(text)) if !text.is_empty() => {
            state.events.emit("text_ready", json!({ "text": text }));
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(error = %err, "realtime transcription chunk failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_square_wave_is_one() {
        assert_eq!(rms(&[1.0, -1.0, 1.0, -1.0]), 1.0);
    }

    #[test]
    fn handle_starts_running_and_unpaused() {
        let handle = RealtimeHandle::new();
        assert!(handle.is_running());
        assert!(!handle.is_paused());
        handle.pause();
        assert!(handle.is_paused());
        handle.stop();
        assert!(!handle.is_running());
    }
}
