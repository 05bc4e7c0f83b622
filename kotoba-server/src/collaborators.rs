//! The external-collaborator seam (spec §1, §8 Non-goals). The inference
//! engine, diarizer, text formatter, LLM corrector and rich-format
//! exporters are all heavyweight, optional dependencies the teacher never
//! pulls in; this core only defines the trait boundary an embedder wires
//! a real implementation into. Grounded on
//! `original_source/src/transcription_engine.py`'s `is_loaded`/`load_model`/
//! `transcribe` surface and the provider-name validation in
//! `original_source/src/api/routers/postprocess.py`.

use serde_json::Value;

use crate::errors::{AppError, AppResult};

/// A loadable speech-to-text engine. `load_model`/`transcribe` are
/// blocking calls made from a worker thread, never from an async task —
/// the engine itself is not required to be `Send`-safe across awaits,
/// only across threads.
pub trait TranscriptionEngine: Send + Sync {
    fn is_loaded(&self) -> bool;
    fn load_model(&self) -> AppResult<()>;
    /// Returns the engine's raw result object (spec §4.5's "engine
    /// result", later normalized via `kotoba_core::normalize_segments`).
    fn transcribe(&self, audio_path: &str, return_timestamps: bool) -> AppResult<Value>;
    /// Transcribes an in-memory chunk of mono samples, used by the
    /// realtime worker's flush step (spec §4.7), grounded on
    /// `original_source/src/faster_whisper_engine.py`'s
    /// `transcribe_stream(audio_chunk, sample_rate)`. Returns `None` when
    /// the chunk produced no recognizable speech.
    fn transcribe_samples(&self, samples: &[f32], sample_rate: u32) -> AppResult<Option<String>>;
    fn unload_model(&self);
}

/// Speaker diarization, applied to an already-transcribed result outside
/// the engine mutex (spec §4.5 step 5).
pub trait Diarizer: Send + Sync {
    fn diarize(&self, audio_path: &str, result: &Value) -> AppResult<Value>;
}

/// Reformats raw transcription text (punctuation, paragraphing, etc.).
pub trait TextFormatter: Send + Sync {
    fn format(&self, text: &str) -> AppResult<String>;
}

/// LLM-backed correction, keyed by provider name (`local`/`claude`/
/// `openai` per spec §6).
pub trait Corrector: Send + Sync {
    fn provider(&self) -> &'static str;
    fn correct(&self, text: &str) -> AppResult<String>;
}

/// A single 30 ms microphone frame, int16 PCM (spec §4.7). Audio capture
/// itself is an external collaborator (spec §1 "audio decoding"); this
/// trait is the narrow interface the realtime worker pulls frames
/// through.
pub trait AudioSource: Send {
    /// Blocks until the next frame is available, or returns `Err` if the
    /// underlying stream failed.
    fn read_frame(&mut self) -> AppResult<Vec<i16>>;
}

/// Voice activity detection over a frame of samples (spec §4.7's VAD
/// gate). Implementations that fail default to "is speech", matching
/// `realtime_worker.py`'s fail-open behavior so a flaky VAD never
/// silently discards audio.
pub trait VoiceActivityDetector: Send {
    fn is_speech(&mut self, frame: &[i16], sample_rate: u32) -> bool;
}

/// `/api/export/{format}` formats requiring a library the teacher's
/// stack doesn't carry (DOCX/XLSX/SRT/VTT, spec §8 Non-goals). `txt`/
/// `json` are simple enough to implement natively (see
/// `handlers::export`) and so have no collaborator trait; anything else
/// reports [`ErrorCategory::Unsupported`] until a real exporter is wired
/// in, matching the "absence is reported as unsupported (501)" rule.
pub trait Exporter: Send + Sync {
    fn format_name(&self) -> &'static str;
    fn export(&self, output_path: &str, text: &str, segments: &[kotoba_core::Segment]) -> AppResult<()>;
}

/// Looks up a corrector by provider name, 400ing on an unrecognized one
/// (mirrors `postprocess.py`'s provider validation).
pub fn validate_provider(provider: &str) -> AppResult<()> {
    match provider {
        "local" | "claude" | "openai" => Ok(()),
        _ => Err(AppError::validation().with_detail(format!("unknown provider: {provider}"))),
    }
}

/// A stub engine used by integration tests (SPEC_FULL.md §15), grounded
/// on the same role `conftest.py`-style fakes play in the source's test
/// suite: always "succeeds" with a fixed, deterministic transcript so the
/// pipeline's checkpoint/emit sequence can be exercised without a real
/// model.
pub struct FakeTranscriptionEngine {
    loaded: std::sync::atomic::AtomicBool,
}

impl Default for FakeTranscriptionEngine {
    fn default() -> Self {
        Self {
            loaded: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl TranscriptionEngine for FakeTranscriptionEngine {
    fn is_loaded(&self) -> bool {
        self.loaded.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn load_model(&self) -> AppResult<()> {
        self.loaded.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn transcribe(&self, _audio_path: &str, _return_timestamps: bool) -> AppResult<Value> {
        Ok(serde_json::json!({
            "text": "テスト音声です",
            "chunks": [
                {"text": "テスト音声です", "timestamp": [0.0, 1.5]}
            ]
        }))
    }

    fn transcribe_samples(&self, samples: &[f32], _sample_rate: u32) -> AppResult<Option<String>> {
        if samples.is_empty() {
            Ok(None)
        } else {
            Ok(Some("テスト音声です".to_string()))
        }
    }

    fn unload_model(&self) {
        self.loaded.store(false, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_provider() {
        assert!(validate_provider("grok").is_err());
        assert!(validate_provider("local").is_ok());
    }

    #[test]
    fn fake_engine_round_trips_load_state() {
        let engine = FakeTranscriptionEngine::default();
        assert!(!engine.is_loaded());
        engine.load_model().unwrap();
        assert!(engine.is_loaded());
        let result = engine.transcribe("clip.wav", true).unwrap();
        assert_eq!(result["text"], "テスト音声です");
    }
}
