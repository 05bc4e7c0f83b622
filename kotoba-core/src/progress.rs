//! Named progress checkpoints (spec §4.5, SPEC_FULL.md §16), replacing the
//! bare literals `constants.py::SharedConstants` scatters through the
//! Python pipeline with named constants — the teacher's own preference,
//! as seen in `media_event_bus.rs`'s `HISTORY_CAPACITY`.

/// Input validated, about to start loading the inference collaborator.
pub const PROGRESS_VALIDATED: u8 = 5;
/// Engine mutex acquired, model load starting.
pub const PROGRESS_MODEL_LOADING: u8 = 10;
/// Model loaded, about to hand audio to the inference collaborator.
pub const PROGRESS_MODEL_LOADED: u8 = 20;
/// Audio decoded, transcription call about to start.
pub const PROGRESS_BEFORE_TRANSCRIBE: u8 = 40;
/// Transcription call returned.
pub const PROGRESS_AFTER_TRANSCRIBE: u8 = 70;
/// Optional diarization pass starting.
pub const PROGRESS_DIARIZATION_START: u8 = 80;
/// Pipeline finished; paired with the terminal `finished` event.
pub const PROGRESS_COMPLETE: u8 = 100;

/// The checkpoint sequence spec §4.5 requires progress events to hit, in
/// order, absent cancellation.
pub const CHECKPOINT_SEQUENCE: [u8; 7] = [
    PROGRESS_VALIDATED,
    PROGRESS_MODEL_LOADING,
    PROGRESS_MODEL_LOADED,
    PROGRESS_BEFORE_TRANSCRIBE,
    PROGRESS_AFTER_TRANSCRIBE,
    PROGRESS_DIARIZATION_START,
    PROGRESS_COMPLETE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_are_non_decreasing_and_end_at_complete() {
        let mut prev = 0u8;
        for &checkpoint in &CHECKPOINT_SEQUENCE {
            assert!(checkpoint >= prev);
            prev = checkpoint;
        }
        assert_eq!(*CHECKPOINT_SEQUENCE.last().unwrap(), PROGRESS_COMPLETE);
    }
}
