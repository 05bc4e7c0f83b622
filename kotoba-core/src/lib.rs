//! Domain types and concurrency primitives shared by the Kotoba
//! transcription backend: events, token rotation, worker slots, the audio
//! ring buffer, the processed-file set, path validation, segment
//! normalization, and named progress checkpoints.
//!
//! Deliberately free of any `tokio`/`axum` dependency — the async/HTTP
//! machinery that consumes these types lives in the `kotoba-server`
//! binary crate.

pub mod error;
pub mod event;
pub mod paths;
pub mod processed_set;
pub mod progress;
pub mod ring_buffer;
pub mod segments;
pub mod token;
pub mod worker;

pub use error::ErrorCategory;
pub use event::{Event, SHUTDOWN_EVENT_TYPE};
pub use processed_set::{ProcessedFileSet, ProcessedSetError};
pub use ring_buffer::AudioRingBuffer;
pub use segments::{normalize_segments, Segment};
pub use token::TokenManager;
pub use worker::{start_gate, CancelFlag, Occupant, StartGate, StartGateHandle, WorkerKind, WorkerRegistry, WorkerSlot};
