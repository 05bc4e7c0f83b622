//! Library surface for the Kotoba transcription backend core. Split out
//! of the binary crate so `tests/` integration suites can build a real
//! `axum::Router` over a real `AppState` (with a test-double engine)
//! instead of talking to the process over the network, following
//! `ferrex-server`'s lib+bin split.

pub mod batch;
pub mod collaborators;
pub mod config;
pub mod connection;
pub mod engine;
pub mod errors;
pub mod event_bus;
pub mod handlers;
pub mod middleware;
pub mod monitor;
pub mod realtime;
pub mod settings;
pub mod state;
pub mod transcription;
