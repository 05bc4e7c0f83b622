//! Shared application state (SPEC_FULL.md §12), grounded on
//! `ferrex-server/src/infra/app_state.rs`'s `Arc`-wrapped-services
//! pattern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kotoba_core::{TokenManager, WorkerRegistry};

use crate::connection::ConnectionManager;
use crate::config::Config;
use crate::engine::EngineRegistry;
use crate::event_bus::EventBus;
use crate::settings::SettingsStore;

/// Services threaded through every handler. Cheap to clone: every field
/// is `Arc`-wrapped, matching the teacher's `#[derive(Clone)]` `AppState`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenManager>,
    pub events: Arc<EventBus>,
    pub connections: Arc<ConnectionManager>,
    pub workers: Arc<WorkerRegistry>,
    pub settings: Arc<SettingsStore>,
    pub engine: Arc<EngineRegistry>,
    /// Set once by `/api/shutdown` so a second call reports `Busy`
    /// instead of re-triggering the signal (spec §6, grounded on
    /// `original_source/src/api/routers/health.py`'s `_shutdown_requested`
    /// flag).
    shutdown_requested: Arc<AtomicBool>,
    pub shutdown_notify: Arc<tokio::sync::Notify>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: Config, settings: SettingsStore) -> Self {
        let config = Arc::new(config);
        Self {
            tokens: Arc::new(TokenManager::new(config.token_ttl(), config.token_grace())),
            events: Arc::new(EventBus::new(config.event_queue_capacity)),
            connections: Arc::new(ConnectionManager::new(config.max_ws_connections)),
            workers: Arc::new(WorkerRegistry::new()),
            settings: Arc::new(settings),
            engine: Arc::new(EngineRegistry::production()),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(tokio::sync::Notify::new()),
            config,
        }
    }

    /// Atomically marks shutdown as requested. Returns `true` if this
    /// call is the one that set it (the caller should trigger the actual
    /// shutdown sequence); `false` if it was already requested.
    pub fn begin_shutdown(&self) -> bool {
        self.shutdown_requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}
