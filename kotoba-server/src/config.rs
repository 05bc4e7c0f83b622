//! Startup configuration (SPEC_FULL.md §12), grounded on the teacher's
//! `clap::Parser`-derived `Args` struct in its legacy `main.rs`: typed,
//! env-backed, constructed once at startup.

use std::time::Duration;

use clap::Parser;

/// Process-wide configuration, read once at startup and placed behind an
/// `Arc` in [`crate::state::AppState`].
#[derive(Debug, Clone, Parser)]
#[command(name = "kotoba-server", about = "Kotoba transcription backend core")]
pub struct Config {
    /// Requested TCP port; 0 means OS-chosen (spec §6).
    #[arg(long, env = "KOTOBA_PORT", default_value_t = 0)]
    pub port: u16,

    /// Bearer token TTL, in minutes (spec §6).
    #[arg(long, env = "KOTOBA_TOKEN_TTL_MINUTES", default_value_t = 60)]
    pub token_ttl_minutes: u64,

    /// Grace window after TTL during which the previous token is still
    /// valid, in minutes (spec §3/§5).
    #[arg(long, env = "KOTOBA_TOKEN_GRACE_MINUTES", default_value_t = 5)]
    pub token_grace_minutes: u64,

    /// When `true`, mounts `/docs`, `/openapi.json`, `/redoc` as public
    /// routes (spec §6).
    #[arg(long, env = "KOTOBA_DEV", default_value_t = false)]
    pub dev: bool,

    /// Engine mutex acquisition timeout, in milliseconds (spec §4.5).
    #[arg(long, env = "KOTOBA_ENGINE_ACQUIRE_TIMEOUT_MS", default_value_t = 1000)]
    pub engine_acquire_timeout_ms: u64,

    /// Maximum concurrent WebSocket connections, `M` in spec §4.3/§5.
    #[arg(long, env = "KOTOBA_MAX_WS_CONNECTIONS", default_value_t = 10)]
    pub max_ws_connections: usize,

    /// Per-subscriber event queue capacity, `Q` in spec §3/§5.
    #[arg(long, env = "KOTOBA_EVENT_QUEUE_CAPACITY", default_value_t = 1000)]
    pub event_queue_capacity: usize,

    /// Processed-file set capacity, `P` in spec §3/§5.
    #[arg(long, env = "KOTOBA_PROCESSED_SET_CAP", default_value_t = 50_000)]
    pub processed_set_capacity: usize,

    /// Folder-monitor scan cadence, in seconds (spec §4.8).
    #[arg(long, env = "KOTOBA_MONITOR_CHECK_INTERVAL_SECS", default_value_t = 10)]
    pub monitor_check_interval_secs: u64,

    /// Realtime worker flush window, in seconds (spec §4.7).
    #[arg(long, env = "KOTOBA_REALTIME_BUFFER_SECS", default_value_t = 3.0)]
    pub realtime_buffer_secs: f64,
}

impl Config {
    /// Parses configuration from environment variables (via `.env` if
    /// present) and CLI flags, the way the teacher's binary parses `Args`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_minutes * 60)
    }

    pub fn token_grace(&self) -> Duration {
        Duration::from_secs(self.token_grace_minutes * 60)
    }

    pub fn engine_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_acquire_timeout_ms)
    }

    pub fn monitor_check_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_check_interval_secs)
    }

    pub fn realtime_buffer_window(&self) -> Duration {
        Duration::from_secs_f64(self.realtime_buffer_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = Config::parse_from(["kotoba-server"]);
        assert_eq!(config.port, 0);
        assert_eq!(config.token_ttl_minutes, 60);
        assert_eq!(config.token_grace_minutes, 5);
        assert_eq!(config.max_ws_connections, 10);
        assert_eq!(config.event_queue_capacity, 1000);
        assert_eq!(config.processed_set_capacity, 50_000);
        assert!(!config.dev);
    }
}
