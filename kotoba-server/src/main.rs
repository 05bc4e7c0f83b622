//! Entry point for the Kotoba transcription backend core. Grounded on
//! `ferrex-server`'s legacy `main.rs`: parse config, init tracing,
//! construct services, bind, serve, then drive graceful shutdown.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use kotoba_core::WorkerKind;
use tracing_subscriber::EnvFilter;

use kotoba_server::config::Config;
use kotoba_server::settings::SettingsStore;
use kotoba_server::state::AppState;
use kotoba_server::handlers;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("kotoba_server=info,kotoba_core=info,tower_http=warn")
        }))
        .init();

    let config = Config::from_env();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let data_dir = data_dir();
    let config_path = find_config_yaml();
    let settings = SettingsStore::load(&data_dir, config_path.as_deref());

    let state = AppState::new(config, settings);
    state.events.bind_scheduler(tokio::runtime::Handle::current());

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", state.config.port)).await?;
    let bound_addr = listener.local_addr()?;

    let startup_line = serde_json::json!({
        "port": bound_addr.port(),
        "host": bound_addr.ip().to_string(),
        "token": state.tokens.current_token(),
    });
    println!("{startup_line}");
    std::io::stdout().flush()?;

    tracing::info!(port = bound_addr.port(), "kotoba-server listening");

    let shutdown_notify = state.shutdown_notify.clone();
    let app = handlers::build_router(state.clone());

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = shutdown_notify.notified() => {}
            }
        })
        .await;

    if let Err(err) = serve_result {
        tracing::error!(error = %err, "server exited with an error");
    }

    shutdown_workers(&state);
    state.events.shutdown();
    tracing::info!("shutdown complete");

    Ok(())
}

/// Graceful shutdown sequence (spec §5): cancel the transcription
/// worker, cancel the batch worker (join ≤ 10 s), stop the realtime
/// worker, stop the folder monitor (join ≤ 5 s), then shut down the
/// Event Bus.
fn shutdown_workers(state: &AppState) {
    if let Some(flag) = state.workers.slot(WorkerKind::Transcription).cancel_flag() {
        flag.cancel();
    }

    if let Some(flag) = state.workers.slot(WorkerKind::Batch).cancel_flag() {
        flag.cancel();
    }
    if let Some(occupant) = state.workers.slot(WorkerKind::Batch).take() {
        occupant.join_bounded(Duration::from_secs(10));
    }

    if let Some(flag) = state.workers.slot(WorkerKind::Realtime).cancel_flag() {
        flag.cancel();
    }

    if let Some(flag) = state.workers.slot(WorkerKind::FolderMonitor).cancel_flag() {
        flag.cancel();
    }
    if let Some(occupant) = state.workers.slot(WorkerKind::FolderMonitor).take() {
        occupant.join_bounded(Duration::from_secs(5));
    }
}

fn data_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".kotoba-transcriber")
}

fn find_config_yaml() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("config/config.yaml"),
        PathBuf::from("config.yaml"),
    ];
    candidates.into_iter().find(|path| path.exists())
}
