// =============================================================================
// ticker-hub — Main Entry Point
// =============================================================================
//
// Single long-running process: loads config, opens the store, constructs
// both upstream adapters, spawns the two independent scheduler jobs
// (equities/crypto, forex), and serves the REST API. Shutdown is
// cooperative — a Ctrl+C signal stops new scheduler ticks and hands the
// axum server a graceful-shutdown future so in-flight handlers finish.
// =============================================================================

mod api;
mod app_state;
mod config;
mod error;
mod model;
mod normalizer;
mod scheduler;
mod store;
mod types;
mod upstream;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::HubConfig;
use crate::error::HubError;
use crate::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    let config = HubConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("ticker-hub starting up");

    if let Err(e) = std::fs::create_dir_all(&config.state_dir) {
        error!(error = %e, dir = ?config.state_dir, "failed to create state directory");
        return Err(HubError::FatalConfig(format!("cannot create state dir: {e}")).into());
    }
    // Logging goes to stdout via `tracing`; the log-dir flag is read for CLI
    // parity with the out-of-scope admin tooling but the hub itself doesn't
    // write log files there.
    let _ = std::fs::create_dir_all(&config.log_dir);

    let db_path = config.db_path();
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| HubError::FatalConfig("state-dir path is not valid UTF-8".into()))?;

    let store = Store::new(db_path_str)
        .await
        .map_err(|e| HubError::FatalConfig(format!("failed to open store: {e}")))?;

    if let Some(key) = &config.forex_api_key {
        if store.get_credential("twelvedata").await.unwrap_or(None).is_none() {
            info!("seeding twelvedata credential from TICKER_HUB_FOREX_API_KEY");
            if let Err(e) = store.put_credential("twelvedata", key, "").await {
                warn!(error = %e, "failed to seed forex credential from environment");
            }
        }
    }

    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState::new(store, config));

    // ── Scheduler jobs ────────────────────────────────────────────────
    let general_state = state.clone();
    let general_handle = tokio::spawn(async move {
        scheduler::run_general_job(general_state).await;
    });

    let forex_state = state.clone();
    let forex_handle = tokio::spawn(async move {
        scheduler::run_forex_job(forex_state).await;
    });

    // `running` starts false and is recomputed by each tick from the store's
    // enabled-asset count (spec scenario A: an empty hub reports
    // running:false until assets are added) — no unconditional flip here.
    //
    // One immediate tick per class on startup, matching spec §2's flow:
    // "D registers recurring jobs and runs one immediate refresh per class".
    state.scheduler.trigger_refresh();

    // ── HTTP server ───────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| HubError::FatalConfig(format!("failed to bind {bind_addr}: {e}")))?;
    info!(addr = %bind_addr, "REST API listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!(error = %e, "REST API server exited with error");
    }

    info!("shutdown signal received — stopping scheduler ticks");
    state.scheduler.request_shutdown();

    // Wake both jobs so they observe the shutdown flag instead of waiting
    // out a full interval before exiting.
    state.scheduler.trigger_refresh();
    let _ = tokio::join!(general_handle, forex_handle);

    info!("ticker-hub shut down complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Ctrl+C received"),
        Err(e) => error!(error = %e, "failed to install Ctrl+C handler"),
    }
}
