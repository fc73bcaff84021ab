// =============================================================================
// candleview — Main Entry Point
// =============================================================================
//
// Live kline ingestion for one selectable (symbol, interval) pair, with a
// durable per-symbol series cache and an HTTP surface for the chart renderer.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod config;
mod market_data;
mod selection;
mod store;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::RuntimeConfig;
use crate::selection::{SelectionCommand, SelectionController};
use crate::store::SeriesStore;

/// Runtime config file next to the binary.
const CONFIG_PATH: &str = "candleview.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("candleview starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();

    info!(
        symbol = %config.default_symbol,
        interval = %config.default_interval,
        cache_dir = %config.cache_dir,
        "configured"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let store = Arc::new(SeriesStore::open(&config.cache_dir)?);

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let state = Arc::new(AppState::new(
        config.default_symbol,
        config.default_interval,
        command_tx.clone(),
    ));

    // ── 3. Selection controller ──────────────────────────────────────────
    // Owns the accumulator and the one live subscription; everything else
    // talks to it through the command channel.
    let controller = SelectionController::new(
        state.clone(),
        store,
        config.default_symbol,
        config.default_interval,
        command_rx,
    );
    let controller_task = tokio::spawn(controller.run());

    // ── 4. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = config.bind_addr.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr = %bind_addr, error = %e, "failed to bind API server");
                return;
            }
        };
        info!(addr = %bind_addr, "API server listening");
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("running — press Ctrl+C to stop");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received — stopping gracefully");

    if command_tx.send(SelectionCommand::Shutdown).is_ok() {
        let _ = controller_task.await;
    }

    // Persist the last-used selection as the next startup default.
    let (symbol, interval) = *state.selection.read();
    config.default_symbol = symbol;
    config.default_interval = interval;
    if let Err(e) = config.save(CONFIG_PATH) {
        error!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("candleview shut down complete");
    Ok(())
}
