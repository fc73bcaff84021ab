// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The chart renderer polls or subscribes
// here; the two selection endpoints enqueue transitions for the selection
// controller rather than mutating anything directly.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::app_state::AppState;
use crate::selection::SelectionCommand;
use crate::types::{Interval, Symbol};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/chart", get(chart))
        .route("/api/v1/selection", get(selection))
        .route("/api/v1/selection/symbol", post(select_symbol))
        .route("/api/v1/selection/interval", post(select_interval))
        // ── WebSocket (handled in the ws module but mounted here) ────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Chart projection
// =============================================================================

async fn chart(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.chart_snapshot())
}

// =============================================================================
// Selection
// =============================================================================

#[derive(Serialize)]
struct SelectionOption<T> {
    value: T,
    label: &'static str,
}

#[derive(Serialize)]
struct SelectionResponse {
    symbol: Symbol,
    interval: Interval,
    symbols: Vec<SelectionOption<Symbol>>,
    intervals: Vec<SelectionOption<Interval>>,
}

async fn selection(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (symbol, interval) = *state.selection.read();

    let resp = SelectionResponse {
        symbol,
        interval,
        symbols: Symbol::ALL
            .iter()
            .map(|s| SelectionOption {
                value: *s,
                label: s.label(),
            })
            .collect(),
        intervals: Interval::ALL
            .iter()
            .map(|i| SelectionOption {
                value: *i,
                label: i.label(),
            })
            .collect(),
    };
    Json(resp)
}

#[derive(Deserialize)]
struct SelectSymbolRequest {
    symbol: Symbol,
}

async fn select_symbol(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectSymbolRequest>,
) -> impl IntoResponse {
    dispatch(&state, SelectionCommand::SelectSymbol(req.symbol))
}

#[derive(Deserialize)]
struct SelectIntervalRequest {
    interval: Interval,
}

async fn select_interval(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectIntervalRequest>,
) -> impl IntoResponse {
    dispatch(&state, SelectionCommand::SelectInterval(req.interval))
}

/// Enqueue a command for the selection controller.
fn dispatch(state: &AppState, cmd: SelectionCommand) -> (StatusCode, Json<serde_json::Value>) {
    match state.commands.send(cmd) {
        Ok(()) => (StatusCode::ACCEPTED, Json(serde_json::json!({ "ok": true }))),
        Err(e) => {
            warn!(error = %e, "selection controller unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "ok": false })),
            )
        }
    }
}
