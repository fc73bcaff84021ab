// =============================================================================
// WebSocket Handler — push-based chart updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. An immediate chart snapshot on connect.
//   2. A fresh snapshot whenever the state_version has changed since the
//      last push, checked every 500 ms.
//
// The handler also responds to Ping frames with Pong frames and cleans up on
// disconnect.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::app_state::AppState;

/// Cadence at which the push loop checks for a changed state version.
const PUSH_POLL_MS: u64 = 500;

// =============================================================================
// WebSocket upgrade handler
// =============================================================================

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted — upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

// =============================================================================
// Connection handler
// =============================================================================

/// Manages a single WebSocket connection lifecycle: an initial snapshot,
/// then version-gated pushes interleaved with inbound frame handling.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut last_sent_version: u64 = 0;

    if let Err(e) = send_snapshot(&mut sender, &state, &mut last_sent_version).await {
        warn!(error = %e, "failed to send initial chart snapshot");
        return;
    }

    let mut ticker = interval(Duration::from_millis(PUSH_POLL_MS));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if state.current_state_version() != last_sent_version {
                    if let Err(e) = send_snapshot(&mut sender, &state, &mut last_sent_version).await {
                        debug!(error = %e, "WebSocket push failed — client gone");
                        break;
                    }
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }
}

/// Serialise and send the current chart snapshot, recording its version.
async fn send_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
    last_sent_version: &mut u64,
) -> anyhow::Result<()> {
    let snapshot = state.chart_snapshot();
    let payload =
        serde_json::to_string(&snapshot).context("failed to serialise chart snapshot")?;

    sender
        .send(Message::Text(payload))
        .await
        .context("failed to send WebSocket message")?;

    *last_sent_version = snapshot.state_version;
    Ok(())
}
