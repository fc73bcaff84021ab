// =============================================================================
// Shared application state
// =============================================================================
//
// Glue between the selection controller and the HTTP surface. The controller
// is the only writer of the chart projection; HTTP handlers read the latest
// snapshot and enqueue selection commands through the command channel.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the published projection and selection view.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::market_data::ChartData;
use crate::selection::SelectionCommand;
use crate::types::{Interval, Symbol};

/// State shared across async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, bumped on every published
    /// update. The WebSocket feed uses it to detect changes.
    pub state_version: AtomicU64,

    /// The selection currently driving the subscription, for display.
    pub selection: RwLock<(Symbol, Interval)>,

    /// Latest chart projection of the active series.
    pub chart: RwLock<ChartData>,

    /// Command channel into the selection controller.
    pub commands: UnboundedSender<SelectionCommand>,

    /// Instant when the service was started. Used for uptime reporting.
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(
        symbol: Symbol,
        interval: Interval,
        commands: UnboundedSender<SelectionCommand>,
    ) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            selection: RwLock::new((symbol, interval)),
            chart: RwLock::new(ChartData::default()),
            commands,
            started_at: std::time::Instant::now(),
        }
    }

    /// Atomically increment the state version. Call after every meaningful
    /// mutation to signal WebSocket clients that fresh data is available.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    /// Publish a fresh chart projection and signal watchers.
    pub fn publish_chart(&self, chart: ChartData) {
        *self.chart.write() = chart;
        self.increment_version();
    }

    /// Record the selection now driving the subscription.
    pub fn set_selection(&self, symbol: Symbol, interval: Interval) {
        *self.selection.write() = (symbol, interval);
        self.increment_version();
    }

    /// Build the snapshot served by `GET /api/v1/chart` and pushed over the
    /// WebSocket feed.
    pub fn chart_snapshot(&self) -> ChartSnapshot {
        let (symbol, interval) = *self.selection.read();
        let chart = self.chart.read().clone();

        ChartSnapshot {
            state_version: self.current_state_version(),
            server_time: chrono::Utc::now().timestamp_millis(),
            symbol,
            interval,
            labels: chart.labels,
            closes: chart.closes,
        }
    }
}

/// Chart-ready view of the active series sent to the presentation layer.
/// `labels` and `closes` are index-aligned.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub symbol: Symbol,
    pub interval: Interval,
    pub labels: Vec<String>,
    pub closes: Vec<String>,
}
