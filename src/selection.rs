// =============================================================================
// Selection state machine — one subscription, one active series
// =============================================================================
//
// A single task owns the accumulator and the open subscription. Selection
// commands and candle events drain through one select! loop, so transitions
// and appends are strictly sequenced: teardown always completes before the
// next setup starts, and the active series has exactly one writer.
// =============================================================================

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::market_data::{CandleEvent, SeriesAccumulator, Subscription, SubscriptionManager};
use crate::store::SeriesStore;
use crate::types::{Interval, Symbol};

/// Inputs accepted by the selection controller.
#[derive(Debug, Clone, Copy)]
pub enum SelectionCommand {
    SelectSymbol(Symbol),
    SelectInterval(Interval),
    Shutdown,
}

/// Runs the `Idle -> Active(symbol, interval)` machine for the process
/// lifetime, tearing its subscription down on every transition and on
/// shutdown.
pub struct SelectionController {
    state: Arc<AppState>,
    accumulator: SeriesAccumulator,
    manager: SubscriptionManager,
    subscription: Option<Subscription>,
    symbol: Symbol,
    interval: Interval,
    commands: UnboundedReceiver<SelectionCommand>,
    events: UnboundedReceiver<CandleEvent>,
}

impl SelectionController {
    pub fn new(
        state: Arc<AppState>,
        store: Arc<SeriesStore>,
        symbol: Symbol,
        interval: Interval,
        commands: UnboundedReceiver<SelectionCommand>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            accumulator: SeriesAccumulator::new(store, state.clone()),
            manager: SubscriptionManager::new(event_tx),
            subscription: None,
            symbol,
            interval,
            commands,
            events: event_rx,
            state,
        }
    }

    /// Enter `Active(symbol, interval)` and run until shutdown.
    pub async fn run(mut self) {
        // The default symbol's persisted series is loaded and published
        // before the first subscription opens.
        self.accumulator.activate(self.symbol);
        self.open_subscription();
        info!(symbol = %self.symbol, interval = %self.interval, "selection controller started");

        loop {
            tokio::select! {
                Some(cmd) = self.commands.recv() => {
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                Some(event) = self.events.recv() => {
                    self.accumulator.on_candle(event);
                }
                else => break,
            }
        }

        self.close_subscription();
        self.accumulator.deactivate();
        info!("selection controller stopped");
    }

    /// Returns false once the controller should stop.
    fn handle_command(&mut self, cmd: SelectionCommand) -> bool {
        match cmd {
            SelectionCommand::SelectSymbol(symbol) => {
                self.select_symbol(symbol);
                true
            }
            SelectionCommand::SelectInterval(interval) => {
                self.select_interval(interval);
                true
            }
            SelectionCommand::Shutdown => {
                warn!("selection controller shutting down");
                false
            }
        }
    }

    /// Tear down the current subscription, swap the active series to
    /// `symbol`'s persisted one, then subscribe anew.
    ///
    /// Re-selecting the current symbol keeps the series (activation is
    /// idempotent) and just cycles the subscription, which is also the
    /// manual recovery path after a dropped connection.
    fn select_symbol(&mut self, symbol: Symbol) {
        self.close_subscription();
        if symbol != self.symbol {
            self.accumulator.deactivate();
            self.symbol = symbol;
        }
        self.accumulator.activate(self.symbol);
        self.open_subscription();
        self.state.set_selection(self.symbol, self.interval);
        info!(symbol = %self.symbol, "symbol selected");
    }

    /// Change the stream interval, keeping the symbol's accumulated series:
    /// the cache is keyed by symbol alone, so candles recorded under
    /// different intervals share one series.
    fn select_interval(&mut self, interval: Interval) {
        self.close_subscription();
        self.interval = interval;
        self.open_subscription();
        self.state.set_selection(self.symbol, self.interval);
        info!(interval = %self.interval, "interval selected");
    }

    fn open_subscription(&mut self) {
        let subscription = self.manager.open(self.symbol, self.interval);
        self.accumulator.bind(subscription.id());
        self.subscription = Some(subscription);
    }

    fn close_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
        }
    }
}
