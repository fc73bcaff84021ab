// =============================================================================
// Series accumulator — single owner of the active in-memory series
// =============================================================================
//
// Consumes closed-candle events for the active symbol, appends them in
// arrival order, persists the full series after every append, and publishes
// the chart projection. Exactly one instance exists, owned by the selection
// controller task, so the series has a single writer and needs no lock.
// =============================================================================

use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::store::SeriesStore;
use crate::types::Symbol;

use super::kline_stream::CandleEvent;
use super::series::Series;

pub struct SeriesAccumulator {
    store: Arc<SeriesStore>,
    state: Arc<AppState>,
    active: Option<ActiveSeries>,
    /// Identity of the subscription whose events are currently accepted.
    bound: Option<Uuid>,
}

struct ActiveSeries {
    symbol: Symbol,
    series: Series,
}

impl SeriesAccumulator {
    pub fn new(store: Arc<SeriesStore>, state: Arc<AppState>) -> Self {
        Self {
            store,
            state,
            active: None,
            bound: None,
        }
    }

    /// Make `symbol` the active series, loading its persisted candles (or
    /// starting empty). Re-activating the already-active symbol keeps the
    /// in-memory series as is.
    pub fn activate(&mut self, symbol: Symbol) {
        if let Some(active) = &self.active {
            if active.symbol == symbol {
                debug!(symbol = %symbol, "symbol already active");
                self.publish();
                return;
            }
        }

        let series = self.store.load(symbol.pair_code());
        info!(symbol = %symbol, candles = series.len(), "series activated");
        self.active = Some(ActiveSeries { symbol, series });
        self.publish();
    }

    /// Accept events only from `subscription` until the next bind.
    pub fn bind(&mut self, subscription: Uuid) {
        self.bound = Some(subscription);
    }

    /// Drop the active series and stop accepting events. The durable copy is
    /// already current, so nothing is written here.
    pub fn deactivate(&mut self) {
        if let Some(active) = self.active.take() {
            info!(symbol = %active.symbol, candles = active.series.len(), "series deactivated");
        }
        self.bound = None;
    }

    /// Append a closed candle to the active series.
    ///
    /// Events tagged with a subscription other than the bound one are
    /// discarded: they were already in flight when their subscription was
    /// torn down and must not touch the series that replaced it.
    pub fn on_candle(&mut self, event: CandleEvent) {
        if self.bound != Some(event.subscription) {
            debug!(
                symbol = %event.symbol,
                subscription = %event.subscription,
                "stale candle event discarded"
            );
            return;
        }
        let Some(active) = self.active.as_mut() else {
            debug!(symbol = %event.symbol, "candle event with no active series discarded");
            return;
        };

        active.series.push(event.candle);
        if let Err(e) = self.store.save(active.symbol.pair_code(), &active.series) {
            error!(symbol = %active.symbol, error = %e, "failed to persist series");
        }
        debug!(symbol = %active.symbol, candles = active.series.len(), "candle appended");
        self.publish();
    }

    /// The active series, if any.
    pub fn series(&self) -> Option<&Series> {
        self.active.as_ref().map(|a| &a.series)
    }

    fn publish(&self) {
        let chart = self
            .active
            .as_ref()
            .map(|a| a.series.chart_data())
            .unwrap_or_default();
        self.state.publish_chart(chart);
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::series::Candle;
    use crate::types::Interval;

    fn test_state() -> Arc<AppState> {
        let (commands, _rx) = tokio::sync::mpsc::unbounded_channel();
        Arc::new(AppState::new(Symbol::Eth, Interval::OneMinute, commands))
    }

    fn temp_store() -> Arc<SeriesStore> {
        let dir = std::env::temp_dir().join(format!("candleview-test-{}", Uuid::new_v4()));
        Arc::new(SeriesStore::open(dir).unwrap())
    }

    fn closed_candle(time: &str, close: &str) -> Candle {
        Candle {
            time: time.into(),
            open: "100".into(),
            high: "105".into(),
            low: "99".into(),
            close: close.into(),
        }
    }

    fn event(subscription: Uuid, symbol: Symbol, close: &str) -> CandleEvent {
        CandleEvent {
            subscription,
            symbol,
            candle: closed_candle("22:13:20", close),
        }
    }

    #[test]
    fn append_grows_series_persists_and_publishes() {
        let store = temp_store();
        let state = test_state();
        let mut acc = SeriesAccumulator::new(store.clone(), state.clone());

        let sub = Uuid::new_v4();
        acc.activate(Symbol::Eth);
        acc.bind(sub);

        let version_before = state.current_state_version();
        acc.on_candle(event(sub, Symbol::Eth, "104"));

        assert_eq!(acc.series().unwrap().len(), 1);
        let last = acc.series().unwrap().last().unwrap().clone();
        assert_eq!(last.open, "100");
        assert_eq!(last.high, "105");
        assert_eq!(last.low, "99");
        assert_eq!(last.close, "104");
        assert_eq!(last.time, "22:13:20");

        // Durable copy never lags the in-memory one.
        assert_eq!(store.load("ethusdt").len(), 1);

        // Projection published and version bumped.
        assert_eq!(state.chart.read().closes, vec!["104"]);
        assert!(state.current_state_version() > version_before);
    }

    #[test]
    fn arrival_order_is_preserved() {
        let store = temp_store();
        let state = test_state();
        let mut acc = SeriesAccumulator::new(store, state);

        let sub = Uuid::new_v4();
        acc.activate(Symbol::Eth);
        acc.bind(sub);

        acc.on_candle(event(sub, Symbol::Eth, "104"));
        acc.on_candle(event(sub, Symbol::Eth, "106"));

        let closes: Vec<_> = acc
            .series()
            .unwrap()
            .candles()
            .iter()
            .map(|c| c.close.clone())
            .collect();
        assert_eq!(closes, vec!["104", "106"]);
    }

    #[test]
    fn stale_subscription_event_never_mutates() {
        let store = temp_store();
        let state = test_state();
        let mut acc = SeriesAccumulator::new(store.clone(), state);

        let old_sub = Uuid::new_v4();
        let new_sub = Uuid::new_v4();

        acc.activate(Symbol::Eth);
        acc.bind(new_sub);

        // An event from a torn-down subscription arrives late.
        acc.on_candle(event(old_sub, Symbol::Eth, "999"));
        assert!(acc.series().unwrap().is_empty());
        assert!(store.load("ethusdt").is_empty());

        // The bound subscription still works.
        acc.on_candle(event(new_sub, Symbol::Eth, "104"));
        assert_eq!(acc.series().unwrap().len(), 1);
    }

    #[test]
    fn events_after_deactivate_are_noops() {
        let store = temp_store();
        let state = test_state();
        let mut acc = SeriesAccumulator::new(store.clone(), state);

        let sub = Uuid::new_v4();
        acc.activate(Symbol::Eth);
        acc.bind(sub);
        acc.deactivate();

        acc.on_candle(event(sub, Symbol::Eth, "104"));
        assert!(store.load("ethusdt").is_empty());
    }

    #[test]
    fn activate_is_idempotent_for_same_symbol() {
        let store = temp_store();
        let state = test_state();
        let mut acc = SeriesAccumulator::new(store, state);

        let sub = Uuid::new_v4();
        acc.activate(Symbol::Eth);
        acc.bind(sub);
        acc.on_candle(event(sub, Symbol::Eth, "104"));

        // Re-activating must not reset or duplicate the series.
        acc.activate(Symbol::Eth);
        assert_eq!(acc.series().unwrap().len(), 1);

        acc.activate(Symbol::Eth);
        assert_eq!(acc.series().unwrap().len(), 1);
    }

    #[test]
    fn symbol_switch_replaces_series_wholesale() {
        let store = temp_store();
        let state = test_state();
        let mut acc = SeriesAccumulator::new(store.clone(), state.clone());

        let sub = Uuid::new_v4();
        acc.activate(Symbol::Eth);
        acc.bind(sub);
        acc.on_candle(event(sub, Symbol::Eth, "104"));

        // Switch to BNB with an empty cache: the projection empties
        // immediately, independent of ETH's stored data.
        acc.deactivate();
        acc.activate(Symbol::Bnb);
        assert!(acc.series().unwrap().is_empty());
        assert!(state.chart.read().closes.is_empty());

        let bnb_sub = Uuid::new_v4();
        acc.bind(bnb_sub);
        acc.on_candle(event(bnb_sub, Symbol::Bnb, "310"));
        assert_eq!(store.load("bnbusdt").len(), 1);

        // ETH's durable copy was untouched by the switch.
        assert_eq!(store.load("ethusdt").len(), 1);
    }

    #[test]
    fn rebind_keeps_accumulated_series() {
        // An interval change cycles the subscription but keeps the symbol's
        // series: the cache is keyed by symbol alone, so candles recorded
        // under different intervals accumulate together.
        let store = temp_store();
        let state = test_state();
        let mut acc = SeriesAccumulator::new(store, state);

        let first = Uuid::new_v4();
        acc.activate(Symbol::Eth);
        acc.bind(first);
        acc.on_candle(event(first, Symbol::Eth, "104"));

        let second = Uuid::new_v4();
        acc.bind(second);
        acc.on_candle(event(second, Symbol::Eth, "106"));

        let closes: Vec<_> = acc
            .series()
            .unwrap()
            .candles()
            .iter()
            .map(|c| c.close.clone())
            .collect();
        assert_eq!(closes, vec!["104", "106"]);
    }
}
