// =============================================================================
// Kline WebSocket subscription — the single live (symbol, interval) binding
// =============================================================================

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::types::{Interval, Symbol};

use super::series::Candle;

/// A closed-candle event tagged with the subscription that produced it.
///
/// The tag lets the consumer discard events that were still in flight when
/// their subscription was closed.
#[derive(Debug, Clone)]
pub struct CandleEvent {
    pub subscription: Uuid,
    pub symbol: Symbol,
    pub candle: Candle,
}

/// Handle to one open kline stream.
pub struct Subscription {
    id: Uuid,
    symbol: Symbol,
    interval: Interval,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Abort the reader task. Events already queued downstream still carry
    /// this subscription's id and are dropped by the consumer's identity
    /// check, so nothing from a closed subscription reaches the series.
    pub fn close(self) {
        self.task.abort();
        info!(
            symbol = %self.symbol,
            interval = %self.interval,
            id = %self.id,
            "subscription closed"
        );
    }
}

/// Opens kline subscriptions and hands their events to one consumer channel.
///
/// At most one subscription is meant to be open at a time; the selection
/// controller enforces that by closing the previous subscription before
/// calling [`SubscriptionManager::open`] again.
pub struct SubscriptionManager {
    events: UnboundedSender<CandleEvent>,
}

impl SubscriptionManager {
    pub fn new(events: UnboundedSender<CandleEvent>) -> Self {
        Self { events }
    }

    /// Spawn the stream reader for `(symbol, interval)` and return its handle.
    pub fn open(&self, symbol: Symbol, interval: Interval) -> Subscription {
        let id = Uuid::new_v4();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = run_kline_stream(id, symbol, interval, events).await {
                error!(symbol = %symbol, interval = %interval, error = %e, "kline stream terminated");
            }
        });

        info!(symbol = %symbol, interval = %interval, id = %id, "subscription opened");
        Subscription {
            id,
            symbol,
            interval,
            task,
        }
    }
}

/// Connect to the kline stream for one (symbol, interval) pair and forward
/// closed candles into `events` until the connection ends.
///
/// A transport error or server-side close terminates the subscription; there
/// is no automatic reconnect. Re-subscribing happens externally, by
/// re-selecting the symbol or interval.
async fn run_kline_stream(
    id: Uuid,
    symbol: Symbol,
    interval: Interval,
    events: UnboundedSender<CandleEvent>,
) -> Result<()> {
    let url = format!(
        "wss://stream.binance.com:9443/ws/{}@kline_{}",
        symbol.pair_code(),
        interval.code()
    );
    info!(url = %url, symbol = %symbol, interval = %interval, "connecting to kline WebSocket");

    let (ws_stream, _response) = connect_async(&url)
        .await
        .context("failed to connect to kline WebSocket")?;

    info!(symbol = %symbol, interval = %interval, "kline WebSocket connected");
    let (_write, mut read) = ws_stream.split();

    loop {
        match read.next().await {
            Some(Ok(msg)) => {
                if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                    match parse_kline_message(&text) {
                        Ok(update) => match update.into_candle() {
                            Some(candle) => {
                                debug!(symbol = %symbol, close = %candle.close, "closed candle");
                                let event = CandleEvent {
                                    subscription: id,
                                    symbol,
                                    candle,
                                };
                                if events.send(event).is_err() {
                                    // Consumer is gone; nothing left to feed.
                                    return Ok(());
                                }
                            }
                            None => {
                                debug!(symbol = %symbol, "in-progress candle dropped");
                            }
                        },
                        Err(e) => {
                            warn!(error = %e, "failed to parse kline message");
                        }
                    }
                }
                // Ping / Pong / Binary / Close frames are ignored here --
                // tungstenite answers pings automatically.
            }
            Some(Err(e)) => {
                error!(symbol = %symbol, interval = %interval, error = %e, "kline WebSocket read error");
                return Err(e.into());
            }
            None => {
                warn!(symbol = %symbol, interval = %interval, "kline WebSocket stream ended");
                return Ok(());
            }
        }
    }
}

/// One parsed interval-state record from the feed.
#[derive(Debug, Clone)]
pub struct KlineUpdate {
    pub open_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub is_closed: bool,
}

impl KlineUpdate {
    /// A candle materialises only once its interval has closed.
    pub fn into_candle(self) -> Option<Candle> {
        if !self.is_closed {
            return None;
        }
        Some(Candle {
            time: Candle::time_label(self.open_time),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        })
    }
}

/// Parse a kline message.
///
/// Expected shape (single stream):
/// ```json
/// { "e": "kline", "s": "ETHUSDT", "k": { "t": 1700000000000, "o": "100",
///   "h": "105", "l": "99", "c": "104", "x": true } }
/// ```
pub fn parse_kline_message(text: &str) -> Result<KlineUpdate> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse kline JSON")?;

    // Support both the combined-stream envelope and the direct payload.
    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    let k = data.get("k").context("missing field k")?;

    let open_time = k["t"].as_i64().context("missing field k.t")?;
    let open = parse_price(&k["o"], "k.o")?;
    let high = parse_price(&k["h"], "k.h")?;
    let low = parse_price(&k["l"], "k.l")?;
    let close = parse_price(&k["c"], "k.c")?;
    let is_closed = k["x"].as_bool().context("missing field k.x")?;

    Ok(KlineUpdate {
        open_time,
        open,
        high,
        low,
        close,
        is_closed,
    })
}

/// Helper: the feed sends prices as JSON strings; tolerate bare numbers too.
fn parse_price(val: &serde_json::Value, name: &str) -> Result<String> {
    match val {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => anyhow::bail!("field {name} is missing or has unexpected JSON type"),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const CLOSED_MSG: &str = r#"{
        "e": "kline",
        "s": "ETHUSDT",
        "k": {
            "t": 1700000000000,
            "o": "100",
            "h": "105",
            "l": "99",
            "c": "104",
            "x": true
        }
    }"#;

    #[test]
    fn parse_closed_kline() {
        let update = parse_kline_message(CLOSED_MSG).expect("should parse");
        assert_eq!(update.open_time, 1_700_000_000_000);
        assert_eq!(update.open, "100");
        assert_eq!(update.high, "105");
        assert_eq!(update.low, "99");
        assert_eq!(update.close, "104");
        assert!(update.is_closed);

        let candle = update.into_candle().expect("closed kline yields a candle");
        assert_eq!(candle.time, "22:13:20");
        assert_eq!(candle.open, "100");
        assert_eq!(candle.high, "105");
        assert_eq!(candle.low, "99");
        assert_eq!(candle.close, "104");
    }

    #[test]
    fn in_progress_kline_never_materialises() {
        let json = r#"{"k":{"t":1700000000000,"o":"100","h":"105","l":"99","c":"104","x":false}}"#;
        let update = parse_kline_message(json).expect("should parse");
        assert!(!update.is_closed);
        assert!(update.into_candle().is_none());
    }

    #[test]
    fn parse_accepts_bare_k_payload() {
        // The interval-state record alone, without the outer event fields.
        let json = r#"{"k":{"t":1700000000000,"o":"100","h":"105","l":"99","c":"104","x":true}}"#;
        let update = parse_kline_message(json).expect("should parse");
        assert_eq!(update.close, "104");
    }

    #[test]
    fn parse_accepts_combined_stream_envelope() {
        let json = r#"{
            "stream": "ethusdt@kline_1m",
            "data": {
                "s": "ETHUSDT",
                "k": {"t": 1700000000000, "o": "100", "h": "105", "l": "99", "c": "104", "x": true}
            }
        }"#;
        let update = parse_kline_message(json).expect("should parse");
        assert_eq!(update.high, "105");
        assert!(update.is_closed);
    }

    #[test]
    fn parse_tolerates_numeric_prices() {
        let json = r#"{"k":{"t":1700000000000,"o":100,"h":105,"l":99,"c":104,"x":true}}"#;
        let update = parse_kline_message(json).expect("should parse");
        assert_eq!(update.open, "100");
        assert_eq!(update.close, "104");
    }

    #[test]
    fn parse_rejects_missing_fields() {
        assert!(parse_kline_message(r#"{"e":"kline"}"#).is_err());
        assert!(parse_kline_message(r#"{"k":{"t":1700000000000}}"#).is_err());
        assert!(
            parse_kline_message(r#"{"k":{"t":1,"o":"1","h":"1","l":"1","c":"1"}}"#).is_err(),
            "closed flag is required"
        );
        assert!(parse_kline_message("not json").is_err());
    }
}
