// =============================================================================
// Candle series — the ordered history of closed klines for one symbol
// =============================================================================

use chrono::{LocalResult, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One closed kline interval.
///
/// Prices stay in the exchange's decimal-string form; converting to a float
/// would silently round. `time` is the display label derived from the
/// interval's open timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub time: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
}

impl Candle {
    /// Derive the display label for an interval open time (epoch ms).
    ///
    /// Labels use UTC so the same feed produces the same series on every
    /// machine. Out-of-range timestamps fall back to the raw number.
    pub fn time_label(open_time_ms: i64) -> String {
        match Utc.timestamp_millis_opt(open_time_ms) {
            LocalResult::Single(dt) => dt.format("%H:%M:%S").to_string(),
            _ => open_time_ms.to_string(),
        }
    }
}

/// Chronological list of closed candles for one symbol.
///
/// Append-only while a subscription is live; insertion order is feed arrival
/// order. Serialises as a plain JSON array so the cache files stay readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series(Vec<Candle>);

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, candle: Candle) {
        self.0.push(candle);
    }

    pub fn candles(&self) -> &[Candle] {
        &self.0
    }

    pub fn last(&self) -> Option<&Candle> {
        self.0.last()
    }

    /// Project the series into the chart-ready shape: time labels and close
    /// prices, index-aligned.
    pub fn chart_data(&self) -> ChartData {
        ChartData {
            labels: self.0.iter().map(|c| c.time.clone()).collect(),
            closes: self.0.iter().map(|c| c.close.clone()).collect(),
        }
    }
}

/// Chart-ready view of a series. `labels[i]` and `closes[i]` describe the
/// same candle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub closes: Vec<String>,
}
