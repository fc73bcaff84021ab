// =============================================================================
// Shared types — trading pairs and kline intervals
// =============================================================================

use serde::{Deserialize, Serialize};

/// One of the fixed trading pairs the service can subscribe to.
///
/// Serialises as the short UI code ("ETH", "BNB", "DOT"); the lowercase
/// exchange pair code doubles as the stream path segment and the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbol {
    Eth,
    Bnb,
    Dot,
}

impl Symbol {
    pub const ALL: [Symbol; 3] = [Symbol::Eth, Symbol::Bnb, Symbol::Dot];

    /// Lowercase exchange pair code, e.g. `ethusdt`.
    pub fn pair_code(self) -> &'static str {
        match self {
            Self::Eth => "ethusdt",
            Self::Bnb => "bnbusdt",
            Self::Dot => "dotusdt",
        }
    }

    /// Human-readable pair label for selection UIs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Eth => "ETH/USDT",
            Self::Bnb => "BNB/USDT",
            Self::Dot => "DOT/USDT",
        }
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Self::Eth
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eth => write!(f, "ETH"),
            Self::Bnb => write!(f, "BNB"),
            Self::Dot => write!(f, "DOT"),
        }
    }
}

/// One of the fixed kline intervals the service can subscribe to.
///
/// Serialises as the exchange interval code ("1m", "3m", "5m").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
}

impl Interval {
    pub const ALL: [Interval; 3] = [
        Interval::OneMinute,
        Interval::ThreeMinutes,
        Interval::FiveMinutes,
    ];

    /// Exchange interval code used in the stream path, e.g. `1m`.
    pub fn code(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
        }
    }

    /// Human-readable label for selection UIs.
    pub fn label(self) -> &'static str {
        match self {
            Self::OneMinute => "1 Minute",
            Self::ThreeMinutes => "3 Minutes",
            Self::FiveMinutes => "5 Minutes",
        }
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::OneMinute
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
