pub mod accumulator;
pub mod kline_stream;
pub mod series;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Series`).
pub use accumulator::SeriesAccumulator;
pub use kline_stream::{CandleEvent, Subscription, SubscriptionManager};
pub use series::{Candle, ChartData, Series};
