//! The OHLCV shape every [`crate::schema::ExchangeSchema`] returns (§4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One interval bar. `close_time` is the bar's closing timestamp — the
/// value every look-ahead check in [`crate::adapter::ExchangeAdapter`]
/// compares against the current execution clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// `(high + low + close) / 3`, the typical price used to VWAP-weight a
    /// window of candles (§4.3 `getAveragePrice`).
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}
