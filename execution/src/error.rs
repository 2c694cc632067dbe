//! Errors surfaced by [`crate::adapter::ExchangeAdapter`] (§4.3).

use chrono::{DateTime, Utc};
use keel_markets::{ExchangeName, Symbol};
use thiserror::Error;

/// An [`crate::schema::ExchangeSchema`] call failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("exchange {exchange} failed to serve {symbol}: {message}")]
pub struct ExchangeError {
    pub exchange: ExchangeName,
    pub symbol: Symbol,
    pub message: String,
}

impl ExchangeError {
    pub fn new(exchange: ExchangeName, symbol: Symbol, message: impl Into<String>) -> Self {
        Self {
            exchange,
            symbol,
            message: message.into(),
        }
    }
}

/// A query resolved to a range extending past the current
/// [`keel_integration::clock::ExecutionClock`] bound (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("requested range end {requested} exceeds execution clock bound {bound}")]
pub struct LookAheadError {
    pub requested: DateTime<Utc>,
    pub bound: DateTime<Utc>,
}

/// [`crate::adapter::ExchangeAdapter::get_raw_candles`]'s failure kinds, kept
/// distinct so a caller can match a rejected look-ahead apart from an
/// upstream schema failure instead of both collapsing into one string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RawCandlesError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error(transparent)]
    LookAhead(#[from] LookAheadError),
}
