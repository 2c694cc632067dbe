//! The schema a user implements to plug a market-data source into the
//! engine (§4.3). The [`crate::adapter::ExchangeAdapter`] is the only thing
//! that ever calls through it.

use crate::candle::Candle;
use crate::error::ExchangeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keel_markets::{ExchangeName, Interval, Symbol};
use std::sync::Arc;

/// Minimal order-book snapshot, for schemas that choose to implement
/// [`ExchangeSchema::get_order_book`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBook {
    /// `(price, quantity)`, best first.
    pub bids: Vec<(f64, f64)>,
    /// `(price, quantity)`, best first.
    pub asks: Vec<(f64, f64)>,
}

/// User-supplied market-data source (§4.3). Only [`ExchangeSchema::get_candles`]
/// is required; the rest default to a no-op/unsupported response so a
/// minimal schema compiles without implementing every hook.
#[async_trait]
pub trait ExchangeSchema: Send + Sync + 'static {
    /// Stable identifier used in keys, logs, and events.
    fn exchange_name(&self) -> ExchangeName;

    /// Free-form description surfaced in diagnostics. Optional.
    fn note(&self) -> Option<&str> {
        None
    }

    /// Most-recent `limit` candles at `interval`, ending at or before
    /// `since`. `backtest` lets the implementation pick a cached/replay
    /// source instead of a live one.
    async fn get_candles(
        &self,
        symbol: &Symbol,
        interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
        backtest: bool,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// Render a quantity the way the venue expects (tick/lot rounding).
    /// Defaults to an unrounded pass-through.
    fn format_quantity(&self, quantity: f64) -> String {
        quantity.to_string()
    }

    /// Render a price the way the venue expects. Defaults to an unrounded
    /// pass-through.
    fn format_price(&self, price: f64) -> String {
        price.to_string()
    }

    /// Current order book, if the schema has one to offer.
    async fn get_order_book(&self, _symbol: &Symbol) -> Result<OrderBook, ExchangeError> {
        Err(ExchangeError::new(
            self.exchange_name(),
            Symbol::new("unknown"),
            "order book not supported by this schema",
        ))
    }
}

/// Lets an [`ExchangeAdapter`](crate::adapter::ExchangeAdapter) be built over
/// a type-erased schema, so a [`keel_core`](../keel_core/index.html) exchange
/// registry can hold differently-typed schemas side by side as
/// `Arc<dyn ExchangeSchema>` behind one `ExchangeAdapter<Arc<dyn ExchangeSchema>>`.
#[async_trait]
impl ExchangeSchema for Arc<dyn ExchangeSchema> {
    fn exchange_name(&self) -> ExchangeName {
        (**self).exchange_name()
    }

    fn note(&self) -> Option<&str> {
        (**self).note()
    }

    async fn get_candles(
        &self,
        symbol: &Symbol,
        interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
        backtest: bool,
    ) -> Result<Vec<Candle>, ExchangeError> {
        (**self).get_candles(symbol, interval, since, limit, backtest).await
    }

    fn format_quantity(&self, quantity: f64) -> String {
        (**self).format_quantity(quantity)
    }

    fn format_price(&self, price: f64) -> String {
        (**self).format_price(price)
    }

    async fn get_order_book(&self, symbol: &Symbol) -> Result<OrderBook, ExchangeError> {
        (**self).get_order_book(symbol).await
    }
}
