//! `ExchangeAdapter<S>` (§4.3): the only gateway to a user's
//! [`ExchangeSchema`], and the one place look-ahead is enforced against the
//! [`ExecutionClock`](keel_integration::clock::ExecutionClock).

use crate::candle::Candle;
use crate::error::{ExchangeError, LookAheadError, RawCandlesError};
use crate::schema::{ExchangeSchema, OrderBook};
use chrono::{DateTime, Utc};
use keel_integration::clock::ExecutionClock;
use keel_markets::{ExchangeName, Interval, Symbol};

/// Number of one-minute candles VWAP'd by [`ExchangeAdapter::get_average_price`].
const AVERAGE_PRICE_WINDOW: usize = 5;

pub struct ExchangeAdapter<S: ExchangeSchema> {
    schema: S,
}

/// Hand-written rather than derived: `S` may be `Arc<dyn ExchangeSchema>`,
/// which carries no `Debug` bound of its own.
impl<S: ExchangeSchema> std::fmt::Debug for ExchangeAdapter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeAdapter").field("exchange_name", &self.schema.exchange_name()).finish()
    }
}

impl<S: ExchangeSchema> ExchangeAdapter<S> {
    pub fn new(schema: S) -> Self {
        Self { schema }
    }

    pub fn exchange_name(&self) -> ExchangeName {
        self.schema.exchange_name()
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// Current execution-clock bound, or `Utc::now()` outside any bound
    /// context (eg/ a direct call from user code rather than a tick).
    fn clock_bound(&self) -> DateTime<Utc> {
        ExecutionClock::current()
            .map(|ctx| ctx.when)
            .unwrap_or_else(Utc::now)
    }

    /// Most-recent `limit` candles at `interval`, whose close is at or
    /// before the current execution-clock bound.
    pub async fn get_candles(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let when = self.clock_bound();
        self.schema
            .get_candles(symbol, interval, when, limit, self.is_backtest())
            .await
    }

    /// Forward-looking candles past the current bound. Only the Tick
    /// Engine's backtest sweep — which owns `when` advancement and consumes
    /// each candle in order before moving the clock forward — may call
    /// this; it is rejected outside a backtest execution-clock context.
    pub async fn get_next_candles(
        &self,
        symbol: &Symbol,
        interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        if !self.is_backtest() {
            return Err(ExchangeError::new(
                self.exchange_name(),
                symbol.clone(),
                "get_next_candles is only permitted while replaying a backtest",
            ));
        }
        self.schema.get_candles(symbol, interval, since, limit, true).await
    }

    /// Flexible range query; `e_date` (or, absent that, the resolved end of
    /// the window implied by `limit`) must not exceed the current
    /// execution-clock bound.
    pub async fn get_raw_candles(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: Option<usize>,
        s_date: Option<DateTime<Utc>>,
        e_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, RawCandlesError> {
        let bound = self.clock_bound();
        if let Some(e_date) = e_date {
            if e_date > bound {
                return Err(LookAheadError { requested: e_date, bound }.into());
            }
        }

        let since = e_date.unwrap_or(bound);
        let candles = self
            .schema
            .get_candles(symbol, interval, since, limit.unwrap_or(usize::MAX), self.is_backtest())
            .await?;

        let candles: Vec<Candle> = candles
            .into_iter()
            .filter(|c| s_date.map_or(true, |s| c.close_time >= s))
            .collect();

        if let Some(worst) = candles.iter().map(|c| c.close_time).max() {
            if worst > bound {
                return Err(LookAheadError { requested: worst, bound }.into());
            }
        }

        Ok(candles)
    }

    /// VWAP over the last [`AVERAGE_PRICE_WINDOW`] one-minute candles,
    /// typical price `(H+L+C)/3` weighted by volume. Falls back to the last
    /// close when total volume is zero.
    pub async fn get_average_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError> {
        let candles = self
            .get_candles(symbol, Interval::M1, AVERAGE_PRICE_WINDOW)
            .await?;

        let Some(last_close) = candles.last().map(|c| c.close) else {
            return Err(ExchangeError::new(
                self.exchange_name(),
                symbol.clone(),
                "no candles available to compute an average price",
            ));
        };

        let total_volume: f64 = candles.iter().map(|c| c.volume).sum();
        if total_volume <= 0.0 {
            return Ok(last_close);
        }

        let weighted: f64 = candles.iter().map(|c| c.typical_price() * c.volume).sum();
        Ok(weighted / total_volume)
    }

    pub async fn get_order_book(&self, symbol: &Symbol) -> Result<OrderBook, ExchangeError> {
        self.schema.get_order_book(symbol).await
    }

    pub fn format_quantity(&self, quantity: f64) -> String {
        self.schema.format_quantity(quantity)
    }

    pub fn format_price(&self, price: f64) -> String {
        self.schema.format_price(price)
    }

    fn is_backtest(&self) -> bool {
        ExecutionClock::current().map(|ctx| ctx.backtest).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keel_integration::clock::{ClockContext, ExecutionClock};
    use std::sync::Mutex;

    struct FakeSchema {
        candles: Mutex<Vec<Candle>>,
    }

    #[async_trait]
    impl ExchangeSchema for FakeSchema {
        fn exchange_name(&self) -> ExchangeName {
            ExchangeName::new("fake")
        }

        async fn get_candles(
            &self,
            _symbol: &Symbol,
            _interval: Interval,
            _since: DateTime<Utc>,
            limit: usize,
            _backtest: bool,
        ) -> Result<Vec<Candle>, ExchangeError> {
            let candles = self.candles.lock().unwrap();
            let start = candles.len().saturating_sub(limit);
            Ok(candles[start..].to_vec())
        }
    }

    fn candle(minute: i64, close: f64, volume: f64) -> Candle {
        Candle {
            close_time: DateTime::from_timestamp(minute * 60, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    fn symbol() -> Symbol {
        Symbol::new("BTCUSDT")
    }

    #[tokio::test]
    async fn average_price_falls_back_to_last_close_when_volume_is_zero() {
        let adapter = ExchangeAdapter::new(FakeSchema {
            candles: Mutex::new(vec![candle(1, 100.0, 0.0), candle(2, 105.0, 0.0)]),
        });
        let avg = adapter.get_average_price(&symbol()).await.unwrap();
        assert_eq!(avg, 105.0);
    }

    #[tokio::test]
    async fn average_price_volume_weights_typical_price() {
        let adapter = ExchangeAdapter::new(FakeSchema {
            candles: Mutex::new(vec![candle(1, 100.0, 1.0), candle(2, 200.0, 3.0)]),
        });
        let avg = adapter.get_average_price(&symbol()).await.unwrap();
        assert_eq!(avg, (100.0 * 1.0 + 200.0 * 3.0) / 4.0);
    }

    #[tokio::test]
    async fn get_next_candles_rejected_outside_backtest() {
        let adapter = ExchangeAdapter::new(FakeSchema {
            candles: Mutex::new(vec![candle(1, 100.0, 1.0)]),
        });
        let result = adapter
            .get_next_candles(&symbol(), Interval::M1, Utc::now(), 1)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_next_candles_allowed_inside_backtest_context() {
        let adapter = ExchangeAdapter::new(FakeSchema {
            candles: Mutex::new(vec![candle(1, 100.0, 1.0)]),
        });
        let ctx = ClockContext::new(symbol(), DateTime::from_timestamp(120, 0).unwrap(), true);
        let result = ExecutionClock::run_in_context(ctx, || {
            tokio_test::block_on(adapter.get_next_candles(&symbol(), Interval::M1, Utc::now(), 1))
        });
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn raw_candles_rejects_look_ahead_past_clock_bound() {
        let adapter = ExchangeAdapter::new(FakeSchema {
            candles: Mutex::new(vec![candle(10, 100.0, 1.0)]),
        });
        let ctx = ClockContext::new(symbol(), DateTime::from_timestamp(60, 0).unwrap(), true);
        let result = ExecutionClock::run_in_context(ctx, || {
            tokio_test::block_on(adapter.get_raw_candles(
                &symbol(),
                Interval::M1,
                None,
                None,
                Some(DateTime::from_timestamp(600, 0).unwrap()),
            ))
        });
        assert!(matches!(result, Err(RawCandlesError::LookAhead(_))));
    }
}
