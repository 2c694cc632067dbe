//! A threshold strategy: compares the current VWAP against a trailing
//! simple moving average and signals long/short once the deviation crosses
//! a configured percentage, with symmetric fixed-percentage TP/SL.

use async_trait::async_trait;
use keel_execution::adapter::ExchangeAdapter;
use keel_execution::schema::ExchangeSchema;
use keel_markets::{Interval, Position, StrategyName, Symbol};
use keel_trader::{SignalDto, StrategySchema};
use tracing::debug;

/// Percentage-based configuration. Defaults mirror a conservative
/// momentum entry: 0.3% deviation to trigger, 1% take-profit, 0.5%
/// stop-loss.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdConfig {
    pub lookback: usize,
    pub deviation_pct: f64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub minute_estimated_time: i64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            deviation_pct: 0.003,
            take_profit_pct: 0.01,
            stop_loss_pct: 0.005,
            minute_estimated_time: 60,
        }
    }
}

/// Signals long when VWAP rises `deviation_pct` above the trailing SMA,
/// short when it falls the same amount below, otherwise stays silent.
#[derive(Debug)]
pub struct ThresholdStrategy<S: ExchangeSchema> {
    name: StrategyName,
    interval: Interval,
    adapter: ExchangeAdapter<S>,
    config: ThresholdConfig,
}

impl<S: ExchangeSchema> ThresholdStrategy<S> {
    pub fn new(name: impl Into<String>, interval: Interval, adapter: ExchangeAdapter<S>, config: ThresholdConfig) -> Self {
        assert!(
            interval.is_valid_strategy_interval(),
            "threshold strategy interval must be a valid strategy interval"
        );
        Self {
            name: StrategyName::new(name.into()),
            interval,
            adapter,
            config,
        }
    }

    async fn simple_moving_average(&self, symbol: &Symbol) -> Option<f64> {
        let candles = self
            .adapter
            .get_candles(symbol, self.interval, self.config.lookback)
            .await
            .ok()?;
        if candles.is_empty() {
            return None;
        }
        let sum: f64 = candles.iter().map(|c| c.close).sum();
        Some(sum / candles.len() as f64)
    }
}

#[async_trait]
impl<S: ExchangeSchema> StrategySchema for ThresholdStrategy<S> {
    fn strategy_name(&self) -> StrategyName {
        self.name.clone()
    }

    fn interval(&self) -> Interval {
        self.interval
    }

    async fn get_signal(&self, symbol: &Symbol) -> Option<SignalDto> {
        let vwap = self.adapter.get_average_price(symbol).await.ok()?;
        let sma = self.simple_moving_average(symbol).await?;
        if sma <= 0.0 {
            return None;
        }

        let deviation = (vwap - sma) / sma;
        let cfg = self.config;

        let position = if deviation >= cfg.deviation_pct {
            Position::Long
        } else if deviation <= -cfg.deviation_pct {
            Position::Short
        } else {
            return None;
        };

        debug!(%symbol, vwap, sma, deviation, ?position, "threshold strategy signalled");

        let sign = position.sign();
        let take_profit = vwap * (1.0 + sign * cfg.take_profit_pct);
        let stop_loss = vwap * (1.0 - sign * cfg.stop_loss_pct);

        Some(SignalDto::new(position, take_profit, stop_loss, cfg.minute_estimated_time))
    }

    fn note(&self) -> Option<&str> {
        Some("SMA-deviation threshold entry with fixed-percentage TP/SL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use keel_execution::candle::Candle;
    use keel_execution::error::ExchangeError;
    use keel_markets::ExchangeName;
    use std::sync::Mutex;

    struct FlatThenSpikeSchema {
        candles: Mutex<Vec<Candle>>,
    }

    #[async_trait]
    impl ExchangeSchema for FlatThenSpikeSchema {
        fn exchange_name(&self) -> ExchangeName {
            ExchangeName::new("fake")
        }

        async fn get_candles(
            &self,
            _symbol: &Symbol,
            _interval: Interval,
            _since: chrono::DateTime<chrono::Utc>,
            limit: usize,
            _backtest: bool,
        ) -> Result<Vec<Candle>, ExchangeError> {
            let candles = self.candles.lock().unwrap();
            let start = candles.len().saturating_sub(limit);
            Ok(candles[start..].to_vec())
        }
    }

    fn candle(minute: i64, close: f64) -> Candle {
        Candle {
            close_time: DateTime::from_timestamp(minute * 60, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[tokio::test]
    async fn signals_long_on_upward_deviation() {
        let mut candles: Vec<Candle> = (1..=20).map(|m| candle(m, 100.0)).collect();
        candles.push(candle(21, 105.0));

        let adapter = ExchangeAdapter::new(FlatThenSpikeSchema {
            candles: Mutex::new(candles),
        });
        let strategy = ThresholdStrategy::new("threshold", Interval::M1, adapter, ThresholdConfig::default());

        let signal = strategy.get_signal(&Symbol::new("BTCUSDT")).await.unwrap();
        assert_eq!(signal.position, Position::Long);
        assert!(signal.price_take_profit > signal.price_stop_loss);
    }

    #[tokio::test]
    async fn stays_silent_within_deviation_band() {
        let candles: Vec<Candle> = (1..=20).map(|m| candle(m, 100.0)).collect();
        let adapter = ExchangeAdapter::new(FlatThenSpikeSchema {
            candles: Mutex::new(candles),
        });
        let strategy = ThresholdStrategy::new("threshold", Interval::M1, adapter, ThresholdConfig::default());

        assert!(strategy.get_signal(&Symbol::new("BTCUSDT")).await.is_none());
    }
}
