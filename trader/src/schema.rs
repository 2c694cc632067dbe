//! [`StrategySchema`] and [`SignalDto`] (§6 "Strategy schema" / "Signal DTO").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keel_markets::{Interval, Position, StrategyName, Symbol};

/// What `getSignal` returns to request a new position. Presence of
/// `price_open` selects scheduled mode (the position activates once price
/// touches it); its absence means an immediate entry at the current VWAP.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDto {
    pub position: Position,
    pub price_open: Option<f64>,
    pub price_take_profit: f64,
    pub price_stop_loss: f64,
    pub minute_estimated_time: i64,
    pub note: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SignalDto {
    pub fn new(position: Position, price_take_profit: f64, price_stop_loss: f64, minute_estimated_time: i64) -> Self {
        Self {
            position,
            price_open: None,
            price_take_profit,
            price_stop_loss,
            minute_estimated_time,
            note: None,
            timestamp: None,
        }
    }

    /// Builder-style: make this a scheduled (not immediate) entry.
    pub fn with_price_open(mut self, price_open: f64) -> Self {
        self.price_open = Some(price_open);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A user-supplied signal generator, registered under a unique
/// [`StrategySchema::strategy_name`] (§6).
///
/// Only [`StrategySchema::get_signal`] is required. A schema that names
/// neither [`StrategySchema::risk_name`] nor [`StrategySchema::risk_list`]
/// gets the engine's always-accepting default risk rule (§4.5).
#[async_trait]
pub trait StrategySchema: Send + Sync + 'static {
    fn strategy_name(&self) -> StrategyName;

    /// Must satisfy [`keel_markets::Interval::is_valid_strategy_interval`]
    /// (§6 excludes `4h`/`1d` for strategies).
    fn interval(&self) -> Interval;

    /// Called at most once every `interval` minutes of `when` (§4.6 step 2,
    /// interval throttling). `None` means "no signal this call".
    async fn get_signal(&self, symbol: &Symbol) -> Option<SignalDto>;

    /// Name of the primary risk rule this strategy is evaluated against.
    fn risk_name(&self) -> Option<String> {
        None
    }

    /// Additional risk rule names merged alongside [`Self::risk_name`], in
    /// schema order with `risk_name` first (§4.5).
    fn risk_list(&self) -> Vec<String> {
        Vec::new()
    }

    fn note(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_dto_without_price_open_is_immediate_entry() {
        let dto = SignalDto::new(Position::Long, 110.0, 95.0, 60);
        assert!(dto.price_open.is_none());
    }

    #[test]
    fn signal_dto_with_price_open_is_scheduled() {
        let dto = SignalDto::new(Position::Long, 110.0, 95.0, 60).with_price_open(100.0);
        assert_eq!(dto.price_open, Some(100.0));
    }
}
