//! [`RiskCheck`] (§4.5): the single-rule interface a [`crate::rule::RiskRule::Leaf`]
//! defers to, generalized from the `CheckHigherThan` pattern to this
//! engine's `{pendingSignal, activePositionCount, activePositions}` input.

use crate::error::RiskReject;
use crate::rule::RiskCheckInput;
use derive_more::Constructor;

/// A single named risk rule.
pub trait RiskCheck: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn check(&self, input: &RiskCheckInput<'_>) -> Result<(), RiskReject>;
}

/// Rejects once `activePositionCount` would reach `limit`.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct CheckMaxActivePositions {
    pub limit: usize,
}

impl RiskCheck for CheckMaxActivePositions {
    fn name(&self) -> &str {
        "max_active_positions"
    }

    fn check(&self, input: &RiskCheckInput<'_>) -> Result<(), RiskReject> {
        if input.active_position_count >= self.limit {
            Err(RiskReject::new(
                self.name(),
                format!(
                    "active position count {} would reach limit {}",
                    input.active_position_count, self.limit
                ),
            ))
        } else {
            Ok(())
        }
    }
}

/// Rejects a pending signal whose stop distance (`|priceOpen - priceStopLoss|`
/// as a fraction of `priceOpen`) exceeds `max_fraction`.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct CheckMaxStopDistance {
    pub max_fraction: f64,
}

impl RiskCheck for CheckMaxStopDistance {
    fn name(&self) -> &str {
        "max_stop_distance"
    }

    fn check(&self, input: &RiskCheckInput<'_>) -> Result<(), RiskReject> {
        let signal = input.pending_signal;
        if signal.price_open <= 0.0 {
            return Ok(());
        }
        let distance = (signal.price_open - signal.price_stop_loss).abs() / signal.price_open;
        if distance > self.max_fraction {
            Err(RiskReject::new(
                self.name(),
                format!("stop distance {distance:.4} exceeds limit {:.4}", self.max_fraction),
            ))
        } else {
            Ok(())
        }
    }
}

/// Rejects a pending signal whose symbol already has an active position in
/// the ledger, preventing the same instrument from stacking positions
/// within one `(riskName, exchange, frame, mode)` bucket.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckNoDuplicateSymbol;

impl RiskCheck for CheckNoDuplicateSymbol {
    fn name(&self) -> &str {
        "no_duplicate_symbol"
    }

    fn check(&self, input: &RiskCheckInput<'_>) -> Result<(), RiskReject> {
        let symbol = input.pending_signal.symbol;
        if input.active_positions.iter().any(|p| &p.symbol == symbol) {
            Err(RiskReject::new(
                self.name(),
                format!("{symbol} already has an active position"),
            ))
        } else {
            Ok(())
        }
    }
}
