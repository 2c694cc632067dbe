//! Realized PnL (§4.6 "PnL on close"): `perLegPnl` applies fees on both
//! legs and skews each price by slippage in the adverse direction for the
//! position side, and `realized_pnl` sums the weighted contribution of
//! every partial close plus the remainder at the final close price.

use keel_markets::Position;
use serde::{Deserialize, Serialize};

/// `feePct`/`slippagePct` defaults (0.1% each, per §4.6 Breakeven default).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSlippageConfig {
    pub fee_pct: f64,
    pub slippage_pct: f64,
}

impl Default for FeeSlippageConfig {
    fn default() -> Self {
        Self {
            fee_pct: 0.001,
            slippage_pct: 0.001,
        }
    }
}

/// One leg of a signal's close: a percent of the position closed at
/// `price`, either as a partial or as the final remainder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialLeg {
    pub percent: f64,
    pub price: f64,
}

/// Fractional return of a single entry/exit leg, fees and slippage baked
/// in. `price_open` and `price_exit` are each skewed by `slippage_pct` in
/// the direction adverse to `position` before the return is taken, then
/// `fee_pct` is subtracted twice (entry and exit).
pub fn per_leg_pnl(price_open: f64, price_exit: f64, position: Position, cfg: FeeSlippageConfig) -> f64 {
    let sign = position.sign();
    let adjusted_open = price_open * (1.0 + sign * cfg.slippage_pct);
    let adjusted_exit = price_exit * (1.0 - sign * cfg.slippage_pct);
    let raw_return = sign * (adjusted_exit - adjusted_open) / adjusted_open;
    raw_return - 2.0 * cfg.fee_pct
}

/// `pnl% = (Σᵢ percentᵢ · perLegPnl(priceOpen, priceᵢ) + (100 − totalClosed)
/// · perLegPnl(priceOpen, priceClose)) / 100` (§4.6).
pub fn realized_pnl(
    price_open: f64,
    position: Position,
    partials: &[PartialLeg],
    total_closed: f64,
    price_close: f64,
    cfg: FeeSlippageConfig,
) -> f64 {
    let partial_sum: f64 = partials
        .iter()
        .map(|leg| leg.percent * per_leg_pnl(price_open, leg.price, position, cfg))
        .sum();
    let remainder_percent = 100.0 - total_closed;
    let remainder = remainder_percent * per_leg_pnl(price_open, price_close, position, cfg);
    (partial_sum + remainder) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_profit_leg_is_positive_net_of_fees() {
        let cfg = FeeSlippageConfig::default();
        let pnl = per_leg_pnl(50_000.0, 51_000.0, Position::Long, cfg);
        assert!(pnl > 0.0);
        assert!(pnl < (51_000.0 - 50_000.0) / 50_000.0);
    }

    #[test]
    fn short_profit_leg_is_positive_when_price_falls() {
        let cfg = FeeSlippageConfig::default();
        let pnl = per_leg_pnl(100.0, 90.0, Position::Short, cfg);
        assert!(pnl > 0.0);
    }

    #[test]
    fn zero_fee_zero_slippage_matches_raw_return() {
        let cfg = FeeSlippageConfig {
            fee_pct: 0.0,
            slippage_pct: 0.0,
        };
        let pnl = per_leg_pnl(100.0, 110.0, Position::Long, cfg);
        assert!((pnl - 0.10).abs() < 1e-12);
    }

    #[test]
    fn realized_pnl_with_no_partials_matches_single_leg() {
        let cfg = FeeSlippageConfig::default();
        let whole = realized_pnl(100.0, Position::Long, &[], 0.0, 110.0, cfg);
        let leg = per_leg_pnl(100.0, 110.0, Position::Long, cfg);
        assert!((whole - leg).abs() < 1e-12);
    }

    #[test]
    fn realized_pnl_weights_partials_and_remainder() {
        let cfg = FeeSlippageConfig::default();
        let partials = [PartialLeg { percent: 25.0, price: 101.0 }];
        let whole = realized_pnl(100.0, Position::Long, &partials, 25.0, 105.0, cfg);

        let leg_partial = per_leg_pnl(100.0, 101.0, Position::Long, cfg);
        let leg_remainder = per_leg_pnl(100.0, 105.0, Position::Long, cfg);
        let expected = (25.0 * leg_partial + 75.0 * leg_remainder) / 100.0;

        assert!((whole - expected).abs() < 1e-12);
    }
}
