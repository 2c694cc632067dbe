//! Pure price-trigger logic (§4.6 step 1 activation/cancellation, step 4
//! SL/TP evaluation). Every function here takes a `(low, high)` window
//! rather than a single price: in backtest the caller passes the candle's
//! actual high/low so intra-candle extremes are honored; in live mode the
//! caller passes `(current_price, current_price)`, collapsing the window to
//! a single VWAP comparison (§4.7).

use keel_markets::Position;

/// Step 1: does this candle/price window touch the scheduled entry?
/// Long activates on a low at or below `price_open`; short on a high at or
/// above it.
pub fn activation_touched(position: Position, price_open: f64, low: f64, high: f64) -> bool {
    match position {
        Position::Long => low <= price_open,
        Position::Short => high >= price_open,
    }
}

/// Step 1 cancellation: price moved adversely past the stop-loss before the
/// entry was ever touched (§9 "pessimistic interpretation" of `price_reject`).
pub fn price_rejected_before_activation(position: Position, price_stop_loss: f64, low: f64, high: f64) -> bool {
    match position {
        Position::Long => low <= price_stop_loss,
        Position::Short => high >= price_stop_loss,
    }
}

/// Step 4(c)/(d): which of SL/TP this window crosses, using the *effective*
/// levels (trailing override if set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub sl_hit: bool,
    pub tp_hit: bool,
}

pub fn evaluate_crossing(position: Position, effective_sl: f64, effective_tp: f64, low: f64, high: f64) -> Crossing {
    match position {
        Position::Long => Crossing {
            sl_hit: low <= effective_sl,
            tp_hit: high >= effective_tp,
        },
        Position::Short => Crossing {
            sl_hit: high >= effective_sl,
            tp_hit: low <= effective_tp,
        },
    }
}

/// What the state machine decided an `active` tick's close (if any) was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    StopLoss,
    TakeProfit,
}

/// Step 4 tie-break: when a single window crosses both SL and TP, the
/// pessimistic rule picks SL for long if the window opened below entry,
/// TP otherwise; mirrored for short (§4.6, §9 open question).
pub fn resolve_crossing(position: Position, price_open: f64, window_open: f64, crossing: Crossing) -> Option<CloseTrigger> {
    match (crossing.sl_hit, crossing.tp_hit) {
        (false, false) => None,
        (true, false) => Some(CloseTrigger::StopLoss),
        (false, true) => Some(CloseTrigger::TakeProfit),
        (true, true) => Some(match position {
            Position::Long if window_open < price_open => CloseTrigger::StopLoss,
            Position::Long => CloseTrigger::TakeProfit,
            Position::Short if window_open > price_open => CloseTrigger::StopLoss,
            Position::Short => CloseTrigger::TakeProfit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_activation_touched_by_low() {
        assert!(activation_touched(Position::Long, 100.0, 99.0, 101.0));
        assert!(!activation_touched(Position::Long, 100.0, 100.5, 101.0));
    }

    #[test]
    fn short_activation_touched_by_high() {
        assert!(activation_touched(Position::Short, 100.0, 98.0, 100.5));
        assert!(!activation_touched(Position::Short, 100.0, 98.0, 99.5));
    }

    #[test]
    fn long_price_rejected_when_low_crosses_stop_before_entry() {
        assert!(price_rejected_before_activation(Position::Long, 90.0, 89.0, 95.0));
        assert!(!price_rejected_before_activation(Position::Long, 90.0, 91.0, 95.0));
    }

    #[test]
    fn crossing_detects_both_sides_independently() {
        let crossing = evaluate_crossing(Position::Long, 95.0, 110.0, 94.0, 111.0);
        assert!(crossing.sl_hit);
        assert!(crossing.tp_hit);
    }

    #[test]
    fn single_window_resolves_to_sl_or_tp_alone() {
        let sl_only = evaluate_crossing(Position::Long, 95.0, 110.0, 94.0, 105.0);
        assert_eq!(resolve_crossing(Position::Long, 100.0, 100.0, sl_only), Some(CloseTrigger::StopLoss));

        let tp_only = evaluate_crossing(Position::Long, 95.0, 110.0, 96.0, 111.0);
        assert_eq!(resolve_crossing(Position::Long, 100.0, 100.0, tp_only), Some(CloseTrigger::TakeProfit));
    }

    #[test]
    fn tie_break_picks_sl_for_long_when_window_opened_below_entry() {
        let both = Crossing { sl_hit: true, tp_hit: true };
        assert_eq!(resolve_crossing(Position::Long, 100.0, 99.0, both), Some(CloseTrigger::StopLoss));
        assert_eq!(resolve_crossing(Position::Long, 100.0, 101.0, both), Some(CloseTrigger::TakeProfit));
    }

    #[test]
    fn tie_break_mirrors_for_short() {
        let both = Crossing { sl_hit: true, tp_hit: true };
        assert_eq!(resolve_crossing(Position::Short, 100.0, 101.0, both), Some(CloseTrigger::StopLoss));
        assert_eq!(resolve_crossing(Position::Short, 100.0, 99.0, both), Some(CloseTrigger::TakeProfit));
    }
}
