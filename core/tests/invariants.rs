//! Property-based tests for the universal properties in §8: these hold for
//! *every* input, not just the literal scenarios in `scenarios.rs`, so they
//! are checked with [`proptest`] rather than a fixed table of cases.

use chrono::{DateTime, Utc};
use keel_core::engine::signal::Signal;
use keel_markets::{ExchangeName, FrameName, Position, StrategyName, Symbol};
use keel_trader::SignalDto;
use proptest::prelude::*;

fn when(minute: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(minute * 60, 0).unwrap()
}

fn long_signal(price_open: f64, stop_loss: f64, take_profit: f64) -> Signal {
    let mut dto = SignalDto::new(Position::Long, take_profit, stop_loss, 60);
    dto.price_open = None;
    Signal::new(
        Symbol::new("BTCUSDT"),
        StrategyName::new("s"),
        ExchangeName::new("x"),
        FrameName::default(),
        true,
        dto,
        price_open,
        when(0),
    )
    .unwrap()
}

fn short_signal(price_open: f64, stop_loss: f64, take_profit: f64) -> Signal {
    let mut dto = SignalDto::new(Position::Short, take_profit, stop_loss, 60);
    dto.price_open = None;
    Signal::new(
        Symbol::new("BTCUSDT"),
        StrategyName::new("s"),
        ExchangeName::new("x"),
        FrameName::default(),
        true,
        dto,
        price_open,
        when(0),
    )
    .unwrap()
}

/// A valid `(1, 100]` percent and an arbitrary price, for feeding into
/// `partial_profit`/`partial_loss`.
fn partial_strategy() -> impl Strategy<Value = (f64, f64)> {
    (1.0f64..=100.0, 50.0f64..=150.0)
}

proptest! {
    /// §8 "Universal properties": `totalClosed ∈ [0,100]` after any sequence
    /// of partial closes, and a percent that would push it past 100 is a
    /// no-op rather than an error.
    #[test]
    fn total_closed_never_exceeds_100_for_any_partial_sequence(
        partials in prop::collection::vec(partial_strategy(), 0..20),
    ) {
        let mut sig = long_signal(100.0, 90.0, 110.0);
        for (percent, price) in partials {
            let _ = sig.partial_profit(percent, price);
            prop_assert!(sig.total_closed() >= 0.0 && sig.total_closed() <= 100.0);
        }
    }

    /// §8 "partialHistory is append-only": its length only ever grows, and
    /// every previously-recorded entry is untouched by a later call.
    #[test]
    fn partial_history_is_append_only(
        partials in prop::collection::vec(partial_strategy(), 0..20),
    ) {
        let mut sig = long_signal(100.0, 90.0, 110.0);
        let mut prefix = Vec::new();
        for (percent, price) in partials {
            let before = sig.partial_history.clone();
            let applied = sig.partial_profit(percent, price).unwrap();
            if applied {
                prefix.push(sig.partial_history.last().cloned().unwrap());
            }
            prop_assert_eq!(&sig.partial_history[..before.len()], &before[..]);
            prop_assert_eq!(sig.partial_history.len(), prefix.len());
        }
    }

    /// §8: the long/short side-ordering invariant survives any sequence of
    /// `trailingStop` calls — a trailing update never crosses `priceOpen`.
    #[test]
    fn trailing_stop_never_crosses_price_open_long(
        shifts in prop::collection::vec(-100.0f64..=100.0, 0..20)
            .prop_map(|v| v.into_iter().filter(|s| *s != 0.0).collect::<Vec<_>>()),
    ) {
        let mut sig = long_signal(100.0, 90.0, 110.0);
        for shift in shifts {
            let _ = sig.trailing_stop(shift);
            prop_assert!(sig.effective_stop_loss() < sig.price_open);
        }
    }

    #[test]
    fn trailing_stop_never_crosses_price_open_short(
        shifts in prop::collection::vec(-100.0f64..=100.0, 0..20)
            .prop_map(|v| v.into_iter().filter(|s| *s != 0.0).collect::<Vec<_>>()),
    ) {
        let mut sig = short_signal(100.0, 110.0, 90.0);
        for shift in shifts {
            let _ = sig.trailing_stop(shift);
            prop_assert!(sig.effective_stop_loss() > sig.price_open);
        }
    }

    /// §8: trailing SL is monotone in the profit direction — for a long
    /// signal, `effectiveStopLoss` never decreases across any sequence of
    /// `trailingStop` calls (accepted or rejected).
    #[test]
    fn trailing_stop_is_monotone_for_long(
        shifts in prop::collection::vec(-100.0f64..=100.0, 0..20)
            .prop_map(|v| v.into_iter().filter(|s| *s != 0.0).collect::<Vec<_>>()),
    ) {
        let mut sig = long_signal(100.0, 90.0, 110.0);
        let mut last_sl = sig.effective_stop_loss();
        for shift in shifts {
            let _ = sig.trailing_stop(shift);
            let sl = sig.effective_stop_loss();
            prop_assert!(sl >= last_sl);
            last_sl = sl;
        }
    }

    #[test]
    fn trailing_stop_is_monotone_for_short(
        shifts in prop::collection::vec(-100.0f64..=100.0, 0..20)
            .prop_map(|v| v.into_iter().filter(|s| *s != 0.0).collect::<Vec<_>>()),
    ) {
        let mut sig = short_signal(100.0, 110.0, 90.0);
        let mut last_sl = sig.effective_stop_loss();
        for shift in shifts {
            let _ = sig.trailing_stop(shift);
            let sl = sig.effective_stop_loss();
            prop_assert!(sl <= last_sl);
            last_sl = sl;
        }
    }

    /// §8 "Idempotence": a percent that would push `totalClosed` past 100 is
    /// always a no-op, never an error, for any starting fill level.
    #[test]
    fn overfilling_partial_is_always_a_no_op_not_an_error(
        first in 1.0f64..=100.0,
        second in 1.0f64..=100.0,
    ) {
        let mut sig = long_signal(100.0, 90.0, 110.0);
        let _ = sig.partial_profit(first, 101.0);
        let before = sig.total_closed();
        let result = sig.partial_profit(second, 102.0);
        prop_assert!(result.is_ok());
        if before + second > 100.0 {
            prop_assert_eq!(result.unwrap(), false);
            prop_assert_eq!(sig.total_closed(), before);
        }
    }
}
