//! [`Signal`] (§3): the central entity the state machine in
//! [`crate::engine::state_machine`] drives forward. Owns the partial
//! close, trailing-stop/take-profit, breakeven and close-time PnL
//! mutations described in §4.6 — each one upholds the invariants in §3 by
//! construction rather than by a separate validation pass.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use keel_analytics::{per_leg_pnl, realized_pnl, FeeSlippageConfig, PartialLeg};
use keel_integration::event::{PartialEntry, PartialKind, Pnl, SignalSnapshot};
use keel_markets::{ExchangeName, FrameName, Position, StrategyName, Symbol};
use keel_trader::SignalDto;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A signal row (§3). Mutated only by its owning
/// [`crate::instance::Instance`], under that instance's mutex — never
/// concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub symbol: Symbol,
    pub strategy_name: StrategyName,
    pub exchange_name: ExchangeName,
    pub frame_name: FrameName,
    pub backtest: bool,
    pub position: Position,
    pub price_open: f64,
    pub price_take_profit: f64,
    pub price_stop_loss: f64,
    pub original_price_take_profit: f64,
    pub original_price_stop_loss: f64,
    pub trailing_price_stop_loss: Option<f64>,
    pub trailing_price_take_profit: Option<f64>,
    pub scheduled_at: DateTime<Utc>,
    pub pending_at: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub minute_estimated_time: i64,
    pub is_scheduled: bool,
    pub partial_history: Vec<PartialEntry>,
}

impl Signal {
    /// Builds a new signal from a [`SignalDto`] (§3 Lifecycle). Presence of
    /// `dto.price_open` selects `scheduled` mode; otherwise the signal
    /// opens immediately at `current_price`. Fails if the side/price
    /// ordering invariant in §3 does not hold.
    pub fn new(
        symbol: Symbol,
        strategy_name: StrategyName,
        exchange_name: ExchangeName,
        frame_name: FrameName,
        backtest: bool,
        dto: SignalDto,
        current_price: f64,
        when: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let is_scheduled = dto.price_open.is_some();
        let price_open = dto.price_open.unwrap_or(current_price);

        validate_side_relationship(dto.position, price_open, dto.price_stop_loss, dto.price_take_profit)?;

        Ok(Self {
            id: Uuid::new_v4(),
            symbol,
            strategy_name,
            exchange_name,
            frame_name,
            backtest,
            position: dto.position,
            price_open,
            price_take_profit: dto.price_take_profit,
            price_stop_loss: dto.price_stop_loss,
            original_price_take_profit: dto.price_take_profit,
            original_price_stop_loss: dto.price_stop_loss,
            trailing_price_stop_loss: None,
            trailing_price_take_profit: None,
            scheduled_at: when,
            pending_at: if is_scheduled { None } else { Some(when) },
            close_time: None,
            minute_estimated_time: dto.minute_estimated_time,
            is_scheduled,
            partial_history: Vec::new(),
        })
    }

    /// Trailing override if set, otherwise the base stop-loss (GLOSSARY
    /// "Effective SL/TP").
    pub fn effective_stop_loss(&self) -> f64 {
        self.trailing_price_stop_loss.unwrap_or(self.price_stop_loss)
    }

    /// Trailing override if set, otherwise the base take-profit.
    pub fn effective_take_profit(&self) -> f64 {
        self.trailing_price_take_profit.unwrap_or(self.price_take_profit)
    }

    pub fn tp_closed(&self) -> f64 {
        self.partial_history.iter().filter(|e| e.kind == PartialKind::Profit).map(|e| e.percent).sum()
    }

    pub fn sl_closed(&self) -> f64 {
        self.partial_history.iter().filter(|e| e.kind == PartialKind::Loss).map(|e| e.percent).sum()
    }

    pub fn total_closed(&self) -> f64 {
        self.tp_closed() + self.sl_closed()
    }

    /// `scheduled -> opened` transition (§4.6 state table): marks the
    /// signal no longer scheduled and stamps `pendingAt`.
    pub fn activate(&mut self, when: DateTime<Utc>) {
        self.is_scheduled = false;
        self.pending_at = Some(when);
    }

    /// `partialProfit(percent, price)` (§4.6). Idempotent against retry:
    /// a percent that would push `totalClosed` past 100 is a no-op
    /// (`Ok(false)`), not an error.
    pub fn partial_profit(&mut self, percent: f64, price: f64) -> Result<bool, EngineError> {
        self.partial(PartialKind::Profit, percent, price)
    }

    /// Symmetric to [`Signal::partial_profit`].
    pub fn partial_loss(&mut self, percent: f64, price: f64) -> Result<bool, EngineError> {
        self.partial(PartialKind::Loss, percent, price)
    }

    fn partial(&mut self, kind: PartialKind, percent: f64, price: f64) -> Result<bool, EngineError> {
        if self.is_scheduled {
            return Err(EngineError::InvalidState("cannot apply a partial close to a scheduled signal"));
        }
        if !(percent > 0.0 && percent <= 100.0) {
            return Err(EngineError::BadPartial(percent));
        }
        if self.total_closed() + percent > 100.0 {
            return Ok(false);
        }
        self.partial_history.push(PartialEntry { kind, percent, price });
        Ok(true)
    }

    /// `trailingStop(percentShift)` (§4.6). Applied only if the
    /// recomputed SL is strictly better than the current effective SL and
    /// does not cross `priceOpen`; otherwise a no-op (`Ok(false)`).
    pub fn trailing_stop(&mut self, percent_shift: f64) -> Result<bool, EngineError> {
        if self.is_scheduled {
            return Err(EngineError::InvalidState("cannot trail a scheduled signal"));
        }
        let sign = self.position.sign();
        let distance = (self.price_open - self.original_price_stop_loss).abs();
        let new_sl = self.price_open - sign * distance * (1.0 + percent_shift / 100.0);

        let better = match self.position {
            Position::Long => new_sl > self.effective_stop_loss(),
            Position::Short => new_sl < self.effective_stop_loss(),
        };
        let crosses_open = match self.position {
            Position::Long => new_sl >= self.price_open,
            Position::Short => new_sl <= self.price_open,
        };

        if better && !crosses_open {
            self.trailing_price_stop_loss = Some(new_sl);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Side-equivalent of [`Signal::trailing_stop`] for the take-profit
    /// leg (§4.6 "design present but not user-invoked in the core
    /// protocol" — the [`crate::controller::Controller`] does not expose
    /// this as a verb, but it is reachable directly on `Signal` for a
    /// caller that wants it).
    pub fn trailing_profit(&mut self, percent_shift: f64) -> Result<bool, EngineError> {
        if self.is_scheduled {
            return Err(EngineError::InvalidState("cannot trail a scheduled signal"));
        }
        let sign = self.position.sign();
        let distance = (self.original_price_take_profit - self.price_open).abs();
        let new_tp = self.price_open + sign * distance * (1.0 + percent_shift / 100.0);

        let better = match self.position {
            Position::Long => new_tp > self.effective_take_profit(),
            Position::Short => new_tp < self.effective_take_profit(),
        };
        let crosses_open = match self.position {
            Position::Long => new_tp <= self.price_open,
            Position::Short => new_tp >= self.price_open,
        };

        if better && !crosses_open {
            self.trailing_price_take_profit = Some(new_tp);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// `breakeven(currentPrice)` (§4.6). Idempotent: once the effective SL
    /// has reached `priceOpen`, further calls return `Ok(false)` without
    /// mutation regardless of `currentPrice`.
    pub fn breakeven(&mut self, current_price: f64, cfg: FeeSlippageConfig) -> Result<bool, EngineError> {
        if self.is_scheduled {
            return Err(EngineError::InvalidState("cannot breakeven a scheduled signal"));
        }
        if self.effective_stop_loss() == self.price_open {
            return Ok(false);
        }

        let threshold = 2.0 * (cfg.fee_pct + cfg.slippage_pct);
        let progress = self.position.sign() * (current_price - self.price_open) / self.price_open;

        if progress >= threshold {
            self.trailing_price_stop_loss = Some(self.price_open);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Realizes PnL at `close_price` (§4.6 "PnL on close") and stamps
    /// `closeTime`. The caller is responsible for persisting and emitting
    /// before/after this call per §4.6's persist-then-emit ordering.
    pub fn close(&mut self, close_price: f64, when: DateTime<Utc>, cfg: FeeSlippageConfig) -> Pnl {
        self.close_time = Some(when);
        let partials: Vec<PartialLeg> = self
            .partial_history
            .iter()
            .map(|entry| PartialLeg { percent: entry.percent, price: entry.price })
            .collect();
        let pnl_percentage = realized_pnl(self.price_open, self.position, &partials, self.total_closed(), close_price, cfg);
        Pnl {
            pnl_percentage,
            price_open: self.price_open,
            price_close: close_price,
        }
    }

    /// Fractional return of closing the whole remaining position right
    /// now at `price`, ignoring partials already taken — used by the
    /// state machine's SL/TP comparisons, which operate on raw prices
    /// rather than PnL.
    pub fn remaining_leg_pnl(&self, price: f64, cfg: FeeSlippageConfig) -> f64 {
        per_leg_pnl(self.price_open, price, self.position, cfg)
    }

    /// Flattened wire/persistence snapshot (§6).
    pub fn to_snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            id: self.id,
            symbol: self.symbol.clone(),
            strategy_name: self.strategy_name.clone(),
            exchange_name: self.exchange_name.clone(),
            frame_name: self.frame_name.clone(),
            backtest: self.backtest,
            position: self.position,
            price_open: self.price_open,
            price_take_profit: self.price_take_profit,
            price_stop_loss: self.price_stop_loss,
            original_price_take_profit: self.original_price_take_profit,
            original_price_stop_loss: self.original_price_stop_loss,
            trailing_price_stop_loss: self.trailing_price_stop_loss,
            trailing_price_take_profit: self.trailing_price_take_profit,
            scheduled_at: self.scheduled_at,
            pending_at: self.pending_at,
            close_time: self.close_time,
            minute_estimated_time: self.minute_estimated_time,
            is_scheduled: self.is_scheduled,
            partial_history: self.partial_history.clone(),
            tp_closed: self.tp_closed(),
            sl_closed: self.sl_closed(),
            total_closed: self.total_closed(),
        }
    }
}

/// §3: long requires `originalPriceStopLoss < priceOpen < originalPriceTakeProfit`;
/// short is the mirror image.
fn validate_side_relationship(position: Position, price_open: f64, stop_loss: f64, take_profit: f64) -> Result<(), EngineError> {
    let holds = match position {
        Position::Long => stop_loss < price_open && price_open < take_profit,
        Position::Short => take_profit < price_open && price_open < stop_loss,
    };
    if holds {
        Ok(())
    } else {
        Err(EngineError::InvalidState(
            "stop-loss/open/take-profit ordering violates the position side invariant",
        ))
    }
}
