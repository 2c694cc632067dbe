//! Wire payloads published on the [`crate::bus::EventBus`] and persisted as
//! JSONL (§6 "Event bus payloads" / "Persisted layout"). Every type here is
//! a flat, `serde`-friendly snapshot: this crate sits below `keel-core` in
//! the dependency graph and cannot reference `keel-core`'s own `Signal`
//! type, so `keel-core` builds a [`SignalSnapshot`] from its internal
//! `Signal` whenever it publishes.

use chrono::{DateTime, Utc};
use derive_more::Display;
use keel_markets::{ExchangeName, FrameName, Position, StrategyName, Symbol};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry of a signal's append-only partial-close history (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialEntry {
    pub kind: PartialKind,
    pub percent: f64,
    pub price: f64,
}

/// Discriminates a partial close (or, on [`AdjustmentEvent`], a breakeven
/// move) by direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialKind {
    #[display("profit")]
    Profit,
    #[display("loss")]
    Loss,
}

/// Flattened snapshot of a `Signal` row (§3), as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
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
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option", default)]
    pub pending_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option", default)]
    pub close_time: Option<DateTime<Utc>>,
    pub minute_estimated_time: i64,
    pub is_scheduled: bool,
    pub partial_history: Vec<PartialEntry>,
    pub tp_closed: f64,
    pub sl_closed: f64,
    pub total_closed: f64,
}

/// Action discriminant of a [`TickResultEvent`] (§4.6 states).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickAction {
    #[display("idle")]
    Idle,
    #[display("scheduled")]
    Scheduled,
    #[display("opened")]
    Opened,
    #[display("active")]
    Active,
    #[display("closed")]
    Closed,
    #[display("cancelled")]
    Cancelled,
}

/// Why a signal was closed (§4.6/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    #[display("take_profit")]
    TakeProfit,
    #[display("stop_loss")]
    StopLoss,
    #[display("time_expired")]
    TimeExpired,
    #[display("user")]
    User,
}

/// Why a scheduled signal was cancelled before activation (§9 open question,
/// resolved per the pessimistic interpretation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    #[display("timeout")]
    Timeout,
    #[display("price_reject")]
    PriceReject,
    #[display("user")]
    User,
}

/// Realized PnL of a closed signal (§4.6/§6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pnl {
    pub pnl_percentage: f64,
    pub price_open: f64,
    pub price_close: f64,
}

/// The envelope published on `tick-backtest`/`tick-live`/`tick-any` (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResultEvent {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub action: TickAction,
    pub signal: Option<SignalSnapshot>,
    pub current_price: Option<f64>,
    pub strategy_name: StrategyName,
    pub exchange_name: ExchangeName,
    pub symbol: Symbol,
    pub backtest: bool,
    pub close_reason: Option<CloseReason>,
    pub cancel_reason: Option<CancelReason>,
    pub cancel_id: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds_option", default)]
    pub close_timestamp: Option<DateTime<Utc>>,
    pub pnl: Option<Pnl>,
}

/// A partial close or breakeven move (§6 "Partial events" / "Breakeven
/// event" — a breakeven move is "as partial, but action is breakeven", so
/// both share this shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEvent {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub action: AdjustmentAction,
    pub signal_id: Uuid,
    pub position: Position,
    pub current_price: f64,
    /// 1-based ordinal of this entry within `partial_history`. `None` for a
    /// breakeven move, which is not itself a `partialHistory` entry.
    pub level: Option<u32>,
    pub price_open: f64,
    pub price_take_profit: f64,
    pub price_stop_loss: f64,
    pub original_price_take_profit: f64,
    pub original_price_stop_loss: f64,
    pub total_executed: f64,
    pub partial_history: Vec<PartialEntry>,
    pub note: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds_option", default)]
    pub pending_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub scheduled_at: DateTime<Utc>,
    pub minute_estimated_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentAction {
    #[display("profit")]
    Profit,
    #[display("loss")]
    Loss,
    #[display("breakeven")]
    Breakeven,
}

/// Emitted once per simulated minute at most while a scheduled signal awaits
/// activation (§4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingEvent {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    pub strategy_name: StrategyName,
    pub exchange_name: ExchangeName,
    pub frame_name: FrameName,
    pub backtest: bool,
}

/// A pending signal rejected by the [`RiskManager`](../keel_risk/index.html)
/// before any state-machine transition occurs (§4.5/§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRejectEvent {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub current_price: f64,
    pub active_position_count: usize,
    pub rejection_id: String,
    pub rejection_note: String,
    pub pending_signal: SignalSnapshot,
}

/// Reserved `performance` topic payload. Report collectors (out of scope,
/// §1) are the intended consumer; the core engine never reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEvent {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    pub strategy_name: StrategyName,
    pub exchange_name: ExchangeName,
    pub sequence: u64,
}

/// The closed set of topics an [`Event`] may be published on (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    #[display("tick-backtest")]
    TickBacktest,
    #[display("tick-live")]
    TickLive,
    #[display("tick-any")]
    TickAny,
    #[display("partial-profit")]
    PartialProfit,
    #[display("partial-loss")]
    PartialLoss,
    #[display("breakeven")]
    Breakeven,
    #[display("ping")]
    Ping,
    #[display("risk-reject")]
    RiskReject,
    #[display("performance")]
    Performance,
}

/// A published event, tagged with the topic(s) it is delivered on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Tick(TickResultEvent),
    Adjustment(AdjustmentEvent),
    Ping(PingEvent),
    RiskReject(RiskRejectEvent),
    Performance(PerformanceEvent),
}

impl Event {
    /// The topic(s) this event is delivered on, in delivery order. A tick
    /// result is always also delivered on `tick-any` after its mode-specific
    /// topic (§4.7 "always also on `tick-any`, in that order").
    pub fn topics(&self) -> Vec<Topic> {
        match self {
            Event::Tick(tick) => {
                let primary = if tick.backtest {
                    Topic::TickBacktest
                } else {
                    Topic::TickLive
                };
                vec![primary, Topic::TickAny]
            }
            Event::Adjustment(adj) => vec![match adj.action {
                AdjustmentAction::Profit => Topic::PartialProfit,
                AdjustmentAction::Loss => Topic::PartialLoss,
                AdjustmentAction::Breakeven => Topic::Breakeven,
            }],
            Event::Ping(_) => vec![Topic::Ping],
            Event::RiskReject(_) => vec![Topic::RiskReject],
            Event::Performance(_) => vec![Topic::Performance],
        }
    }
}
