//! [`Instance`] (§4.6/§4.7): owns one `(symbol, strategy, exchange, frame,
//! mode)` state machine, the mutex serializing every tick and every direct
//! user command against it (§5), and the wiring to persistence, risk, and
//! the event bus.
//!
//! Partial/trailing/breakeven/cancel are applied directly against the
//! owning instance's mutex the moment the caller invokes them — they do not
//! wait for the next tick. `cancel` is the one exception with tick-deferred
//! *observation*: it only sets a flag; the state machine's step-1 check
//! (run once per tick) is what actually transitions a scheduled signal to
//! `cancelled` and emits the event, per §5 "the cancellation is observed on
//! the next tick".

use crate::engine::signal::Signal;
use crate::engine::state_machine::{activation_touched, evaluate_crossing, price_rejected_before_activation, resolve_crossing, CloseTrigger};
use crate::error::EngineError;
use crate::logging::INSTANCE_TICK_SPAN_NAME;
use crate::registry::InstanceKey;
use crate::system::InstanceConfig;
use chrono::{DateTime, Utc};
use futures::Stream;
use keel_data::store::PersistenceStore;
use keel_execution::adapter::ExchangeAdapter;
use keel_execution::candle::Candle;
use keel_execution::schema::ExchangeSchema;
use keel_integration::clock::{ClockContext, ExecutionClock};
use keel_integration::event::{
    AdjustmentAction, AdjustmentEvent, CancelReason, CloseReason, Event, PartialKind, PingEvent, RiskRejectEvent, TickAction, TickResultEvent,
};
use keel_integration::bus::EventBus;
use keel_risk::ledger::{ActivePosition, RiskEngine, RiskLedgerKey};
use keel_risk::rule::{PendingSignalView, RiskRule};
use keel_trader::schema::StrategySchema;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

pub(crate) const SIGNALS_NAMESPACE: &str = "signals";

struct InstanceState {
    signal: Option<Signal>,
    last_signal_at: Option<DateTime<Utc>>,
    stopped: bool,
    pending_cancel: Option<String>,
    last_ping_minute: Option<i64>,
}

/// Every collaborator one state machine needs (§2 control-flow diagram),
/// wired together by [`crate::controller::Controller`].
pub struct Instance {
    pub key: InstanceKey,
    config: InstanceConfig,
    strategy: Arc<dyn StrategySchema>,
    exchange: ExchangeAdapter<Arc<dyn ExchangeSchema>>,
    risk_engine: Arc<RiskEngine>,
    risk_rule: RiskRule,
    risk_ledger_key: RiskLedgerKey,
    persistence: Arc<dyn PersistenceStore>,
    bus: EventBus,
    state: AsyncMutex<InstanceState>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance").field("key", &self.key).finish_non_exhaustive()
    }
}

impl Instance {
    /// Rehydrates from the persistence store (§4.2) and, if the recovered
    /// signal is already active, re-adds it to the risk ledger (in-memory
    /// and therefore lost across a restart).
    pub async fn new(
        key: InstanceKey,
        config: InstanceConfig,
        strategy: Arc<dyn StrategySchema>,
        exchange: ExchangeAdapter<Arc<dyn ExchangeSchema>>,
        risk_engine: Arc<RiskEngine>,
        risk_rule: RiskRule,
        risk_ledger_key: RiskLedgerKey,
        persistence: Arc<dyn PersistenceStore>,
        bus: EventBus,
    ) -> Result<Arc<Self>, EngineError> {
        persistence
            .wait_for_init(SIGNALS_NAMESPACE, &|blob| serde_json::from_slice::<Option<Signal>>(blob).is_ok())
            .await?;

        let key_string = key.to_string();
        let signal = match persistence.read(SIGNALS_NAMESPACE, &key_string).await? {
            Some(blob) => serde_json::from_slice::<Option<Signal>>(&blob).map_err(|_| EngineError::InvalidState("corrupt persisted signal"))?,
            None => None,
        };

        if let Some(signal) = &signal {
            if !signal.is_scheduled && signal.close_time.is_none() {
                risk_engine.add_signal(&risk_ledger_key, active_position(signal));
            }
        }

        Ok(Arc::new(Self {
            key,
            config,
            strategy,
            exchange,
            risk_engine,
            risk_rule,
            risk_ledger_key,
            persistence,
            bus,
            state: AsyncMutex::new(InstanceState {
                signal,
                last_signal_at: None,
                stopped: false,
                pending_cancel: None,
                last_ping_minute: None,
            }),
        }))
    }

    fn key_string(&self) -> String {
        self.key.to_string()
    }

    async fn persist(&self, signal: &Option<Signal>) -> Result<(), EngineError> {
        let blob = serde_json::to_vec(signal).expect("Signal serializes infallibly");
        self.persistence.write(SIGNALS_NAMESPACE, &self.key_string(), &blob).await?;
        Ok(())
    }

    /// Current signal snapshot, for `Controller::get_data` (§4.9).
    pub async fn snapshot(&self) -> Option<keel_integration::event::SignalSnapshot> {
        self.state.lock().await.signal.as_ref().map(Signal::to_snapshot)
    }

    /// `stop(key)` (§4.9/§5): observed at the top of the next tick; blocks
    /// further `getSignal` calls without force-closing an active position.
    pub async fn stop(&self) {
        self.state.lock().await.stopped = true;
    }

    /// `cancel(key, cancelId?)` (§4.9/§5). A no-op (`Ok(false)`) unless the
    /// instance currently holds a `scheduled` signal — cancellation of an
    /// already-active position is not part of the protocol (§4.6 only
    /// transitions `scheduled -> cancelled`).
    pub async fn cancel(&self, cancel_id: Option<String>) -> bool {
        let mut state = self.state.lock().await;
        match &state.signal {
            Some(signal) if signal.is_scheduled => {
                state.pending_cancel = Some(cancel_id.unwrap_or_else(|| Uuid::new_v4().to_string()));
                true
            }
            _ => false,
        }
    }

    /// `partialProfit(percent, price)` (§4.6), applied immediately under the
    /// instance mutex rather than deferred to the next tick.
    pub async fn partial_profit(&self, percent: f64, price: f64) -> Result<bool, EngineError> {
        self.apply_partial(PartialKind::Profit, percent, price).await
    }

    pub async fn partial_loss(&self, percent: f64, price: f64) -> Result<bool, EngineError> {
        self.apply_partial(PartialKind::Loss, percent, price).await
    }

    async fn apply_partial(&self, kind: PartialKind, percent: f64, price: f64) -> Result<bool, EngineError> {
        let mut state = self.state.lock().await;
        let Some(signal) = state.signal.as_mut() else {
            return Err(EngineError::InvalidState("no pending signal to apply a partial close to"));
        };

        let applied = match kind {
            PartialKind::Profit => signal.partial_profit(percent, price)?,
            PartialKind::Loss => signal.partial_loss(percent, price)?,
        };
        if !applied {
            return Ok(false);
        }

        let level = signal.partial_history.len() as u32;
        let event = adjustment_event(
            signal,
            match kind {
                PartialKind::Profit => AdjustmentAction::Profit,
                PartialKind::Loss => AdjustmentAction::Loss,
            },
            price,
            Some(level),
        );
        let snapshot = state.signal.clone();
        self.persist(&snapshot).await?;
        self.bus.publish(Event::Adjustment(event));
        Ok(true)
    }

    /// `trailingStop(percentShift)` (§4.6), immediate.
    pub async fn trailing_stop(&self, percent_shift: f64) -> Result<bool, EngineError> {
        let mut state = self.state.lock().await;
        let Some(signal) = state.signal.as_mut() else {
            return Err(EngineError::InvalidState("no pending signal to trail"));
        };
        if !signal.trailing_stop(percent_shift)? {
            return Ok(false);
        }
        let snapshot = state.signal.clone();
        self.persist(&snapshot).await?;
        Ok(true)
    }

    /// `breakeven(currentPrice)` (§4.6), immediate. Emits a `breakeven`
    /// event (reusing the [`AdjustmentEvent`] shape) only on the move that
    /// actually applies. Uses the configured fee/slippage threshold (§4.6
    /// Breakeven defaults) rather than a caller-supplied one.
    pub async fn breakeven(&self, current_price: f64) -> Result<bool, EngineError> {
        let mut state = self.state.lock().await;
        let Some(signal) = state.signal.as_mut() else {
            return Err(EngineError::InvalidState("no pending signal to breakeven"));
        };
        if !signal.breakeven(current_price, self.config.system.fee_slippage)? {
            return Ok(false);
        }

        let event = adjustment_event(signal, AdjustmentAction::Breakeven, current_price, None);
        let snapshot = state.signal.clone();
        self.persist(&snapshot).await?;
        self.bus.publish(Event::Adjustment(event));
        Ok(true)
    }

    /// One live advance of the state machine (§4.7 `tick`), bound to the
    /// current wall clock. The VWAP fetch and the state-machine step both
    /// run inside the same `spawn_blocking`/`block_on` pinned thread (see
    /// [`Self::run_tick_live`]), so the look-ahead guard in
    /// [`ExchangeAdapter`] sees the live clock bound and no nested
    /// `block_on` ever runs on a shared tokio worker thread.
    pub async fn tick_once(self: &Arc<Self>) -> Result<TickAction, EngineError> {
        self.run_tick_live(Utc::now()).await
    }

    /// A lazy, single-pass replay over `candles` (§4.7 `backtest`),
    /// restartable only by calling this again from the beginning.
    pub fn backtest_sweep(self: Arc<Self>, candles: Vec<Candle>) -> impl Stream<Item = Result<TickAction, EngineError>> {
        futures::stream::unfold((self, candles.into_iter()), |(instance, mut iter)| async move {
            let candle = iter.next()?;
            let result = instance.tick_backtest(&candle).await;
            Some((result, (instance, iter)))
        })
    }

    async fn tick_backtest(self: &Arc<Self>, candle: &Candle) -> Result<TickAction, EngineError> {
        let when = candle.close_time;
        self.run_tick_backtest(when, candle.close, candle.low, candle.high, candle.open).await
    }

    /// Live tick: fetches the VWAP and runs [`Self::step`], both pinned to
    /// the same blocking-pool thread as the [`ExecutionClock`] scope bound
    /// to `when` (§4.1 is a thread-local, so every exchange/strategy await
    /// reachable from `step` must be polled without ever hopping threads,
    /// which `futures::executor::block_on` guarantees by driving the whole
    /// future to completion on the thread that installed the context).
    async fn run_tick_live(self: &Arc<Self>, when: DateTime<Utc>) -> Result<TickAction, EngineError> {
        let this = Arc::clone(self);
        let span = tracing::info_span!(target: "keel_core::instance", INSTANCE_TICK_SPAN_NAME, key = %this.key, backtest = false);

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let ctx = ClockContext::new(this.config.symbol.clone(), when, false);
            ExecutionClock::run_in_context(ctx, || {
                futures::executor::block_on(async {
                    let symbol = this.config.symbol.clone();
                    let price = this.exchange.get_average_price(&symbol).await?;
                    this.step(when, false, price, price, price, price).await
                })
            })
        })
        .await
        .map_err(EngineError::from)?
    }

    /// Same pinned-thread pattern as [`Self::run_tick_live`], but the OHLC
    /// window comes from an already-known candle rather than a fetch.
    async fn run_tick_backtest(self: &Arc<Self>, when: DateTime<Utc>, current_price: f64, low: f64, high: f64, window_open: f64) -> Result<TickAction, EngineError> {
        let this = Arc::clone(self);
        let span = tracing::info_span!(target: "keel_core::instance", INSTANCE_TICK_SPAN_NAME, key = %this.key, backtest = true);

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let ctx = ClockContext::new(this.config.symbol.clone(), when, true);
            ExecutionClock::run_in_context(ctx, || futures::executor::block_on(this.step(when, true, current_price, low, high, window_open)))
        })
        .await
        .map_err(EngineError::from)?
    }

    async fn step(&self, when: DateTime<Utc>, backtest: bool, current_price: f64, low: f64, high: f64, window_open: f64) -> Result<TickAction, EngineError> {
        let mut state = self.state.lock().await;

        // Step 1: a scheduled signal either activates, cancels, or keeps waiting.
        if let Some(signal) = state.signal.as_ref() {
            if signal.is_scheduled {
                return self.step_scheduled(&mut state, when, backtest, current_price, low, high).await;
            }
        }

        // Step 2: idle -> a freshly accepted signal, scheduled or immediate.
        if state.signal.is_none() {
            if let Some(action) = self.step_idle(&mut state, when, backtest, current_price).await? {
                return Ok(action);
            }
            return Ok(TickAction::Idle);
        }

        // Steps 3/4: the signal is open (opened or active); evaluate closes.
        self.step_active(&mut state, when, backtest, current_price, low, high, window_open, false).await
    }

    async fn step_scheduled(
        &self,
        state: &mut InstanceState,
        when: DateTime<Utc>,
        backtest: bool,
        current_price: f64,
        low: f64,
        high: f64,
    ) -> Result<TickAction, EngineError> {
        // Cloned rather than borrowed: the activation branch below needs to
        // write `state.signal` while still reading the pre-activation values.
        let signal = state.signal.clone().expect("caller verified a scheduled signal is present");

        if activation_touched(signal.position, signal.price_open, low, high) {
            let price_open = signal.price_open;
            let mut activated = signal;
            activated.activate(when);
            state.signal = Some(activated.clone());

            self.persist(&state.signal).await?;
            self.risk_engine.add_signal(&self.risk_ledger_key, active_position(&activated));

            self.publish_tick(Some(&activated), TickAction::Opened, current_price, backtest, when, None, None, None, None, None);
            return self.step_active(state, when, backtest, current_price, low, high, price_open, true).await;
        }

        let timed_out = (when - signal.scheduled_at).num_minutes() >= signal.minute_estimated_time;
        let user_cancel = state.pending_cancel.clone();
        let price_rejected = price_rejected_before_activation(signal.position, signal.price_stop_loss, low, high);

        if timed_out || user_cancel.is_some() || price_rejected {
            let reason = if user_cancel.is_some() {
                CancelReason::User
            } else if timed_out {
                CancelReason::Timeout
            } else {
                CancelReason::PriceReject
            };
            let cancel_id = user_cancel.unwrap_or_else(|| Uuid::new_v4().to_string());

            let cancelled_signal = state.signal.take();
            state.pending_cancel = None;
            self.persist(&None).await?;

            self.publish_tick(cancelled_signal.as_ref(), TickAction::Cancelled, current_price, backtest, when, None, Some(reason), Some(cancel_id), None, None);
            return Ok(TickAction::Cancelled);
        }

        self.maybe_ping(state, when, backtest);
        Ok(TickAction::Scheduled)
    }

    async fn step_idle(&self, state: &mut InstanceState, when: DateTime<Utc>, backtest: bool, current_price: f64) -> Result<Option<TickAction>, EngineError> {
        if state.stopped {
            return Ok(None);
        }

        let due = state
            .last_signal_at
            .map(|last| (when - last).num_minutes() >= self.strategy.interval().minutes())
            .unwrap_or(true);
        if !due {
            return Ok(None);
        }

        let Some(dto) = self.strategy.get_signal(&self.config.symbol).await else {
            state.last_signal_at = Some(when);
            return Ok(None);
        };
        state.last_signal_at = Some(when);

        let signal = Signal::new(
            self.config.symbol.clone(),
            self.config.strategy_name.clone(),
            self.config.exchange_name.clone(),
            self.config.frame_name.clone(),
            backtest,
            dto,
            current_price,
            when,
        )?;

        let view = PendingSignalView {
            symbol: &signal.symbol,
            strategy_name: &signal.strategy_name,
            exchange_name: &signal.exchange_name,
            frame_name: &signal.frame_name,
            backtest,
            position: signal.position,
            price_open: signal.price_open,
            price_take_profit: signal.price_take_profit,
            price_stop_loss: signal.price_stop_loss,
        };

        let is_scheduled = signal.is_scheduled;

        // A scheduled signal doesn't occupy a ledger slot until it activates
        // (`step_scheduled`), so only the immediate-open path below needs the
        // check and the insert to happen under one lock: a scheduled signal
        // never mutates the ledger here, so there's nothing for a concurrent
        // `check_and_reserve` to race against.
        if is_scheduled {
            if let Err(reject) = self.risk_engine.check_signal(&self.risk_ledger_key, &self.risk_rule, &view) {
                self.bus.publish(Event::RiskReject(RiskRejectEvent {
                    timestamp: when,
                    current_price,
                    active_position_count: self.risk_engine.active_position_count(&self.risk_ledger_key),
                    rejection_id: reject.rejection_id,
                    rejection_note: reject.rejection_note,
                    pending_signal: signal.to_snapshot(),
                }));
                return Ok(None);
            }

            state.signal = Some(signal);
            self.persist(&state.signal).await?;
            self.publish_tick(state.signal.as_ref(), TickAction::Scheduled, current_price, backtest, when, None, None, None, None, None);
            return Ok(Some(TickAction::Scheduled));
        }

        let position = active_position(&signal);
        let reservation = match self.risk_engine.check_and_reserve(&self.risk_ledger_key, &self.risk_rule, &view, position) {
            Ok(reservation) => reservation,
            Err(reject) => {
                self.bus.publish(Event::RiskReject(RiskRejectEvent {
                    timestamp: when,
                    current_price,
                    active_position_count: self.risk_engine.active_position_count(&self.risk_ledger_key),
                    rejection_id: reject.rejection_id,
                    rejection_note: reject.rejection_note,
                    pending_signal: signal.to_snapshot(),
                }));
                return Ok(None);
            }
        };

        state.signal = Some(signal);
        if let Err(err) = self.persist(&state.signal).await {
            self.risk_engine.remove_signal(&self.risk_ledger_key, reservation);
            state.signal = None;
            return Err(err);
        }

        self.publish_tick(state.signal.as_ref(), TickAction::Opened, current_price, backtest, when, None, None, None, None, None);
        Ok(Some(TickAction::Opened))
    }

    /// Step 4: evaluate time-expiry, then SL/TP, against the current
    /// `(low, high)` window. `just_opened` suppresses the redundant
    /// `active` heartbeat on the tick that already emitted `opened`.
    #[allow(clippy::too_many_arguments)]
    async fn step_active(
        &self,
        state: &mut InstanceState,
        when: DateTime<Utc>,
        backtest: bool,
        current_price: f64,
        low: f64,
        high: f64,
        window_open: f64,
        just_opened: bool,
    ) -> Result<TickAction, EngineError> {
        if !just_opened {
            self.publish_tick(state.signal.as_ref(), TickAction::Active, current_price, backtest, when, None, None, None, None, None);
        }

        let signal = state.signal.as_ref().expect("an open signal is present on entry to step_active");

        if (when - signal.pending_at.unwrap_or(signal.scheduled_at)).num_minutes() >= signal.minute_estimated_time {
            return self.close_signal(state, when, backtest, current_price, CloseReason::TimeExpired, current_price).await;
        }

        let crossing = evaluate_crossing(signal.position, signal.effective_stop_loss(), signal.effective_take_profit(), low, high);
        if let Some(trigger) = resolve_crossing(signal.position, signal.price_open, window_open, crossing) {
            let (reason, close_price) = match trigger {
                CloseTrigger::StopLoss => (CloseReason::StopLoss, signal.effective_stop_loss()),
                CloseTrigger::TakeProfit => (CloseReason::TakeProfit, signal.effective_take_profit()),
            };
            return self.close_signal(state, when, backtest, current_price, reason, close_price).await;
        }

        Ok(TickAction::Active)
    }

    async fn close_signal(
        &self,
        state: &mut InstanceState,
        when: DateTime<Utc>,
        backtest: bool,
        current_price: f64,
        reason: CloseReason,
        close_price: f64,
    ) -> Result<TickAction, EngineError> {
        let mut signal = state.signal.take().expect("close_signal called with an open signal");
        let cfg = self.config.system.fee_slippage;
        let pnl = signal.close(close_price, when, cfg);
        self.risk_engine.remove_signal(&self.risk_ledger_key, signal.id);
        self.persist(&None).await?;

        self.publish_tick(Some(&signal), TickAction::Closed, current_price, backtest, when, Some(reason), None, None, Some(when), Some(pnl));
        Ok(TickAction::Closed)
    }

    fn maybe_ping(&self, state: &mut InstanceState, when: DateTime<Utc>, backtest: bool) {
        let minute = when.timestamp().div_euclid(60);
        if state.last_ping_minute == Some(minute) {
            return;
        }
        state.last_ping_minute = Some(minute);
        self.bus.publish(Event::Ping(PingEvent {
            timestamp: when,
            symbol: self.config.symbol.clone(),
            strategy_name: self.config.strategy_name.clone(),
            exchange_name: self.config.exchange_name.clone(),
            frame_name: self.config.frame_name.clone(),
            backtest,
        }));
    }

    /// `timestamp` is the execution-clock `when` bound to this tick, never
    /// wall-clock time — §8 requires `backtest(key, candles)` to yield a
    /// byte-for-byte identical event stream given the same `when` sequence,
    /// which a wall-clock stamp would break on every replay.
    #[allow(clippy::too_many_arguments)]
    fn publish_tick(
        &self,
        signal: Option<&Signal>,
        action: TickAction,
        current_price: f64,
        backtest: bool,
        when: DateTime<Utc>,
        close_reason: Option<CloseReason>,
        cancel_reason: Option<CancelReason>,
        cancel_id: Option<String>,
        close_timestamp: Option<DateTime<Utc>>,
        pnl: Option<keel_integration::event::Pnl>,
    ) {
        self.bus.publish(Event::Tick(TickResultEvent {
            timestamp: when,
            action,
            signal: signal.map(Signal::to_snapshot),
            current_price: Some(current_price),
            strategy_name: self.config.strategy_name.clone(),
            exchange_name: self.config.exchange_name.clone(),
            symbol: self.config.symbol.clone(),
            backtest,
            close_reason,
            cancel_reason,
            cancel_id,
            close_timestamp,
            pnl,
        }));
    }
}

fn active_position(signal: &Signal) -> ActivePosition {
    ActivePosition {
        signal_id: signal.id,
        symbol: signal.symbol.clone(),
        position: signal.position,
        price_open: signal.price_open,
        price_take_profit: signal.price_take_profit,
        price_stop_loss: signal.price_stop_loss,
    }
}

fn adjustment_event(signal: &Signal, action: AdjustmentAction, current_price: f64, level: Option<u32>) -> AdjustmentEvent {
    AdjustmentEvent {
        timestamp: Utc::now(),
        action,
        signal_id: signal.id,
        position: signal.position,
        current_price,
        level,
        price_open: signal.price_open,
        price_take_profit: signal.price_take_profit,
        price_stop_loss: signal.price_stop_loss,
        original_price_take_profit: signal.original_price_take_profit,
        original_price_stop_loss: signal.original_price_stop_loss,
        total_executed: signal.total_closed(),
        partial_history: signal.partial_history.clone(),
        note: None,
        pending_at: signal.pending_at,
        scheduled_at: signal.scheduled_at,
        minute_estimated_time: signal.minute_estimated_time,
    }
}
