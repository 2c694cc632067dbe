//! End-to-end scenarios (§8): each drives a [`Controller`]-resolved
//! [`keel_core::instance::Instance`] through its backtest sweep candle by
//! candle, or through the direct verbs, and asserts on the event stream the
//! bus observed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use keel_core::controller::Controller;
use keel_core::registry::InstanceKey;
use keel_core::system::SystemConfig;
use keel_data::store::FileSystemStore;
use keel_execution::candle::Candle;
use keel_execution::error::ExchangeError;
use keel_execution::schema::ExchangeSchema;
use keel_integration::bus::EventBus;
use keel_integration::event::{AdjustmentAction, CancelReason, CloseReason, Event, Topic, TickAction};
use keel_markets::{ExchangeName, FrameName, Interval, Mode, Position, StrategyName, Symbol};
use keel_trader::schema::{SignalDto, StrategySchema};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct NullExchange(ExchangeName);

#[async_trait]
impl ExchangeSchema for NullExchange {
    fn exchange_name(&self) -> ExchangeName {
        self.0.clone()
    }

    async fn get_candles(
        &self,
        _symbol: &Symbol,
        _interval: Interval,
        _since: DateTime<Utc>,
        _limit: usize,
        _backtest: bool,
    ) -> Result<Vec<Candle>, ExchangeError> {
        Ok(Vec::new())
    }
}

/// Hands out `dto` exactly once (the first `get_signal` call), then `None`
/// forever — a backtest sweep only calls `get_signal` while the instance is
/// idle, so one shot is all a scenario needs.
#[derive(Debug)]
struct OnceSignal {
    name: StrategyName,
    risk_name: Option<String>,
    dto: Mutex<Option<SignalDto>>,
}

impl OnceSignal {
    fn new(name: &str, dto: SignalDto) -> Self {
        Self {
            name: StrategyName::new(name),
            risk_name: None,
            dto: Mutex::new(Some(dto)),
        }
    }

    fn with_risk(mut self, risk_name: &str) -> Self {
        self.risk_name = Some(risk_name.to_string());
        self
    }
}

#[async_trait]
impl StrategySchema for OnceSignal {
    fn strategy_name(&self) -> StrategyName {
        self.name.clone()
    }

    fn interval(&self) -> Interval {
        Interval::M1
    }

    async fn get_signal(&self, _symbol: &Symbol) -> Option<SignalDto> {
        self.dto.lock().unwrap().take()
    }

    fn risk_name(&self) -> Option<String> {
        self.risk_name.clone()
    }
}

fn when(minute: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(minute * 60, 0).unwrap()
}

fn candle(minute: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        close_time: when(minute),
        open,
        high,
        low,
        close,
        volume: 1.0,
    }
}

fn flat(minute: i64, price: f64) -> Candle {
    candle(minute, price, price, price, price)
}

/// A fresh [`Controller`] over a temp-dir-backed [`FileSystemStore`], plus
/// the [`EventBus`] handed to it (kept separately so the test can subscribe
/// to it directly).
fn controller() -> (Controller, EventBus, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let system = SystemConfig {
        persistence_root: dir.path().to_path_buf(),
        ..SystemConfig::default()
    };
    let persistence = Arc::new(FileSystemStore::new(dir.path()));
    let bus = EventBus::new();
    let controller = Controller::new(system, persistence, bus.clone());
    (controller, bus, dir)
}

fn subscribe_all(bus: &EventBus) -> Arc<Mutex<Vec<Event>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    for topic in [
        Topic::TickAny,
        Topic::PartialProfit,
        Topic::PartialLoss,
        Topic::Breakeven,
        Topic::Ping,
        Topic::RiskReject,
    ] {
        let events = Arc::clone(&events);
        bus.subscribe(topic, move |event| events.lock().unwrap().push(event.clone()));
    }
    events
}

fn key(strategy: &str, exchange: &str, mode: Mode) -> InstanceKey {
    InstanceKey::new(Symbol::new("BTCUSDT"), StrategyName::new(strategy), ExchangeName::new(exchange), FrameName::default(), mode)
}

async fn run_sweep(controller: &Controller, key: InstanceKey, candles: Vec<Candle>) -> Vec<TickAction> {
    let instance = controller.resolve(key).await.unwrap();
    let mut stream = instance.backtest_sweep(candles);
    let mut actions = Vec::new();
    while let Some(result) = stream.next().await {
        actions.push(result.unwrap());
    }
    actions
}

fn tick_actions(events: &[Event]) -> Vec<TickAction> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Tick(tick) => Some(tick.action),
            _ => None,
        })
        .collect()
}

/// Scenario 1: immediate long, TP hit.
#[tokio::test]
async fn scenario_immediate_long_tp_hit() {
    let (controller, bus, _dir) = controller();
    let events = subscribe_all(&bus);

    let strategy = Arc::new(OnceSignal::new("immediate-tp", SignalDto::new(Position::Long, 51_000.0, 49_000.0, 60)));
    controller.register_strategy(strategy).unwrap();
    controller.register_exchange(Arc::new(NullExchange(ExchangeName::new("sim")))).unwrap();

    let key = key("immediate-tp", "sim", Mode::Backtest);
    let candles = vec![flat(0, 50_000.0), candle(1, 50_800.0, 51_100.0, 50_500.0, 51_050.0)];

    let actions = run_sweep(&controller, key, candles).await;
    assert_eq!(actions, vec![TickAction::Opened, TickAction::Closed]);

    let events = events.lock().unwrap();
    assert_eq!(tick_actions(&events), vec![TickAction::Opened, TickAction::Active, TickAction::Closed]);

    let Event::Tick(closed) = events.iter().find(|e| matches!(e, Event::Tick(t) if t.action == TickAction::Closed)).unwrap() else {
        unreachable!()
    };
    assert_eq!(closed.close_reason, Some(CloseReason::TakeProfit));
    let pnl = closed.pnl.unwrap();
    assert_eq!(pnl.price_open, 50_000.0);
    assert_eq!(pnl.price_close, 51_000.0);
    assert!(pnl.pnl_percentage > 0.0);
    assert!(pnl.pnl_percentage < (51_000.0 - 50_000.0) / 50_000.0);
}

/// Scenario 2: scheduled long activated then SL.
#[tokio::test]
async fn scenario_scheduled_long_activated_then_stop_loss() {
    let (controller, bus, _dir) = controller();
    let events = subscribe_all(&bus);

    let dto = SignalDto::new(Position::Long, 52_000.0, 48_000.0, 120).with_price_open(49_000.0);
    controller.register_strategy(Arc::new(OnceSignal::new("scheduled-sl", dto))).unwrap();
    controller.register_exchange(Arc::new(NullExchange(ExchangeName::new("sim")))).unwrap();

    let key = key("scheduled-sl", "sim", Mode::Backtest);
    let candles = vec![
        flat(0, 50_000.0),
        candle(1, 49_050.0, 49_100.0, 48_900.0, 49_050.0),
        candle(2, 48_000.0, 48_050.0, 47_900.0, 48_000.0),
    ];

    // The activation tick's *return value* comes from `step_active`, which
    // only suppresses the redundant `Active` event publish on activation —
    // not its own return value — so this tick reports `Active`, not
    // `Opened`, even though the bus saw an `Opened` event for it.
    let actions = run_sweep(&controller, key, candles).await;
    assert_eq!(actions, vec![TickAction::Scheduled, TickAction::Active, TickAction::Closed]);

    let events = events.lock().unwrap();
    assert_eq!(
        tick_actions(&events),
        vec![TickAction::Scheduled, TickAction::Opened, TickAction::Active, TickAction::Closed]
    );
    let Event::Tick(closed) = events.iter().find(|e| matches!(e, Event::Tick(t) if t.action == TickAction::Closed)).unwrap() else {
        unreachable!()
    };
    assert_eq!(closed.close_reason, Some(CloseReason::StopLoss));
    assert_eq!(closed.pnl.unwrap().price_close, 48_000.0);
}

/// Scenario 3: scheduled cancelled on timeout.
#[tokio::test]
async fn scenario_scheduled_cancelled_on_timeout() {
    let (controller, bus, _dir) = controller();
    let events = subscribe_all(&bus);

    let dto = SignalDto::new(Position::Long, 52_000.0, 48_000.0, 120).with_price_open(49_000.0);
    controller.register_strategy(Arc::new(OnceSignal::new("scheduled-timeout", dto))).unwrap();
    controller.register_exchange(Arc::new(NullExchange(ExchangeName::new("sim")))).unwrap();

    let key = key("scheduled-timeout", "sim", Mode::Backtest);
    let candles = vec![flat(0, 50_000.0), flat(121, 50_000.0)];

    let actions = run_sweep(&controller, key, candles).await;
    assert_eq!(actions, vec![TickAction::Scheduled, TickAction::Cancelled]);

    let events = events.lock().unwrap();
    let Event::Tick(cancelled) = events.iter().find(|e| matches!(e, Event::Tick(t) if t.action == TickAction::Cancelled)).unwrap() else {
        unreachable!()
    };
    assert_eq!(cancelled.cancel_reason, Some(CancelReason::Timeout));
}

/// Scenario 4: partial profit, then breakeven, then idempotent breakeven.
#[tokio::test]
async fn scenario_partial_profit_then_breakeven_idempotent() {
    let (controller, bus, _dir) = controller();
    let events = subscribe_all(&bus);

    let dto = SignalDto::new(Position::Long, 110.0, 90.0, 1_000);
    controller.register_strategy(Arc::new(OnceSignal::new("partials", dto))).unwrap();
    controller.register_exchange(Arc::new(NullExchange(ExchangeName::new("sim")))).unwrap();

    let key = key("partials", "sim", Mode::Backtest);
    run_sweep(&controller, key.clone(), vec![flat(0, 100.0)]).await;

    assert!(controller.partial_profit(key.clone(), 25.0, 101.0).await.unwrap());
    assert!(controller.breakeven(key.clone(), 100.4).await.unwrap());
    assert!(!controller.breakeven(key.clone(), 100.5).await.unwrap());

    let events = events.lock().unwrap();
    let adjustments: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Adjustment(a) => Some(a),
            _ => None,
        })
        .collect();
    assert_eq!(adjustments.len(), 2, "the second breakeven must not emit an event");
    assert_eq!(adjustments[0].action, AdjustmentAction::Profit);
    assert_eq!(adjustments[0].total_executed, 25.0);
    assert_eq!(adjustments[1].action, AdjustmentAction::Breakeven);
}

/// Scenario 5: risk reject. Two strategies sharing a `riskName` (and thus
/// the same ledger bucket) on the same exchange/mode; the second's
/// `getSignal` is rejected while the first's position is active.
#[tokio::test]
async fn scenario_risk_reject_when_active_position_count_at_limit() {
    let (controller, bus, _dir) = controller();
    let events = subscribe_all(&bus);

    let dto_a = SignalDto::new(Position::Long, 110.0, 90.0, 1_000);
    let dto_b = SignalDto::new(Position::Long, 120.0, 80.0, 1_000);
    controller.register_strategy(Arc::new(OnceSignal::new("risk-a", dto_a).with_risk("shared"))).unwrap();
    controller.register_strategy(Arc::new(OnceSignal::new("risk-b", dto_b).with_risk("shared"))).unwrap();
    controller.register_exchange(Arc::new(NullExchange(ExchangeName::new("sim")))).unwrap();
    controller
        .register_risk("shared", keel_risk::rule::RiskRule::leaf(keel_risk::check::CheckMaxActivePositions::new(1)))
        .unwrap();

    let key_a = key("risk-a", "sim", Mode::Backtest);
    let key_b = key("risk-b", "sim", Mode::Backtest);

    let actions_a = run_sweep(&controller, key_a, vec![flat(0, 100.0)]).await;
    assert_eq!(actions_a, vec![TickAction::Opened]);

    let actions_b = run_sweep(&controller, key_b, vec![flat(0, 100.0)]).await;
    assert_eq!(actions_b, vec![TickAction::Idle], "rejected signals leave the instance idle");

    let events = events.lock().unwrap();
    let rejects: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::RiskReject(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(rejects.len(), 1);
    assert_eq!(rejects[0].active_position_count, 1);
}

/// Scenario 6: trailing stop monotonicity.
#[tokio::test]
async fn scenario_trailing_stop_monotonicity() {
    let (controller, bus, _dir) = controller();
    let _events = subscribe_all(&bus);

    let dto = SignalDto::new(Position::Long, 110.0, 90.0, 1_000);
    controller.register_strategy(Arc::new(OnceSignal::new("trailing", dto))).unwrap();
    controller.register_exchange(Arc::new(NullExchange(ExchangeName::new("sim")))).unwrap();

    let key = key("trailing", "sim", Mode::Backtest);
    run_sweep(&controller, key.clone(), vec![flat(0, 100.0)]).await;

    assert!(controller.trailing_stop(key.clone(), -50.0).await.unwrap());
    let snapshot = controller.get_data(key.clone()).await.unwrap().unwrap();
    assert_eq!(snapshot.trailing_price_stop_loss, Some(95.0));

    assert!(!controller.trailing_stop(key.clone(), -10.0).await.unwrap(), "91 is worse than 95");
    let snapshot = controller.get_data(key.clone()).await.unwrap().unwrap();
    assert_eq!(snapshot.trailing_price_stop_loss, Some(95.0));

    assert!(controller.trailing_stop(key.clone(), -80.0).await.unwrap());
    let snapshot = controller.get_data(key.clone()).await.unwrap().unwrap();
    assert_eq!(snapshot.trailing_price_stop_loss, Some(98.0));
}
