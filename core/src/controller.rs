//! [`Controller`] (§4.9): the one public entry point. Resolves/memoizes
//! [`crate::instance::Instance`]s through the [`InstanceRegistry`], holds
//! the name-keyed strategy/exchange/risk-rule registries a schema author
//! registers up front, and forwards every per-instance verb to the
//! instance's own mutex (§5) rather than doing any of its own locking
//! beyond the registries.

use crate::error::EngineError;
use crate::instance::{Instance, SIGNALS_NAMESPACE};
use crate::registry::{InstanceKey, InstanceRegistry, InstanceStatus};
use crate::system::{InstanceConfig, SystemConfig};
use keel_data::store::PersistenceStore;
use keel_execution::adapter::ExchangeAdapter;
use keel_execution::candle::Candle;
use keel_execution::schema::ExchangeSchema;
use keel_integration::bus::EventBus;
use keel_integration::channel::{MpscTx, Tx};
use keel_integration::collection::FnvIndexMap;
use keel_integration::event::{SignalSnapshot, TickAction};
use keel_markets::{ExchangeName, StrategyName};
use keel_risk::ledger::{RiskEngine, RiskLedgerKey};
use keel_risk::rule::RiskRule;
use keel_trader::schema::StrategySchema;
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::mpsc;
use std::sync::Arc;

/// Returned by [`Controller::background`]. Calling [`Self::cancel`] — or
/// dropping every clone of the underlying stream consumer — stops the
/// sweep after the in-flight candle finishes (§5).
pub struct BackgroundHandle {
    tx: MpscTx<()>,
}

impl BackgroundHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(());
    }
}

/// Name-keyed registries plus the shared [`RiskEngine`] ledger, the
/// [`InstanceRegistry`], the [`PersistenceStore`], and the [`EventBus`]
/// every resolved [`Instance`] is wired against.
pub struct Controller {
    instances: InstanceRegistry,
    strategies: RwLock<FnvIndexMap<StrategyName, Arc<dyn StrategySchema>>>,
    exchanges: RwLock<FnvIndexMap<ExchangeName, Arc<dyn ExchangeSchema>>>,
    risks: RwLock<FnvIndexMap<String, Arc<RiskRule>>>,
    risk_engine: Arc<RiskEngine>,
    persistence: Arc<dyn PersistenceStore>,
    bus: EventBus,
    system: SystemConfig,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller").finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(system: SystemConfig, persistence: Arc<dyn PersistenceStore>, bus: EventBus) -> Self {
        Self {
            instances: InstanceRegistry::new(),
            strategies: RwLock::new(FnvIndexMap::default()),
            exchanges: RwLock::new(FnvIndexMap::default()),
            risks: RwLock::new(FnvIndexMap::default()),
            risk_engine: Arc::new(RiskEngine::new()),
            persistence,
            bus,
            system,
        }
    }

    /// Registers a strategy schema under its own name (§6). Re-registering
    /// the exact same `Arc` under a name already on file is an idempotent
    /// no-op; registering a *different* schema under an existing name is
    /// [`EngineError::DuplicateRegistration`].
    pub fn register_strategy(&self, schema: Arc<dyn StrategySchema>) -> Result<(), EngineError> {
        let name = schema.strategy_name();
        let mut guard = self.strategies.write();
        match guard.get(&name) {
            Some(existing) if Arc::ptr_eq(existing, &schema) => Ok(()),
            Some(_) => Err(EngineError::DuplicateRegistration { kind: "strategy", name: name.to_string() }),
            None => {
                guard.insert(name, schema);
                Ok(())
            }
        }
    }

    pub fn register_exchange(&self, schema: Arc<dyn ExchangeSchema>) -> Result<(), EngineError> {
        let name = schema.exchange_name();
        let mut guard = self.exchanges.write();
        match guard.get(&name) {
            Some(existing) if Arc::ptr_eq(existing, &schema) => Ok(()),
            Some(_) => Err(EngineError::DuplicateRegistration { kind: "exchange", name: name.to_string() }),
            None => {
                guard.insert(name, schema);
                Ok(())
            }
        }
    }

    /// Registers a named [`RiskRule`] tree (§4.5 `riskName`/`riskList`).
    /// `RiskRule` carries trait objects with no `PartialEq`, so a
    /// re-registration under an existing name is compared structurally via
    /// its `Debug` rendering rather than by identity.
    pub fn register_risk(&self, name: impl Into<String>, rule: RiskRule) -> Result<(), EngineError> {
        let name = name.into();
        let mut guard = self.risks.write();
        match guard.get(&name) {
            Some(existing) if format!("{existing:?}") == format!("{rule:?}") => Ok(()),
            Some(_) => Err(EngineError::DuplicateRegistration { kind: "risk", name }),
            None => {
                guard.insert(name, Arc::new(rule));
                Ok(())
            }
        }
    }

    fn lookup_strategy(&self, name: &StrategyName) -> Result<Arc<dyn StrategySchema>, EngineError> {
        self.strategies.read().get(name).cloned().ok_or_else(|| EngineError::UnknownStrategy(name.clone()))
    }

    fn lookup_exchange(&self, name: &ExchangeName) -> Result<Arc<dyn ExchangeSchema>, EngineError> {
        self.exchanges.read().get(name).cloned().ok_or_else(|| EngineError::UnknownExchange(name.clone()))
    }

    /// Builds the merged [`RiskRule`] for a strategy: `riskName` first (if
    /// any), then every name in `riskList`, in schema order (§4.5). A
    /// schema naming neither gets [`RiskRule::none`].
    fn resolve_risk_rule(&self, strategy: &dyn StrategySchema) -> Result<RiskRule, EngineError> {
        let mut names = Vec::new();
        if let Some(name) = strategy.risk_name() {
            names.push(name);
        }
        names.extend(strategy.risk_list());

        if names.is_empty() {
            return Ok(RiskRule::none());
        }

        let risks = self.risks.read();
        let mut rules = Vec::with_capacity(names.len());
        for name in names {
            let rule = risks.get(&name).ok_or_else(|| EngineError::UnknownRisk(name.clone()))?;
            rules.push((**rule).clone());
        }
        Ok(RiskRule::merge(rules))
    }

    /// Resolves (constructing and memoizing if necessary) the
    /// [`Instance`] for `key` (§4.8).
    pub async fn resolve(&self, key: InstanceKey) -> Result<Arc<Instance>, EngineError> {
        let strategy = self.lookup_strategy(&key.strategy_name)?;
        let exchange_schema = self.lookup_exchange(&key.exchange_name)?;
        let risk_rule = self.resolve_risk_rule(strategy.as_ref())?;

        let risk_name = strategy.risk_name().unwrap_or_else(|| "default".to_string());
        let risk_ledger_key = RiskLedgerKey::new(risk_name, key.exchange_name.clone(), key.frame_name.clone(), key.mode.is_backtest());
        let config = InstanceConfig::new(key.symbol.clone(), key.strategy_name.clone(), key.exchange_name.clone(), key.frame_name.clone(), key.mode, self.system.clone());
        let exchange = ExchangeAdapter::new(exchange_schema);

        let risk_engine = Arc::clone(&self.risk_engine);
        let persistence = Arc::clone(&self.persistence);
        let bus = self.bus.clone();
        let init_key = key.clone();

        self.instances
            .get_or_init(key, move || async move {
                Instance::new(init_key, config, strategy, exchange, risk_engine, risk_rule, risk_ledger_key, persistence, bus).await
            })
            .await
    }

    /// `run(key)` (§4.7/§4.9): one live tick.
    pub async fn run(&self, key: InstanceKey) -> Result<TickAction, EngineError> {
        let instance = self.resolve(key).await?;
        instance.tick_once().await
    }

    /// `background(key, candles)` (§4.9): drains the backtest sweep on a
    /// spawned task, returning a handle whose `cancel` stops it after the
    /// in-flight candle (§5). Errors from individual ticks are logged
    /// rather than propagated — there is no caller left to receive them
    /// once the sweep has been backgrounded.
    pub async fn background(&self, key: InstanceKey, candles: Vec<Candle>) -> Result<BackgroundHandle, EngineError> {
        let instance = self.resolve(key).await?;
        let (tx, rx) = mpsc::channel::<()>();

        tokio::spawn(async move {
            let mut stream = instance.backtest_sweep(candles);
            while let Some(result) = stream.next().await {
                if let Err(error) = result {
                    tracing::error!(%error, "backtest tick failed");
                }
                if rx.try_recv().is_ok() {
                    break;
                }
            }
        });

        Ok(BackgroundHandle { tx: MpscTx(tx) })
    }

    /// `stop(key)` (§4.9/§5): graceful, observed at the top of the next
    /// tick; does not force-close an active signal.
    pub async fn stop(&self, key: InstanceKey) -> Result<(), EngineError> {
        let instance = self.resolve(key).await?;
        instance.stop().await;
        Ok(())
    }

    /// `cancel(key, cancelId?)` (§4.9/§5). Returns `false` if the instance
    /// has no `scheduled` signal to cancel.
    pub async fn cancel(&self, key: InstanceKey, cancel_id: Option<String>) -> Result<bool, EngineError> {
        let instance = self.resolve(key).await?;
        Ok(instance.cancel(cancel_id).await)
    }

    pub async fn partial_profit(&self, key: InstanceKey, percent: f64, price: f64) -> Result<bool, EngineError> {
        let instance = self.resolve(key).await?;
        instance.partial_profit(percent, price).await
    }

    pub async fn partial_loss(&self, key: InstanceKey, percent: f64, price: f64) -> Result<bool, EngineError> {
        let instance = self.resolve(key).await?;
        instance.partial_loss(percent, price).await
    }

    pub async fn trailing_stop(&self, key: InstanceKey, percent_shift: f64) -> Result<bool, EngineError> {
        let instance = self.resolve(key).await?;
        instance.trailing_stop(percent_shift).await
    }

    pub async fn breakeven(&self, key: InstanceKey, current_price: f64) -> Result<bool, EngineError> {
        let instance = self.resolve(key).await?;
        instance.breakeven(current_price).await
    }

    /// `getData(key)` (§4.9): the current signal snapshot, if any.
    pub async fn get_data(&self, key: InstanceKey) -> Result<Option<SignalSnapshot>, EngineError> {
        let instance = self.resolve(key).await?;
        Ok(instance.snapshot().await)
    }

    /// `getReport(key)` (§4.9): the raw data a report writer would format
    /// (§1 Non-goals excludes the writer itself — Markdown/JSONL
    /// rendering is a separate, out-of-scope consumer of this data and of
    /// the event bus).
    pub async fn get_report(&self, key: InstanceKey) -> Result<Option<SignalSnapshot>, EngineError> {
        self.get_data(key).await
    }

    /// `dump(key)` (§4.9): the raw persisted blob for this key's signal
    /// slot, straight off the [`PersistenceStore`] — bytes, not a
    /// formatted report.
    pub async fn dump(&self, key: &InstanceKey) -> Result<Option<Vec<u8>>, EngineError> {
        self.persistence.read(SIGNALS_NAMESPACE, &key.to_string()).await.map_err(EngineError::from)
    }

    /// `list()` (§4.8/§4.9): `{key, status}` for every known instance.
    pub async fn list(&self) -> Vec<(InstanceKey, InstanceStatus)> {
        self.instances.list().await
    }

    /// Drops one or every memoized instance (§4.8). Persisted state
    /// survives; a later resolve rehydrates it.
    pub async fn clear(&self, key: Option<&InstanceKey>) {
        self.instances.clear(key).await;
    }
}
