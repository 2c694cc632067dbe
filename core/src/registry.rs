//! [`InstanceRegistry`] (§4.8, §9 "memoized lookups"): a concurrent map
//! keyed by the canonical `symbol:strategy:exchange[:frame]:(backtest|live)`
//! string, with double-checked-locking insertion so two concurrent callers
//! resolving the same key never construct two instances — the second
//! caller waits on the first's in-flight construction and reuses its result.

use crate::instance::Instance;
use keel_markets::{ExchangeName, FrameName, Mode, StrategyName, Symbol};
use keel_integration::collection::FnvIndexMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// `symbol:strategy:exchange[:frame]:(backtest|live)` (§4.8). `frame` is
/// omitted when live (empty [`FrameName`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub symbol: Symbol,
    pub strategy_name: StrategyName,
    pub exchange_name: ExchangeName,
    pub frame_name: FrameName,
    pub mode: Mode,
}

impl InstanceKey {
    pub fn new(symbol: Symbol, strategy_name: StrategyName, exchange_name: ExchangeName, frame_name: FrameName, mode: Mode) -> Self {
        Self {
            symbol,
            strategy_name,
            exchange_name,
            frame_name,
            mode,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.symbol, self.strategy_name, self.exchange_name)?;
        if !self.frame_name.is_live() {
            write!(f, ":{}", self.frame_name)?;
        }
        write!(f, ":{}", if self.mode.is_backtest() { "backtest" } else { "live" })
    }
}

/// Per-key construction state a [`InstanceRegistry::list`] caller observes
/// (§4.9 `list`). Distinct from the *signal's* own lifecycle state — this
/// tracks whether the `Instance` itself has finished constructing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Construction (schema lookups, rehydration from the persistence
    /// store) is in flight.
    Pending,
    /// Construction finished successfully; the instance is ready to tick.
    Fulfilled,
    /// Construction failed; the key stays rejected until
    /// [`InstanceRegistry::clear`] drops it.
    Rejected,
    /// Alias for `Fulfilled`, used by [`InstanceRegistry::list`] once a
    /// caller has successfully ticked the instance at least once.
    Ready,
}

enum Slot {
    Initializing(Arc<Notify>),
    Ready(Arc<Instance>),
    Rejected(String),
}

impl Slot {
    fn status(&self) -> InstanceStatus {
        match self {
            Slot::Initializing(_) => InstanceStatus::Pending,
            Slot::Ready(_) => InstanceStatus::Ready,
            Slot::Rejected(_) => InstanceStatus::Rejected,
        }
    }
}

/// Memoized `InstanceKey -> Arc<Instance>` map (§4.8). Cloning is cheap
/// (wraps an `Arc`); share one across every Controller entry point.
#[derive(Clone)]
pub struct InstanceRegistry {
    entries: Arc<Mutex<FnvIndexMap<InstanceKey, Slot>>>,
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRegistry").finish_non_exhaustive()
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(FnvIndexMap::default())),
        }
    }

    /// Returns the instance for `key`, constructing it via `init` if this is
    /// the first caller to resolve this key. Concurrent callers for the same
    /// key while construction is in flight wait on it rather than racing a
    /// duplicate construction, and all observe the same result.
    pub async fn get_or_init<F, Fut>(&self, key: InstanceKey, init: F) -> Result<Arc<Instance>, crate::error::EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<Instance>, crate::error::EngineError>>,
    {
        let mut init = Some(init);
        loop {
            let notify = {
                let mut guard = self.entries.lock().await;
                match guard.get(&key) {
                    Some(Slot::Ready(instance)) => return Ok(Arc::clone(instance)),
                    Some(Slot::Rejected(message)) => {
                        return Err(crate::error::EngineError::NotInitialized(message.clone()))
                    }
                    Some(Slot::Initializing(notify)) => Arc::clone(notify),
                    None => {
                        let notify = Arc::new(Notify::new());
                        guard.insert(key.clone(), Slot::Initializing(Arc::clone(&notify)));
                        drop(guard);

                        // We are the initializer: run it outside the lock and
                        // record the outcome, then wake every waiter.
                        let Some(init) = init.take() else {
                            unreachable!("initializer consumed twice")
                        };
                        let outcome = init().await;
                        let mut guard = self.entries.lock().await;
                        match &outcome {
                            Ok(instance) => {
                                guard.insert(key.clone(), Slot::Ready(Arc::clone(instance)));
                            }
                            Err(error) => {
                                guard.insert(key.clone(), Slot::Rejected(error.to_string()));
                            }
                        }
                        drop(guard);
                        notify.notify_waiters();
                        return outcome;
                    }
                }
            };
            notify.notified().await;
        }
    }

    /// Drops one entry, or every entry if `key` is `None` (§4.8). Dropping
    /// does not delete persisted state — a later `get_or_init` for the same
    /// key rehydrates from the [`keel_data::store::PersistenceStore`].
    pub async fn clear(&self, key: Option<&InstanceKey>) {
        let mut guard = self.entries.lock().await;
        match key {
            Some(key) => {
                guard.shift_remove(key);
            }
            None => guard.clear(),
        }
    }

    /// `{key, status}` for every known instance (§4.9 `list`).
    pub async fn list(&self) -> Vec<(InstanceKey, InstanceStatus)> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(key, slot)| (key.clone(), slot.status()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> InstanceKey {
        InstanceKey::new(
            Symbol::new("BTCUSDT"),
            StrategyName::new("s"),
            ExchangeName::new("x"),
            FrameName::default(),
            Mode::Live,
        )
    }

    #[test]
    fn display_omits_frame_when_live() {
        assert_eq!(key().to_string(), "BTCUSDT:s:x:live");
    }

    #[test]
    fn display_includes_frame_when_backtesting() {
        let mut k = key();
        k.frame_name = FrameName::new("session-1");
        k.mode = Mode::Backtest;
        assert_eq!(k.to_string(), "BTCUSDT:s:x:session-1:backtest");
    }

    #[tokio::test]
    async fn clear_with_no_key_drops_every_entry() {
        let registry = InstanceRegistry::new();
        registry.entries.lock().await.insert(key(), Slot::Rejected("boom".into()));
        registry.clear(None).await;
        assert!(registry.list().await.is_empty());
    }
}
