//! [`RiskEngine`] (§4.5): the `checkSignal`/`addSignal`/`removeSignal`
//! operations and the ledger they read and mutate.

use crate::error::RiskReject;
use crate::rule::{PendingSignalView, RiskCheckInput, RiskRule};
use keel_integration::collection::FnvIndexMap;
use keel_markets::{ExchangeName, FrameName, Position, Symbol};
use parking_lot::RwLock;
use uuid::Uuid;

/// `(riskName, exchange, frame, mode)` — the ledger partition a rule's
/// active-position view is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RiskLedgerKey {
    pub risk_name: String,
    pub exchange_name: ExchangeName,
    pub frame_name: FrameName,
    pub backtest: bool,
}

impl RiskLedgerKey {
    pub fn new(risk_name: impl Into<String>, exchange_name: ExchangeName, frame_name: FrameName, backtest: bool) -> Self {
        Self {
            risk_name: risk_name.into(),
            exchange_name,
            frame_name,
            backtest,
        }
    }
}

/// A ledger entry: the minimal shape a [`crate::check::RiskCheck`] needs
/// about a signal that is active (inserted after `opened`, per §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePosition {
    pub signal_id: Uuid,
    pub symbol: Symbol,
    pub position: Position,
    pub price_open: f64,
    pub price_take_profit: f64,
    pub price_stop_loss: f64,
}

/// Per-`(riskName, exchange, frame, mode)` active-position ledger plus the
/// rule evaluation entry point.
#[derive(Debug, Default)]
pub struct RiskEngine {
    ledger: RwLock<FnvIndexMap<RiskLedgerKey, Vec<ActivePosition>>>,
}

impl RiskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates `rule` against the ledger bucket for `key`. Returns `Ok`
    /// iff every rule in the tree accepts.
    pub fn check_signal(
        &self,
        key: &RiskLedgerKey,
        rule: &RiskRule,
        pending_signal: &PendingSignalView<'_>,
    ) -> Result<(), RiskReject> {
        let ledger = self.ledger.read();
        let active_positions = ledger.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let input = RiskCheckInput {
            pending_signal,
            active_position_count: active_positions.len(),
            active_positions,
        };
        rule.check(&input)
    }

    /// Evaluates `rule` against the ledger bucket for `key` and, if it
    /// accepts, inserts `position` — under the same `write()` guard, so a
    /// concurrent caller sharing `key` can never observe the pre-insert
    /// count and slip in between the check and the insert. Returns the
    /// inserted position's id (the reservation), which [`Self::remove_signal`]
    /// rolls back if the caller fails to persist the signal afterward.
    pub fn check_and_reserve(
        &self,
        key: &RiskLedgerKey,
        rule: &RiskRule,
        pending_signal: &PendingSignalView<'_>,
        position: ActivePosition,
    ) -> Result<Uuid, RiskReject> {
        let mut ledger = self.ledger.write();
        let active_positions = ledger.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let input = RiskCheckInput {
            pending_signal,
            active_position_count: active_positions.len(),
            active_positions,
        };
        rule.check(&input)?;

        let id = position.signal_id;
        ledger.entry(key.clone()).or_default().push(position);
        Ok(id)
    }

    /// Inserts a signal into the ledger once it becomes active (after
    /// `opened`).
    pub fn add_signal(&self, key: &RiskLedgerKey, position: ActivePosition) {
        self.ledger.write().entry(key.clone()).or_default().push(position);
    }

    /// Removes a signal from the ledger on close or pre-activation
    /// cancellation. No-op if the signal was never added (eg/ it was
    /// cancelled while still `scheduled`).
    pub fn remove_signal(&self, key: &RiskLedgerKey, signal_id: Uuid) {
        if let Some(positions) = self.ledger.write().get_mut(key) {
            positions.retain(|p| p.signal_id != signal_id);
        }
    }

    /// Current active-position count for `key`. Exposed for diagnostics and
    /// `Controller::get_data`.
    pub fn active_position_count(&self, key: &RiskLedgerKey) -> usize {
        self.ledger.read().get(key).map(Vec::len).unwrap_or(0)
    }
}
