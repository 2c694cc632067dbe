//! [`RiskRule`], the composable rule tree a strategy schema's
//! `riskName`/`riskList` builds (§4.5): `Merge(rules)` accepts iff every
//! member accepts, so the empty merge — the default rule when a schema
//! names neither — is a no-op that always accepts.

use crate::check::RiskCheck;
use crate::error::RiskReject;
use crate::ledger::ActivePosition;
use keel_markets::{ExchangeName, FrameName, Position, StrategyName, Symbol};
use std::sync::Arc;

/// The pending signal a [`RiskRule`] is asked to accept or reject, before
/// it has been assigned an id or persisted (§4.5/§4.6 step 2).
#[derive(Debug, Clone, Copy)]
pub struct PendingSignalView<'a> {
    pub symbol: &'a Symbol,
    pub strategy_name: &'a StrategyName,
    pub exchange_name: &'a ExchangeName,
    pub frame_name: &'a FrameName,
    pub backtest: bool,
    pub position: Position,
    pub price_open: f64,
    pub price_take_profit: f64,
    pub price_stop_loss: f64,
}

/// What a [`RiskCheck`] or [`RiskRule`] sees: the pending signal plus the
/// ledger's current view of this `(riskName, exchange, frame, mode)`
/// bucket.
#[derive(Debug, Clone, Copy)]
pub struct RiskCheckInput<'a> {
    pub pending_signal: &'a PendingSignalView<'a>,
    pub active_position_count: usize,
    pub active_positions: &'a [ActivePosition],
}

/// `Leaf(check)` defers to a single [`RiskCheck`]; `Merge(rules)` accepts
/// iff every member accepts, short-circuiting on the first rejection.
#[derive(Clone)]
pub enum RiskRule {
    Leaf(Arc<dyn RiskCheck>),
    Merge(Vec<RiskRule>),
}

impl std::fmt::Debug for RiskRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskRule::Leaf(check) => f.debug_tuple("Leaf").field(&check.name()).finish(),
            RiskRule::Merge(rules) => f.debug_tuple("Merge").field(rules).finish(),
        }
    }
}

impl RiskRule {
    pub fn leaf(check: impl RiskCheck + 'static) -> Self {
        RiskRule::Leaf(Arc::new(check))
    }

    pub fn merge(rules: impl IntoIterator<Item = RiskRule>) -> Self {
        RiskRule::Merge(rules.into_iter().collect())
    }

    /// The always-accepting default rule (§4.5): a schema naming neither
    /// `riskName` nor `riskList` gets this.
    pub fn none() -> Self {
        RiskRule::Merge(Vec::new())
    }

    pub fn check(&self, input: &RiskCheckInput<'_>) -> Result<(), RiskReject> {
        match self {
            RiskRule::Leaf(check) => check.check(input),
            RiskRule::Merge(rules) => {
                for rule in rules {
                    rule.check(input)?;
                }
                Ok(())
            }
        }
    }
}
