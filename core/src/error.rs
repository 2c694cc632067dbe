//! [`EngineError`] (§7): the aggregate error type the `keel-core`
//! Controller API, state machine and registry raise synchronously. A flat
//! enum aggregating the lower-crate error types via `#[from]`, plus variants
//! for the schema-lookup and state-misuse errors that are native to this
//! crate.

use keel_execution::error::ExchangeError;
use keel_markets::{ExchangeName, StrategyName};
use thiserror::Error;

/// Central error type for `keel-core`. §7 groups these by propagation
/// policy: schema-lookup and state-misuse variants are synchronous and
/// never retried; [`EngineError::Exchange`] and [`EngineError::Persist`]
/// propagate out of a tick and are the caller's call whether to retry.
/// `RiskReject` is deliberately absent — §4.5/§7 specify it is only ever
/// observed as a `risk-reject` bus event, never returned as an `Err`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A [`keel_data::store::PersistenceStore`] operation was attempted
    /// before its namespace's `wait_for_init` completed.
    #[error("namespace {0} has not been initialized")]
    NotInitialized(String),

    /// No [`keel_trader::StrategySchema`] is registered under this name.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(StrategyName),

    /// No risk rule is registered under this name (§4.5 `riskName`/`riskList`).
    #[error("unknown risk: {0}")]
    UnknownRisk(String),

    /// No [`keel_execution::schema::ExchangeSchema`] is registered under
    /// this name.
    #[error("unknown exchange: {0}")]
    UnknownExchange(ExchangeName),

    /// A name was re-registered with a schema that differs from the one
    /// already on file.
    #[error("{kind} {name} is already registered with a different schema")]
    DuplicateRegistration { kind: &'static str, name: String },

    /// [`crate::engine::signal::Signal::partial_profit`] /
    /// [`crate::engine::signal::Signal::partial_loss`] received a percent
    /// outside `(0, 100]`.
    #[error("invalid partial percent {0}: must be in (0, 100]")]
    BadPartial(f64),

    /// Partial/trailing/breakeven/cancel invoked with no pending signal,
    /// or partial/trailing/breakeven invoked while the signal is still
    /// `scheduled` (§4.6/§7).
    #[error("invalid state for this operation: {0}")]
    InvalidState(&'static str),

    /// Upstream market-data failure surfaced by the
    /// [`keel_execution::adapter::ExchangeAdapter`], including a rejected
    /// look-ahead request.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Persistence I/O failure (§4.2/§7).
    #[error(transparent)]
    Persist(#[from] keel_data::error::PersistError),

    /// A spawned background task (`Controller::background`) panicked or
    /// was cancelled.
    #[error("background task failed: {0}")]
    JoinError(String),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::JoinError(value.to_string())
    }
}
