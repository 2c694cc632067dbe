//! [`RiskReject`] (§4.5): the only way a [`crate::check::RiskCheck`] fails.

use thiserror::Error;

/// A rule declined to accept a pending signal. `rejection_id` is a stable,
/// machine-matchable slug (eg/ the rule's name); `rejection_note` is a
/// human-readable detail surfaced on the `risk-reject` event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{rejection_id}: {rejection_note}")]
pub struct RiskReject {
    pub rejection_id: String,
    pub rejection_note: String,
}

impl RiskReject {
    pub fn new(rejection_id: impl Into<String>, rejection_note: impl Into<String>) -> Self {
        Self {
            rejection_id: rejection_id.into(),
            rejection_note: rejection_note.into(),
        }
    }
}
