#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Risk
//!
//! Per-instance active-position ledger and the composable rule tree a
//! strategy schema's `riskName`/`riskList` builds (§4.5).
//!
//! - [`check`] — [`check::RiskCheck`], the single-rule interface, plus a
//!   couple of concrete checks.
//! - [`rule`] — [`rule::RiskRule`], the `Leaf | Merge` composition tree.
//! - [`ledger`] — [`ledger::RiskEngine`], keyed by
//!   `(riskName, exchange, frame, mode)`.
//! - [`error`] — [`error::RiskReject`].

pub mod check;
pub mod error;
pub mod ledger;
pub mod rule;

pub use check::RiskCheck;
pub use error::RiskReject;
pub use ledger::{ActivePosition, RiskEngine, RiskLedgerKey};
pub use rule::{PendingSignalView, RiskCheckInput, RiskRule};
