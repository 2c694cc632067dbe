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
#![allow(clippy::type_complexity)]

//! # Integration
//!
//! Low-level framework underpinning the rest of the Keel ecosystem:
//!
//! - [`clock`] — the scoped [`clock::ExecutionClock`] context (§4.1) every
//!   exchange query and state mutation reads `when`/`backtest` from.
//! - [`bus`] — the in-process [`bus::EventBus`] multicast (§4.4).
//! - [`event`] — the `serde`-friendly wire payloads published on the bus and
//!   persisted as JSONL (§6).
//! - [`collection`] — small, fast collection aliases (`FnvIndexMap`) reused
//!   by the registry and risk ledger.
//! - [`channel`] — a thin [`channel::Tx`] abstraction over different channel
//!   kinds, used by [`Controller::background`](../keel_core/controller/index.html).

pub mod bus;
pub mod channel;
pub mod clock;
pub mod collection;
pub mod event;

/// Indicates an event stream has ended (mirrors `FeedEnded` in the wider
/// ecosystem idiom).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FeedEnded;

/// Communicates if something is terminal (eg/ requires shutdown).
pub trait Terminal {
    fn is_terminal(&self) -> bool;
}
