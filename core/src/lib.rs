#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]
//! # Keel Core
//!
//! The Signal State Machine, the Tick Engine, the Instance Registry, and the
//! [`Controller`](controller::Controller) API — the execution clock consumers that turn a
//! per-tick `(symbol, strategy, exchange)` resolution into a running, crash-durable
//! long/short signal lifecycle (schedule → activate → partial-exit/trailing/breakeven →
//! close), with risk arbitration and an event bus fan-out sitting in between.
//!
//! ## Layout
//!
//! - [`engine`]: the state machine (`Signal` and its mutations) and the pure price-trigger
//!   logic (`state_machine`) it's driven with.
//! - [`instance`]: `Instance`, the mutex-serialized per-key tick driver that owns one
//!   signal's lifecycle end to end.
//! - [`registry`]: `InstanceRegistry`, the memoized `InstanceKey -> Instance` map with
//!   double-checked-locking construction.
//! - [`controller`]: `Controller`, the single public entry point — schema registration,
//!   instance resolution, and every per-instance verb.
//! - [`system`]: ambient configuration (`SystemConfig`, `InstanceConfig`).
//! - [`logging`]: standardised `tracing` initialisation for the engine.
//! - [`error`]: the aggregate [`error::EngineError`] type.

/// The Signal State Machine and the pure price-trigger logic the Tick Engine drives it with.
pub mod engine;

/// Aggregate error type raised by the Controller API, state machine, and registry.
pub mod error;

/// The mutex-serialized per-instance tick driver owning one signal's lifecycle end to end.
pub mod instance;

/// Standardised `tracing` initialisation for the engine.
pub mod logging;

/// The memoized `InstanceKey -> Instance` map.
pub mod registry;

/// Ambient configuration for a full Keel engine instance.
pub mod system;

/// `Controller`: schema registration, instance resolution, and every per-instance verb.
pub mod controller;

pub use controller::Controller;
pub use engine::Signal;
pub use error::EngineError;
pub use instance::Instance;
pub use registry::{InstanceKey, InstanceRegistry, InstanceStatus};
pub use system::{InstanceConfig, SystemConfig};
