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

//! # Trader
//!
//! Core strategy abstractions (traits + DTOs). Concrete strategies live in
//! `keel-strategies`; this crate only fixes the `getSignal` contract a
//! strategy schema must satisfy (§6).

pub mod schema;

pub use schema::{SignalDto, StrategySchema};
