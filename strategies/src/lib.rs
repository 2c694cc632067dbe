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

//! # Strategies
//!
//! Example [`keel_trader::StrategySchema`] implementations. Not part of the
//! engine's external contract — a reference for anyone wiring up a new
//! strategy.

pub mod threshold;

pub use threshold::ThresholdStrategy;
