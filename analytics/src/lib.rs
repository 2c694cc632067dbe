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

//! # Analytics
//!
//! Realized PnL accounting (§4.6 "PnL on close"). Fees and slippage are
//! baked into every leg's return before the weighted sum across partials
//! and the close-price remainder is taken.

pub mod pnl;

pub use pnl::{per_leg_pnl, realized_pnl, FeeSlippageConfig};
