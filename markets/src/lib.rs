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

//! # Markets
//!
//! Smallest shared vocabulary of the Keel ecosystem: the identity newtypes
//! used to key an instance (`Symbol`, `StrategyName`, `ExchangeName`,
//! `FrameName`), the closed candle `Interval` enum, the `Mode` a signal runs
//! under (`Live`/`Backtest`), and the `Position` side a signal takes
//! (`Long`/`Short`). Every other crate in the workspace depends on this one;
//! it depends on nothing else in the workspace.

/// `Symbol`, `StrategyName`, `ExchangeName`, `FrameName` identity newtypes.
pub mod identity;

/// The closed candle `Interval` enum (`1m`..`1d`).
pub mod interval;

/// Live vs backtest execution `Mode`.
pub mod mode;

/// `Position` (long/short) and its sign convention.
pub mod position;

pub use identity::{ExchangeName, FrameName, StrategyName, Symbol};
pub use interval::Interval;
pub use mode::Mode;
pub use position::Position;
