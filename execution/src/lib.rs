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

//! # Execution
//!
//! Wraps a user-supplied market-data schema ([`schema::ExchangeSchema`])
//! behind a single [`adapter::ExchangeAdapter`] (§4.3) that every other
//! component — the risk engine, the tick engine, the analytics crate —
//! goes through rather than calling user code directly. The adapter is the
//! one place look-ahead is enforced: every query is checked against the
//! [`keel_integration::clock::ExecutionClock`] bound for the current tick.

pub mod adapter;
pub mod candle;
pub mod error;
pub mod schema;

pub use adapter::ExchangeAdapter;
pub use candle::Candle;
pub use error::{ExchangeError, LookAheadError, RawCandlesError};
pub use schema::ExchangeSchema;
