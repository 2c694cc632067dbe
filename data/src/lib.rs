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

//! # Data
//!
//! Crash durability for the engine (§4.2): a single signal must survive a
//! process restart with its state intact, and candle history should not be
//! re-fetched on every instance rehydration.
//!
//! - [`store`] — [`store::PersistenceStore`] and its filesystem
//!   implementation, [`store::FileSystemStore`].
//! - [`cache`] — [`cache::CandleCache`], a keyed candle store layered over
//!   the same atomic-write primitive.
//! - [`error`] — [`error::PersistError`].

pub mod cache;
pub mod error;
pub mod store;

pub use cache::CandleCache;
pub use error::PersistError;
pub use store::{FileSystemStore, PersistenceStore};
