//! The Signal State Machine (§4.6, ≈25% of budget) and the pure
//! price-trigger logic the Tick Engine (§4.7, ≈20%) drives it with.
//!
//! [`signal`] owns the `Signal` entity and every mutation that changes its
//! stored fields. [`state_machine`] is deliberately I/O-free: it answers
//! "did price cross this level" and "which level wins on a tie", so those
//! questions can be tested without an exchange, a clock, or a persistence
//! store. [`crate::instance::Instance`] is the component that calls through
//! to both under its own mutex, in the fixed per-tick order §4.6 specifies.

pub mod signal;
pub mod state_machine;

pub use signal::Signal;
