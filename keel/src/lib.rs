//! "keel" facade crate
//!
//! Provides a single entry point that re-exports the main modules of the
//! Keel ecosystem. Useful for users who prefer to depend on just one crate
//! rather than pulling in `keel-core`, `keel-risk`, etc. individually.
//!
//! # Example
//! ```rust
//! use keel::core; // access modules via re-export
//! use keel::markets::Position; // long/short side
//! let _side = Position::Long;
//! // Controller available at keel::core::Controller, construction requires
//! // a SystemConfig, a PersistenceStore and an EventBus.
//! ```

// Re-export of internal crates with organized namespaces
pub use keel_analytics as analytics;
pub use keel_core as core;
pub use keel_data as data;
pub use keel_execution as execution;
pub use keel_integration as integration;
pub use keel_markets as markets;
pub use keel_risk as risk;
pub use keel_strategies as strategies;
pub use keel_trader as trader;

// Flat (shallow) re-export of very frequently used symbols
pub use keel_core::{Controller, EngineError, Instance, InstanceKey, Signal};
pub use keel_markets::{ExchangeName, FrameName, Mode, Position, StrategyName, Symbol};

// Optional prelude for single import
pub mod prelude {
    pub use crate::core::{Controller, EngineError, Instance, InstanceKey, Signal, SystemConfig};
    pub use crate::execution::{ExchangeAdapter, ExchangeSchema};
    pub use crate::markets::{ExchangeName, FrameName, Mode, Position, StrategyName, Symbol};
    pub use crate::trader::{SignalDto, StrategySchema};
}
