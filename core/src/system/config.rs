//! [`SystemConfig`] / [`InstanceConfig`] (§6 "Numeric semantics", §4.6
//! Breakeven defaults): a plain `serde`-round-trippable configuration
//! struct, separate from the registries (strategy/risk/exchange name
//! lookup) which this crate treats as name-keyed maps the caller builds up
//! front rather than config-file driven (§1 non-goals: registries are an
//! external concern).

use keel_analytics::FeeSlippageConfig;
use keel_markets::{ExchangeName, FrameName, Mode, StrategyName, Symbol};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine-wide defaults, threaded into every [`InstanceConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Base directory for the [`keel_data::store::FileSystemStore`].
    pub persistence_root: PathBuf,

    /// Default fee/slippage applied by [`crate::engine::signal::Signal::close`]
    /// and [`crate::engine::signal::Signal::breakeven`] unless a strategy
    /// overrides it. Defaults to 0.1%/0.1% (§4.6).
    #[serde(default)]
    pub fee_slippage: FeeSlippageConfig,

    /// Reserved for downstream analytics consumers (tear sheets, Sharpe
    /// ratio) that thread a risk-free rate through their own computations;
    /// the engine itself never reads this back.
    #[serde(default)]
    pub risk_free_return: f64,

    /// Fallback `intervalMinutes` (§4.6 step 2) used when a strategy
    /// schema's own `interval()` is not itself sufficient to throttle
    /// (kept for forward compatibility with schemas that want a coarser
    /// throttle than their candle interval).
    #[serde(default = "default_interval_minutes")]
    pub default_interval_minutes: i64,
}

fn default_interval_minutes() -> i64 {
    1
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            persistence_root: PathBuf::from("./dump"),
            fee_slippage: FeeSlippageConfig::default(),
            risk_free_return: 0.0,
            default_interval_minutes: default_interval_minutes(),
        }
    }
}

/// One registry key's worth of configuration: [`SystemConfig`] narrowed to
/// a single `(symbol, strategyName, exchangeName, frameName, mode)` tuple
/// (§3, §4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceConfig {
    pub symbol: Symbol,
    pub strategy_name: StrategyName,
    pub exchange_name: ExchangeName,
    pub frame_name: FrameName,
    pub mode: Mode,
    pub system: SystemConfig,
}

impl InstanceConfig {
    pub fn new(symbol: Symbol, strategy_name: StrategyName, exchange_name: ExchangeName, frame_name: FrameName, mode: Mode, system: SystemConfig) -> Self {
        Self {
            symbol,
            strategy_name,
            exchange_name,
            frame_name,
            mode,
            system,
        }
    }
}
