use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Whether an instance is replaying historical candles or following the live
/// market clock. Forms part of the instance key (§4.8) and the risk ledger
/// key (§4.5).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize)]
pub enum Mode {
    #[display("live")]
    Live,
    #[display("backtest")]
    Backtest,
}

impl Mode {
    pub fn is_backtest(self) -> bool {
        matches!(self, Self::Backtest)
    }
}

impl From<bool> for Mode {
    /// `true` selects [`Mode::Backtest`], mirroring the `backtest: bool` flag
    /// carried on every [`crate::Symbol`]-scoped signal context.
    fn from(backtest: bool) -> Self {
        if backtest {
            Self::Backtest
        } else {
            Self::Live
        }
    }
}
