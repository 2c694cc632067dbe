use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Closed candle interval enum. Exchange and strategy schemas are rejected at
/// registration if they reference an interval outside this set.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize)]
pub enum Interval {
    #[display("1m")]
    M1,
    #[display("3m")]
    M3,
    #[display("5m")]
    M5,
    #[display("15m")]
    M15,
    #[display("30m")]
    M30,
    #[display("1h")]
    H1,
    #[display("4h")]
    H4,
    #[display("1d")]
    D1,
}

/// Error returned when parsing an unrecognised interval string.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("unknown interval: {0}")]
pub struct UnknownInterval(pub String);

impl FromStr for Interval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "1m" => Self::M1,
            "3m" => Self::M3,
            "5m" => Self::M5,
            "15m" => Self::M15,
            "30m" => Self::M30,
            "1h" => Self::H1,
            "4h" => Self::H4,
            "1d" => Self::D1,
            other => return Err(UnknownInterval(other.to_string())),
        })
    }
}

impl Interval {
    /// Interval duration expressed in whole minutes.
    pub fn minutes(self) -> i64 {
        match self {
            Self::M1 => 1,
            Self::M3 => 3,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1_440,
        }
    }

    /// Strategy schemas may only reference intervals up to `1h` (§6).
    pub fn is_valid_strategy_interval(self) -> bool {
        !matches!(self, Self::H4 | Self::D1)
    }
}
