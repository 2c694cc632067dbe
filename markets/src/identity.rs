use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

macro_rules! string_identity {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize,
        )]
        pub struct $name(pub SmolStr);

        impl $name {
            pub fn new(value: impl Into<SmolStr>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identity!(Symbol, "Traded instrument symbol, eg/ \"PETR4\", \"BTCUSDT\".");
string_identity!(StrategyName, "Unique registered strategy schema name.");
string_identity!(ExchangeName, "Unique registered exchange schema name.");

/// Optional tag partitioning backtest runs. Empty for live (see [`FrameName::live`]).
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Default, Serialize, Deserialize,
)]
pub struct FrameName(pub SmolStr);

impl FrameName {
    pub fn new(value: impl Into<SmolStr>) -> Self {
        Self(value.into())
    }

    /// The empty frame used by live (non-backtest) instances.
    pub fn live() -> Self {
        Self(SmolStr::default())
    }

    pub fn is_live(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for FrameName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_name_empty_string_is_live() {
        assert!(FrameName::live().is_live());
        assert!(FrameName::from("").is_live());
        assert!(!FrameName::from("session-1").is_live());
    }
}
