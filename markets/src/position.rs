use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Direction of a signal's position (§3).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize)]
pub enum Position {
    #[display("long")]
    Long,
    #[display("short")]
    Short,
}

impl Position {
    /// `+1.0` for [`Position::Long`], `-1.0` for [`Position::Short`]. Used
    /// throughout the trailing-stop and PnL formulas in §4.6, where the sign
    /// flips the direction in which "better" or "profit" moves.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn is_long(self) -> bool {
        matches!(self, Self::Long)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_matches_direction() {
        assert_eq!(Position::Long.sign(), 1.0);
        assert_eq!(Position::Short.sign(), -1.0);
    }
}
