//! Prepare-phase votes

use serde::{Deserialize, Serialize};
use std::fmt;

/// A participant's answer to a prepare request.
///
/// A single `AbortAsMajority` vote outweighs any number of `Ready` votes:
/// the coordinator aborts the transaction unless the vote is unanimous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    /// The participant can commit and is holding its resources.
    Ready,
    /// The participant cannot commit (constraint violation, lock conflict,
    /// local fault); treated as a majority for abort.
    AbortAsMajority,
}

impl Vote {
    /// True if this vote lets the transaction proceed to phase 2.
    pub fn is_ready(&self) -> bool {
        matches!(self, Vote::Ready)
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Ready => write!(f, "ready"),
            Vote::AbortAsMajority => write!(f, "abort-as-majority"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ready() {
        assert!(Vote::Ready.is_ready());
        assert!(!Vote::AbortAsMajority.is_ready());
    }
}
