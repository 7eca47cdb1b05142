//! Transaction identifier
//!
//! Ids are positive integers minted by the coordinator's monotonic counter
//! and adopted verbatim by every participant, so the same logical
//! transaction carries the same id on every node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinator-minted transaction identifier.
///
/// The integer form (rather than a random UUID) is load-bearing: ids are
/// comparable across nodes, and a promoted coordinator can seed its counter
/// from the highest id it has seen to keep minting monotonic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TxnId(u64);

impl TxnId {
    /// Wrap a raw id value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse from the decimal string representation used in envelope headers.
    pub fn parse(s: &str) -> Result<Self, String> {
        s.parse::<u64>()
            .map(Self)
            .map_err(|e| format!("Invalid transaction ID '{s}': {e}"))
    }
}

impl From<u64> for TxnId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
