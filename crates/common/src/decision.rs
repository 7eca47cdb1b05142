//! Commit/abort decisions recorded in the stable log

use serde::{Deserialize, Serialize};
use std::fmt;

/// The coordinator's final decision for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Commit,
    Abort,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Commit => write!(f, "commit"),
            Decision::Abort => write!(f, "abort"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_representation() {
        assert_eq!(serde_json::to_string(&Decision::Commit).unwrap(), "\"commit\"");
        assert_eq!(
            serde_json::from_str::<Decision>("\"abort\"").unwrap(),
            Decision::Abort
        );
    }
}
