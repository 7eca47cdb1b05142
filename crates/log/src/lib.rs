//! Stable decision log
//!
//! The coordinator appends its commit decision here before telling any
//! participant to commit; a decision that reached the log survives a
//! coordinator crash. Appends are single durable operations; acquisition
//! and release of the underlying storage happen inside the call.

use lockstep_common::{Decision, Timestamp, TxnId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileDecisionLog;
pub use memory::MemoryDecisionLog;

/// Decision log errors
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LogError>;

/// One durable decision record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Transaction the decision is for
    pub txn_id: TxnId,
    /// The decision itself
    pub decision: Decision,
    /// Wall-clock time the record was appended
    pub recorded_at: Timestamp,
}

/// Trait for decision log backends
pub trait DecisionLog: Send + Sync {
    /// Durably append a decision. Returns only after the record is safe
    /// against a crash of this process.
    fn append_decision(&self, txn_id: TxnId, decision: Decision) -> Result<()>;

    /// Read back every recorded decision, oldest first.
    fn decisions(&self) -> Result<Vec<DecisionRecord>>;
}
