//! Error types for the transaction manager

use crate::transaction::TxnState;
use lockstep_common::{NodeName, TxnId};
use thiserror::Error;

/// Transaction manager error types
///
/// Protocol-level failures (a refused vote, a peer timeout) never surface
/// here; they resolve into an aborted outcome. Errors are reserved for
/// misuse and for the two fatal classes: broken commit preconditions and
/// decision-log write failures.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Transaction not found: {0}")]
    TxnNotFound(TxnId),

    #[error("Transaction {0} already exists")]
    TxnExists(TxnId),

    #[error("Node {0} is not the coordinator")]
    NotCoordinator(NodeName),

    #[error("Node {0} is not a participant")]
    NotParticipant(NodeName),

    #[error("Transaction {txn_id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        txn_id: TxnId,
        from: TxnState,
        to: TxnState,
    },

    #[error("Transaction {txn_id} cannot commit from state {state}")]
    CommitPrecondition { txn_id: TxnId, state: TxnState },

    #[error("Decision log error: {0}")]
    Log(#[from] lockstep_log::LogError),
}

/// Result type for manager operations
pub type Result<T> = std::result::Result<T, ManagerError>;
