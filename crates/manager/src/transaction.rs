//! Per-node transaction records and the commit state machine
//!
//! Coordinator and participants each keep their own `Transaction` for the
//! same id and drive it through the same state vocabulary. The only hard
//! edge in the graph is into `Committed`: a transaction must be `Ready`
//! first. Abort is reachable from anywhere, deliberately including
//! `Committed`, because the coordinator re-notifies every participant when
//! a commit round fails partway (see `AbortReason::CommitFailed`).

use crate::error::{ManagerError, Result};
use lockstep_common::{NodeName, TxnId};
use std::fmt;

/// Transaction state on a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Created, not yet drawn into a commit round
    Initial,
    /// Coordinator has started prepare and is collecting votes
    Undecided,
    /// Voted (or decided) ready to commit
    Ready,
    /// Commit applied
    Committed,
    /// Abort applied
    Aborted,
}

impl TxnState {
    /// Whether the state machine permits moving to `next` from here.
    fn can_transition_to(self, next: TxnState) -> bool {
        match next {
            TxnState::Initial => false,
            TxnState::Undecided => self == TxnState::Initial,
            TxnState::Ready => matches!(self, TxnState::Initial | TxnState::Undecided),
            TxnState::Committed => self == TxnState::Ready,
            // Unconditional: one refused vote aborts everyone, and the
            // partial-commit failure path re-aborts committed participants.
            TxnState::Aborted => true,
        }
    }

    /// Whether the transaction has reached a final decision.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxnState::Committed | TxnState::Aborted)
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxnState::Initial => "initial",
            TxnState::Undecided => "undecided",
            TxnState::Ready => "ready",
            TxnState::Committed => "committed",
            TxnState::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// One node's local record of a transaction.
///
/// Never shared across nodes; every manager owns an independent copy that
/// the protocol drives into a matching terminal state.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TxnId,
    state: TxnState,
}

impl Transaction {
    pub(crate) fn new(id: TxnId) -> Self {
        Self {
            id,
            state: TxnState::Initial,
        }
    }

    /// Transaction id.
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Checked state transition.
    pub(crate) fn transition(&mut self, to: TxnState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(ManagerError::InvalidTransition {
                txn_id: self.id,
                from: self.state,
                to,
            });
        }
        tracing::debug!("transaction {} state {} -> {}", self.id, self.state, to);
        self.state = to;
        Ok(())
    }

    /// Unconditional abort.
    pub(crate) fn abort(&mut self) {
        if self.state == TxnState::Committed {
            tracing::warn!(
                "transaction {} aborted after local commit; participants cannot un-commit",
                self.id
            );
        } else {
            tracing::debug!("transaction {} state {} -> aborted", self.id, self.state);
        }
        self.state = TxnState::Aborted;
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transaction {} in state {}", self.id, self.state)
    }
}

/// Why a transaction ended in `Aborted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// One or more participants refused (or timed out during) prepare
    PrepareRejected { participants: Vec<NodeName> },
    /// A participant failed to apply the commit decision
    CommitFailed { participant: NodeName },
    /// Abort was requested explicitly
    Explicit,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::PrepareRejected { participants } => {
                write!(f, "prepare rejected by {}", participants.join(", "))
            }
            AbortReason::CommitFailed { participant } => {
                write!(f, "commit failed on {participant}")
            }
            AbortReason::Explicit => write!(f, "explicit abort"),
        }
    }
}

/// Final outcome of a driven commit round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOutcome {
    Committed,
    Aborted { reason: AbortReason },
}

impl TxnOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TxnOutcome::Committed)
    }
}

impl fmt::Display for TxnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnOutcome::Committed => write!(f, "committed"),
            TxnOutcome::Aborted { reason } => write!(f, "aborted ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut txn = Transaction::new(TxnId::new(1));
        assert_eq!(txn.state(), TxnState::Initial);

        txn.transition(TxnState::Undecided).unwrap();
        txn.transition(TxnState::Ready).unwrap();
        txn.transition(TxnState::Committed).unwrap();
        assert!(txn.state().is_terminal());
    }

    #[test]
    fn test_participant_votes_ready_from_initial() {
        // Participants never pass through Undecided; that state belongs to
        // the coordinator's own copy.
        let mut txn = Transaction::new(TxnId::new(2));
        txn.transition(TxnState::Ready).unwrap();
        assert_eq!(txn.state(), TxnState::Ready);
    }

    #[test]
    fn test_commit_requires_ready() {
        let mut txn = Transaction::new(TxnId::new(3));
        let err = txn.transition(TxnState::Committed).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::InvalidTransition {
                from: TxnState::Initial,
                to: TxnState::Committed,
                ..
            }
        ));
        assert_eq!(txn.state(), TxnState::Initial);

        txn.transition(TxnState::Undecided).unwrap();
        let err = txn.transition(TxnState::Committed).unwrap_err();
        assert!(matches!(err, ManagerError::InvalidTransition { .. }));
    }

    #[test]
    fn test_abort_is_unconditional() {
        for setup in 0..4u8 {
            let mut txn = Transaction::new(TxnId::new(4));
            match setup {
                0 => {}
                1 => txn.transition(TxnState::Undecided).unwrap(),
                2 => {
                    txn.transition(TxnState::Undecided).unwrap();
                    txn.transition(TxnState::Ready).unwrap();
                }
                _ => {
                    txn.transition(TxnState::Undecided).unwrap();
                    txn.transition(TxnState::Ready).unwrap();
                    txn.transition(TxnState::Committed).unwrap();
                }
            }
            txn.abort();
            assert_eq!(txn.state(), TxnState::Aborted);
        }
    }

    #[test]
    fn test_no_way_back_to_initial() {
        let mut txn = Transaction::new(TxnId::new(5));
        txn.transition(TxnState::Undecided).unwrap();
        assert!(txn.transition(TxnState::Initial).is_err());
    }

    #[test]
    fn test_display() {
        let txn = Transaction::new(TxnId::new(6));
        assert_eq!(txn.to_string(), "transaction 6 in state initial");

        let reason = AbortReason::PrepareRejected {
            participants: vec!["bravo".to_string(), "charlie".to_string()],
        };
        assert_eq!(reason.to_string(), "prepare rejected by bravo, charlie");
    }
}
