//! Pluggable participant vote policies
//!
//! A participant's answer to a prepare request comes from its `VotePolicy`.
//! The default policy refuses a configurable fraction of rounds at random,
//! which keeps abort paths exercised in demos without any injected faults.
//! Tests install `ScriptedVotes` to force a particular sequence.

use lockstep_common::{TxnId, Vote};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;

/// Decides how a participant votes on a prepare request.
pub trait VotePolicy: Send + Sync {
    fn decide(&self, txn_id: TxnId) -> Vote;
}

/// Votes ready with probability `ready_probability`, refuses otherwise.
pub struct WeightedRandomVotes {
    ready_probability: f64,
}

impl WeightedRandomVotes {
    /// Probability outside `[0, 1]` is clamped into range.
    pub fn new(ready_probability: f64) -> Self {
        Self {
            ready_probability: ready_probability.clamp(0.0, 1.0),
        }
    }
}

impl Default for WeightedRandomVotes {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl VotePolicy for WeightedRandomVotes {
    fn decide(&self, txn_id: TxnId) -> Vote {
        let vote = if rand::thread_rng().gen_bool(self.ready_probability) {
            Vote::Ready
        } else {
            Vote::AbortAsMajority
        };
        tracing::debug!("vote policy decided {} for transaction {}", vote, txn_id);
        vote
    }
}

/// Always votes ready.
pub struct AlwaysReady;

impl VotePolicy for AlwaysReady {
    fn decide(&self, _txn_id: TxnId) -> Vote {
        Vote::Ready
    }
}

/// Replays a fixed sequence of votes, then votes ready once exhausted.
pub struct ScriptedVotes {
    votes: Mutex<VecDeque<Vote>>,
}

impl ScriptedVotes {
    pub fn new(votes: impl IntoIterator<Item = Vote>) -> Self {
        Self {
            votes: Mutex::new(votes.into_iter().collect()),
        }
    }
}

impl VotePolicy for ScriptedVotes {
    fn decide(&self, _txn_id: TxnId) -> Vote {
        self.votes.lock().pop_front().unwrap_or(Vote::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_ready() {
        let policy = AlwaysReady;
        for i in 0..10 {
            assert_eq!(policy.decide(TxnId::new(i)), Vote::Ready);
        }
    }

    #[test]
    fn test_weighted_extremes() {
        let certain = WeightedRandomVotes::new(1.0);
        let never = WeightedRandomVotes::new(0.0);
        for i in 0..50 {
            assert_eq!(certain.decide(TxnId::new(i)), Vote::Ready);
            assert_eq!(never.decide(TxnId::new(i)), Vote::AbortAsMajority);
        }
    }

    #[test]
    fn test_weighted_clamps_probability() {
        let policy = WeightedRandomVotes::new(7.5);
        assert_eq!(policy.decide(TxnId::new(1)), Vote::Ready);
    }

    #[test]
    fn test_scripted_sequence_then_ready() {
        let policy = ScriptedVotes::new([Vote::Ready, Vote::AbortAsMajority]);
        assert_eq!(policy.decide(TxnId::new(1)), Vote::Ready);
        assert_eq!(policy.decide(TxnId::new(2)), Vote::AbortAsMajority);
        assert_eq!(policy.decide(TxnId::new(3)), Vote::Ready);
        assert_eq!(policy.decide(TxnId::new(4)), Vote::Ready);
    }
}
