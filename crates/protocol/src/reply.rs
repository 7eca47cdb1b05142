//! Typed peer replies for participant-to-coordinator communication

use crate::{ParseError, PROTOCOL_VERSION, check_version};
use lockstep_cluster::Envelope;
use lockstep_common::{TxnId, Vote};
use std::collections::HashMap;

/// Status carried in a peer reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Answer to a prepare request; `reason` is set on refusals when the
    /// participant can say why (for example an unknown transaction id).
    Vote { vote: Vote, reason: Option<String> },
    /// Commit applied locally
    CommitAck,
    /// Commit could not be applied
    CommitFailed { reason: String },
    /// Abort applied locally
    AbortAck,
}

/// A participant's reply to a peer request.
#[derive(Debug, Clone)]
pub struct PeerReply {
    /// Transaction ID the reply is about
    pub txn_id: TxnId,
    /// Reply status
    pub status: ReplyStatus,
}

impl PeerReply {
    pub fn vote(txn_id: TxnId, vote: Vote) -> Self {
        Self {
            txn_id,
            status: ReplyStatus::Vote { vote, reason: None },
        }
    }

    pub fn refusal(txn_id: TxnId, reason: impl Into<String>) -> Self {
        Self {
            txn_id,
            status: ReplyStatus::Vote {
                vote: Vote::AbortAsMajority,
                reason: Some(reason.into()),
            },
        }
    }

    pub fn commit_ack(txn_id: TxnId) -> Self {
        Self {
            txn_id,
            status: ReplyStatus::CommitAck,
        }
    }

    pub fn commit_failed(txn_id: TxnId, reason: impl Into<String>) -> Self {
        Self {
            txn_id,
            status: ReplyStatus::CommitFailed {
                reason: reason.into(),
            },
        }
    }

    pub fn abort_ack(txn_id: TxnId) -> Self {
        Self {
            txn_id,
            status: ReplyStatus::AbortAck,
        }
    }

    /// Convert to a raw envelope for sending
    pub fn into_envelope(self) -> Envelope {
        let mut headers = HashMap::new();
        headers.insert("proto".to_string(), PROTOCOL_VERSION.to_string());
        headers.insert("txn_id".to_string(), self.txn_id.to_string());

        match self.status {
            ReplyStatus::Vote { vote, reason } => {
                let status = match vote {
                    Vote::Ready => "ready",
                    Vote::AbortAsMajority => "abort_as_majority",
                };
                headers.insert("status".to_string(), status.to_string());
                if let Some(reason) = reason {
                    headers.insert("reason".to_string(), reason);
                }
            }
            ReplyStatus::CommitAck => {
                headers.insert("status".to_string(), "commit_ack".to_string());
            }
            ReplyStatus::CommitFailed { reason } => {
                headers.insert("status".to_string(), "commit_failed".to_string());
                headers.insert("reason".to_string(), reason);
            }
            ReplyStatus::AbortAck => {
                headers.insert("status".to_string(), "abort_ack".to_string());
            }
        }

        Envelope::new(Vec::new(), headers)
    }

    /// Parse a raw envelope into a typed reply
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ParseError> {
        check_version(&envelope)?;

        let txn_id_str = envelope
            .get_header("txn_id")
            .ok_or(ParseError::MissingHeader("txn_id"))?;
        let txn_id = TxnId::parse(txn_id_str)
            .map_err(|_| ParseError::InvalidTxnId(txn_id_str.to_string()))?;

        let reason = envelope.get_header("reason").map(String::from);

        let status = match envelope.get_header("status") {
            Some("ready") => ReplyStatus::Vote {
                vote: Vote::Ready,
                reason: None,
            },
            Some("abort_as_majority") => ReplyStatus::Vote {
                vote: Vote::AbortAsMajority,
                reason,
            },
            Some("commit_ack") => ReplyStatus::CommitAck,
            Some("commit_failed") => ReplyStatus::CommitFailed {
                reason: reason.unwrap_or_else(|| "unknown".to_string()),
            },
            Some("abort_ack") => ReplyStatus::AbortAck,
            Some(other) => return Err(ParseError::InvalidStatus(other.to_string())),
            None => return Err(ParseError::MissingHeader("status")),
        };

        Ok(Self { txn_id, status })
    }

    /// The vote carried by this reply, if it is a vote at all.
    pub fn as_vote(&self) -> Option<Vote> {
        match &self.status {
            ReplyStatus::Vote { vote, .. } => Some(*vote),
            _ => None,
        }
    }
}
