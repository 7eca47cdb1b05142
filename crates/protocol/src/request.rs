//! Typed peer requests for coordinator-to-participant communication

use crate::{ParseError, PROTOCOL_VERSION, check_version};
use lockstep_cluster::Envelope;
use lockstep_common::TxnId;
use std::collections::HashMap;

/// Phases of the commit handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Prepare phase (vote request)
    Prepare,
    /// Commit phase (decision)
    Commit,
    /// Abort phase (decision)
    Abort,
}

impl Phase {
    /// Parse from string header value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prepare" => Some(Self::Prepare),
            "commit" => Some(Self::Commit),
            "abort" => Some(Self::Abort),
            _ => None,
        }
    }

    /// Convert to string header value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Commit => "commit",
            Self::Abort => "abort",
        }
    }
}

/// A coordinator's request to a peer. Control messages are header-only;
/// the body stays empty.
#[derive(Debug, Clone)]
pub struct PeerRequest {
    /// Transaction ID
    pub txn_id: TxnId,
    /// Requested phase
    pub phase: Phase,
}

impl PeerRequest {
    pub fn prepare(txn_id: TxnId) -> Self {
        Self {
            txn_id,
            phase: Phase::Prepare,
        }
    }

    pub fn commit(txn_id: TxnId) -> Self {
        Self {
            txn_id,
            phase: Phase::Commit,
        }
    }

    pub fn abort(txn_id: TxnId) -> Self {
        Self {
            txn_id,
            phase: Phase::Abort,
        }
    }

    /// Convert to a raw envelope for sending
    pub fn into_envelope(self) -> Envelope {
        let mut headers = HashMap::new();
        headers.insert("proto".to_string(), PROTOCOL_VERSION.to_string());
        headers.insert("txn_id".to_string(), self.txn_id.to_string());
        headers.insert("phase".to_string(), self.phase.as_str().to_string());

        Envelope::new(Vec::new(), headers)
    }

    /// Parse a raw envelope into a typed request
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ParseError> {
        check_version(&envelope)?;

        let txn_id_str = envelope
            .get_header("txn_id")
            .ok_or(ParseError::MissingHeader("txn_id"))?;
        let txn_id = TxnId::parse(txn_id_str)
            .map_err(|_| ParseError::InvalidTxnId(txn_id_str.to_string()))?;

        let phase_str = envelope
            .get_header("phase")
            .ok_or(ParseError::MissingHeader("phase"))?;
        let phase =
            Phase::parse(phase_str).ok_or_else(|| ParseError::InvalidPhase(phase_str.to_string()))?;

        Ok(Self { txn_id, phase })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for phase in [Phase::Prepare, Phase::Commit, Phase::Abort] {
            let request = PeerRequest {
                txn_id: TxnId::new(9),
                phase,
            };
            let parsed = PeerRequest::from_envelope(request.clone().into_envelope()).unwrap();
            assert_eq!(parsed.txn_id, TxnId::new(9));
            assert_eq!(parsed.phase, phase);
        }
    }

    #[test]
    fn test_rejects_missing_version() {
        let envelope = Envelope::with_body(Vec::new())
            .with_header("txn_id".to_string(), "1".to_string())
            .with_header("phase".to_string(), "prepare".to_string());

        assert!(matches!(
            PeerRequest::from_envelope(envelope),
            Err(ParseError::MissingHeader("proto"))
        ));
    }

    #[test]
    fn test_rejects_future_version() {
        let envelope = PeerRequest::prepare(TxnId::new(1))
            .into_envelope()
            .with_header("proto".to_string(), "2".to_string());

        assert!(matches!(
            PeerRequest::from_envelope(envelope),
            Err(ParseError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_phase() {
        let envelope = PeerRequest::prepare(TxnId::new(1))
            .into_envelope()
            .with_header("phase".to_string(), "vacuum".to_string());

        assert!(matches!(
            PeerRequest::from_envelope(envelope),
            Err(ParseError::InvalidPhase(_))
        ));
    }
}
