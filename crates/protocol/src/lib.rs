//! Wire protocol for the commit handshake
//!
//! This crate defines typed wrappers around the generic `Envelope` from
//! lockstep-cluster: the coordinator's peer requests (prepare / commit /
//! abort) and the participant's replies (vote / ack / failure). Everything
//! is header-encoded and versioned so the fabric can be swapped for a real
//! transport without touching the managers.

use thiserror::Error;

pub mod reply;
pub mod request;

pub use reply::{PeerReply, ReplyStatus};
pub use request::{PeerRequest, Phase};

/// Protocol schema version carried in the `proto` header of every
/// envelope. Parsers reject anything else.
pub const PROTOCOL_VERSION: &str = "1";

/// Errors that can occur when parsing envelopes
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid transaction ID: {0}")]
    InvalidTxnId(String),

    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),
}

pub(crate) fn check_version(envelope: &lockstep_cluster::Envelope) -> Result<(), ParseError> {
    match envelope.get_header("proto") {
        Some(PROTOCOL_VERSION) => Ok(()),
        Some(other) => Err(ParseError::UnsupportedVersion(other.to_string())),
        None => Err(ParseError::MissingHeader("proto")),
    }
}
