//! Common types shared across the lockstep crates
//!
//! This crate defines:
//! - Transaction identifiers (coordinator-minted monotonic integers)
//! - Prepare votes and commit decisions
//! - Physical timestamps (microseconds since Unix epoch)

mod decision;
mod timestamp;
mod txn_id;
mod vote;

pub use decision::Decision;
pub use timestamp::Timestamp;
pub use txn_id::TxnId;
pub use vote::Vote;

/// Name of a physical node in the cluster.
///
/// Plain strings keep the registry and the placement map agnostic of how
/// nodes are addressed; everything routes through the cluster registry.
pub type NodeName = String;
