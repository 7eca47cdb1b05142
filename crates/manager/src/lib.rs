//! Two-phase commit for lockstep nodes
//!
//! This crate holds the protocol core: the per-transaction state machine,
//! the per-node [`TxnManager`] with its coordinator and participant role
//! paths, and the pluggable vote policy participants answer prepares with.
//!
//! A round runs like this:
//!
//! - the coordinator moves its transaction to `Undecided` and requests a
//!   vote from every sibling concurrently, waiting for all of them;
//! - one refused or timed-out vote aborts the round for everyone
//!   (abort-as-majority), otherwise the coordinator becomes `Ready`;
//! - the commit decision is durably appended to the decision log, then the
//!   participants are committed one at a time;
//! - a participant that fails to commit aborts the round for everyone:
//!   a deliberate deviation from textbook 2PC, kept because peers that
//!   already committed cannot actually un-commit and the gap should be
//!   visible rather than papered over.
//!
//! Managers talk through the `lockstep-cluster` registry and never hold
//! references to each other; the coordinator role is a value that can be
//! re-constructed on another node (`become_coordinator`) after a failure.

pub mod config;
pub mod error;
pub mod manager;
pub mod transaction;
pub mod vote;

pub use config::ManagerConfig;
pub use error::{ManagerError, Result};
pub use manager::{Role, TxnManager};
pub use transaction::{AbortReason, Transaction, TxnOutcome, TxnState};
pub use vote::{AlwaysReady, ScriptedVotes, VotePolicy, WeightedRandomVotes};
