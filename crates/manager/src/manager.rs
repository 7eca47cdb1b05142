//! The per-node transaction manager and the commit protocol driver
//!
//! One `TxnManager` runs on every node. Its role decides which half of the
//! protocol it speaks: a coordinator mints transaction ids and drives the
//! prepare/commit rounds; a participant votes on prepares and applies the
//! coordinator's decision. Peers are addressed by name through the shared
//! [`Cluster`] registry; managers never hold references to each other.
//!
//! The decision rule is abort-as-majority: a single refused vote (or a
//! timeout, which counts the same) aborts the round for everyone, even
//! peers that already voted ready. The commit decision is durable in the
//! [`DecisionLog`] before the first commit instruction leaves this node.

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::transaction::{AbortReason, Transaction, TxnOutcome, TxnState};
use crate::vote::{VotePolicy, WeightedRandomVotes};
use futures::future::join_all;
use lockstep_cluster::{Cluster, Delivery, Envelope, Inbox};
use lockstep_common::{Decision, NodeName, TxnId, Vote};
use lockstep_log::DecisionLog;
use lockstep_protocol::{PeerReply, PeerRequest, Phase, ReplyStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Which half of the commit protocol this node speaks.
///
/// Promotion (`become_coordinator`) replaces the whole variant; there is no
/// self-referential coordinator pointer, only the name a participant was
/// last told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Drives commit rounds and mints transaction ids.
    Coordinator { next_txn: u64 },
    /// Votes on prepares and applies decisions from `coordinator`.
    Participant { coordinator: Option<NodeName> },
}

/// A node's transaction manager.
///
/// Wrap it in an [`Arc`] and call [`start`](TxnManager::start) to serve
/// peer requests; drive rounds through [`run_commit`](TxnManager::run_commit)
/// or the individual phase methods on the coordinator.
pub struct TxnManager {
    name: NodeName,
    role: Mutex<Role>,
    transactions: Mutex<HashMap<TxnId, Transaction>>,
    siblings: Mutex<Vec<NodeName>>,
    cluster: Cluster,
    log: Arc<dyn DecisionLog>,
    votes: Arc<dyn VotePolicy>,
    config: ManagerConfig,
}

impl TxnManager {
    /// Create a coordinator-role manager.
    pub fn coordinator(
        name: impl Into<NodeName>,
        cluster: Cluster,
        log: Arc<dyn DecisionLog>,
    ) -> Self {
        Self::with_role(name, Role::Coordinator { next_txn: 1 }, cluster, log)
    }

    /// Create a participant-role manager.
    pub fn participant(
        name: impl Into<NodeName>,
        cluster: Cluster,
        log: Arc<dyn DecisionLog>,
    ) -> Self {
        Self::with_role(name, Role::Participant { coordinator: None }, cluster, log)
    }

    fn with_role(
        name: impl Into<NodeName>,
        role: Role,
        cluster: Cluster,
        log: Arc<dyn DecisionLog>,
    ) -> Self {
        Self {
            name: name.into(),
            role: Mutex::new(role),
            transactions: Mutex::new(HashMap::new()),
            siblings: Mutex::new(Vec::new()),
            cluster,
            log,
            votes: Arc::new(WeightedRandomVotes::default()),
            config: ManagerConfig::default(),
        }
    }

    /// Replace the vote policy (defaults to the 80/20 weighted random one).
    pub fn with_vote_policy(mut self, votes: Arc<dyn VotePolicy>) -> Self {
        self.votes = votes;
        self
    }

    /// Replace the timeout configuration.
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Join the cluster under this manager's name and serve peer requests
    /// until the registration is replaced or the cluster goes away.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let inbox = self.cluster.join(self.name.clone());
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.serve(inbox).await })
    }

    async fn serve(&self, mut inbox: Inbox) {
        tracing::debug!("{} serving peer requests", self.name);
        while let Some(delivery) = inbox.recv().await {
            self.handle_delivery(delivery);
        }
        tracing::debug!("{} stopped serving peer requests", self.name);
    }

    fn handle_delivery(&self, delivery: Delivery) {
        let request = match PeerRequest::from_envelope(delivery.envelope) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("{} dropped an undecodable peer request: {}", self.name, err);
                return;
            }
        };

        let reply = self.handle_request(&request);
        if let Some(reply_tx) = delivery.reply
            && reply_tx.send(reply.into_envelope()).is_err()
        {
            tracing::debug!(
                "{} reply for transaction {} had no listener",
                self.name,
                request.txn_id
            );
        }
    }

    fn handle_request(&self, request: &PeerRequest) -> PeerReply {
        match request.phase {
            Phase::Prepare => {
                let (vote, reason) = self.prepare_vote(request.txn_id);
                match reason {
                    Some(reason) => PeerReply::refusal(request.txn_id, reason),
                    None => PeerReply::vote(request.txn_id, vote),
                }
            }
            Phase::Commit => match self.apply_commit(request.txn_id) {
                Ok(()) => PeerReply::commit_ack(request.txn_id),
                Err(err) => PeerReply::commit_failed(request.txn_id, err.to_string()),
            },
            Phase::Abort => {
                self.apply_abort(request.txn_id);
                PeerReply::abort_ack(request.txn_id)
            }
        }
    }

    /// Create a local transaction record.
    ///
    /// A coordinator called with `None` mints the next id; any manager
    /// called with `Some(id)` adopts the given id (participants only ever
    /// adopt; ids propagate from the coordinator). A coordinator adopting
    /// an explicit id keeps its minting counter above it.
    pub fn init_transaction(&self, id: Option<TxnId>) -> Result<TxnId> {
        let txn_id = match id {
            Some(id) => {
                if self.transactions.lock().contains_key(&id) {
                    return Err(ManagerError::TxnExists(id));
                }
                if let Role::Coordinator { next_txn } = &mut *self.role.lock() {
                    *next_txn = (*next_txn).max(id.as_u64() + 1);
                }
                id
            }
            None => {
                let mut role = self.role.lock();
                let Role::Coordinator { next_txn } = &mut *role else {
                    return Err(ManagerError::NotCoordinator(self.name.clone()));
                };
                let id = TxnId::new(*next_txn);
                *next_txn += 1;
                id
            }
        };

        self.transactions
            .lock()
            .insert(txn_id, Transaction::new(txn_id));
        tracing::debug!("{} initialized transaction {}", self.name, txn_id);
        Ok(txn_id)
    }

    /// Drive one full commit round: prepare, then commit if every vote was
    /// ready. Coordinator only.
    pub async fn run_commit(&self, txn_id: TxnId) -> Result<TxnOutcome> {
        let rejections = self.prepare_phase(txn_id).await?;
        if rejections.is_empty() {
            self.complete_commit(txn_id).await
        } else {
            Ok(TxnOutcome::Aborted {
                reason: AbortReason::PrepareRejected {
                    participants: rejections,
                },
            })
        }
    }

    /// Phase 1. Collects a vote from every sibling and applies the
    /// abort-as-majority rule. Coordinator only.
    ///
    /// Returns `Ok(true)` when every participant voted ready (the local
    /// transaction is then `Ready` and phase 2 may run) and `Ok(false)`
    /// when the round was aborted.
    pub async fn trigger_prepare(&self, txn_id: TxnId) -> Result<bool> {
        Ok(self.prepare_phase(txn_id).await?.is_empty())
    }

    /// Fan out prepare and return the names of the peers that refused,
    /// timed out, or answered unusably. Empty means unanimous ready.
    async fn prepare_phase(&self, txn_id: TxnId) -> Result<Vec<NodeName>> {
        self.require_coordinator()?;
        self.transition_local(txn_id, TxnState::Undecided)?;

        let siblings = self.siblings.lock().clone();
        tracing::info!(
            "{} preparing transaction {} across {} participants",
            self.name,
            txn_id,
            siblings.len()
        );

        let rejections = self.collect_votes(txn_id, &siblings).await;
        if rejections.is_empty() {
            self.transition_local(txn_id, TxnState::Ready)?;
            tracing::info!(
                "{} collected unanimous ready votes for transaction {}",
                self.name,
                txn_id
            );
        } else {
            tracing::warn!(
                "{} aborting transaction {} after rejection by {}",
                self.name,
                txn_id,
                rejections.join(", ")
            );
            self.abort_everywhere(txn_id);
        }
        Ok(rejections)
    }

    /// Request a vote from every sibling concurrently and wait for all of
    /// them. There is no early abort: the decision rule runs only once
    /// every peer has answered or timed out, so the abort broadcast is
    /// based on the full vote set.
    async fn collect_votes(&self, txn_id: TxnId, siblings: &[NodeName]) -> Vec<NodeName> {
        let requests = siblings.iter().map(|name| async move {
            let envelope = PeerRequest::prepare(txn_id).into_envelope();
            let vote = match self
                .cluster
                .request(name, envelope, self.config.prepare_timeout)
                .await
            {
                Ok(reply) => self.vote_from_reply(name, txn_id, reply),
                Err(err) => {
                    tracing::warn!(
                        "{} got no vote from {} for transaction {}: {}",
                        self.name,
                        name,
                        txn_id,
                        err
                    );
                    Vote::AbortAsMajority
                }
            };
            (name, vote)
        });

        join_all(requests)
            .await
            .into_iter()
            .filter(|(_, vote)| !vote.is_ready())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn vote_from_reply(&self, name: &str, txn_id: TxnId, envelope: Envelope) -> Vote {
        match PeerReply::from_envelope(envelope) {
            Ok(reply) => match reply.status {
                ReplyStatus::Vote {
                    vote: Vote::Ready, ..
                } => {
                    tracing::debug!(
                        "{} received ready vote from {} for transaction {}",
                        self.name,
                        name,
                        txn_id
                    );
                    Vote::Ready
                }
                ReplyStatus::Vote {
                    vote: Vote::AbortAsMajority,
                    reason,
                } => {
                    tracing::warn!(
                        "{} received abort-as-majority from {} for transaction {}{}",
                        self.name,
                        name,
                        txn_id,
                        reason.map(|r| format!(": {r}")).unwrap_or_default()
                    );
                    Vote::AbortAsMajority
                }
                other => {
                    tracing::warn!(
                        "{} expected a vote from {} for transaction {}, got {:?}",
                        self.name,
                        name,
                        txn_id,
                        other
                    );
                    Vote::AbortAsMajority
                }
            },
            Err(err) => {
                tracing::warn!(
                    "{} could not decode the vote from {} for transaction {}: {}",
                    self.name,
                    name,
                    txn_id,
                    err
                );
                Vote::AbortAsMajority
            }
        }
    }

    /// Phase 2. Durably records the commit decision, then instructs every
    /// sibling to commit, one at a time. Coordinator only, and the local
    /// transaction must be `Ready`.
    ///
    /// A failed decision append is fatal: nothing is broadcast and the
    /// transaction stays `Ready` for recovery. A participant that fails to
    /// commit aborts the round for everyone, including peers that already
    /// committed, which cannot actually un-commit; the round is reported
    /// as aborted regardless.
    pub async fn complete_commit(&self, txn_id: TxnId) -> Result<TxnOutcome> {
        self.require_coordinator()?;
        {
            let transactions = self.transactions.lock();
            let txn = transactions
                .get(&txn_id)
                .ok_or(ManagerError::TxnNotFound(txn_id))?;
            if txn.state() != TxnState::Ready {
                tracing::error!(
                    "{} cannot commit transaction {} from state {}",
                    self.name,
                    txn_id,
                    txn.state()
                );
                return Err(ManagerError::CommitPrecondition {
                    txn_id,
                    state: txn.state(),
                });
            }
        }

        // Durability point: the decision must survive a crash of this node
        // before any peer is told to commit.
        if let Err(err) = self.log.append_decision(txn_id, Decision::Commit) {
            tracing::error!(
                "{} could not record the commit decision for transaction {}: {}",
                self.name,
                txn_id,
                err
            );
            return Err(err.into());
        }
        tracing::info!(
            "{} recorded commit decision for transaction {}",
            self.name,
            txn_id
        );

        let siblings = self.siblings.lock().clone();
        for name in &siblings {
            if !self.commit_on(name, txn_id).await {
                tracing::warn!(
                    "{} aborting transaction {} after commit failure on {}",
                    self.name,
                    txn_id,
                    name
                );
                self.abort_everywhere(txn_id);
                return Ok(TxnOutcome::Aborted {
                    reason: AbortReason::CommitFailed {
                        participant: name.clone(),
                    },
                });
            }
        }

        self.transition_local(txn_id, TxnState::Committed)?;
        tracing::info!("{} committed transaction {}", self.name, txn_id);
        Ok(TxnOutcome::Committed)
    }

    async fn commit_on(&self, name: &NodeName, txn_id: TxnId) -> bool {
        let envelope = PeerRequest::commit(txn_id).into_envelope();
        let reply = match self
            .cluster
            .request(name, envelope, self.config.commit_timeout)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(
                    "{} got no commit ack from {} for transaction {}: {}",
                    self.name,
                    name,
                    txn_id,
                    err
                );
                return false;
            }
        };

        match PeerReply::from_envelope(reply) {
            Ok(PeerReply {
                status: ReplyStatus::CommitAck,
                ..
            }) => {
                tracing::debug!(
                    "{} received commit ack from {} for transaction {}",
                    self.name,
                    name,
                    txn_id
                );
                true
            }
            Ok(PeerReply {
                status: ReplyStatus::CommitFailed { reason },
                ..
            }) => {
                tracing::warn!(
                    "{} failed to commit transaction {} on {}: {}",
                    self.name,
                    txn_id,
                    name,
                    reason
                );
                false
            }
            Ok(reply) => {
                tracing::warn!(
                    "{} expected a commit ack from {}, got {:?}",
                    self.name,
                    name,
                    reply.status
                );
                false
            }
            Err(err) => {
                tracing::warn!(
                    "{} could not decode the commit reply from {}: {}",
                    self.name,
                    name,
                    err
                );
                false
            }
        }
    }

    /// Abort a transaction locally and on every sibling, reporting the
    /// round as explicitly aborted. Coordinator only; the phase-1 and
    /// phase-2 failure paths reuse the same broadcast.
    pub fn abort_transaction(&self, txn_id: TxnId) -> Result<TxnOutcome> {
        self.require_coordinator()?;
        if !self.transactions.lock().contains_key(&txn_id) {
            return Err(ManagerError::TxnNotFound(txn_id));
        }
        tracing::info!("{} aborting transaction {}", self.name, txn_id);
        self.abort_everywhere(txn_id);
        Ok(TxnOutcome::Aborted {
            reason: AbortReason::Explicit,
        })
    }

    fn abort_everywhere(&self, txn_id: TxnId) {
        if let Some(txn) = self.transactions.lock().get_mut(&txn_id) {
            txn.abort();
        }
        self.broadcast_abort(txn_id);
    }

    /// Abort instructions are one-way; a peer that cannot be reached is
    /// logged and skipped.
    fn broadcast_abort(&self, txn_id: TxnId) {
        let siblings = self.siblings.lock().clone();
        for name in &siblings {
            let envelope = PeerRequest::abort(txn_id).into_envelope();
            if let Err(err) = self.cluster.notify(name, envelope) {
                tracing::warn!(
                    "{} could not deliver abort for transaction {} to {}: {}",
                    self.name,
                    txn_id,
                    name,
                    err
                );
            }
        }
    }

    /// Participant's answer to a prepare request.
    ///
    /// Local readiness comes from the vote policy; the resulting state
    /// (`Ready` or `Aborted`) is recorded before the vote is returned.
    /// Unknown transactions and repeated prepares are refused.
    pub fn vote_on_prepare(&self, txn_id: TxnId) -> Vote {
        self.prepare_vote(txn_id).0
    }

    /// Vote plus the refusal reason that travels in the wire reply.
    fn prepare_vote(&self, txn_id: TxnId) -> (Vote, Option<String>) {
        let mut transactions = self.transactions.lock();
        let Some(txn) = transactions.get_mut(&txn_id) else {
            tracing::warn!(
                "{} refusing prepare for unknown transaction {}",
                self.name,
                txn_id
            );
            return (
                Vote::AbortAsMajority,
                Some("unknown transaction".to_string()),
            );
        };

        if txn.state() != TxnState::Initial {
            tracing::warn!(
                "{} refusing prepare for transaction {} already in state {}",
                self.name,
                txn_id,
                txn.state()
            );
            return (
                Vote::AbortAsMajority,
                Some(format!("transaction already {}", txn.state())),
            );
        }

        match self.votes.decide(txn_id) {
            Vote::Ready => {
                if let Err(err) = txn.transition(TxnState::Ready) {
                    tracing::warn!(
                        "{} could not mark transaction {} ready: {}",
                        self.name,
                        txn_id,
                        err
                    );
                    return (Vote::AbortAsMajority, Some(err.to_string()));
                }
                tracing::debug!("{} voted ready on transaction {}", self.name, txn_id);
                (Vote::Ready, None)
            }
            Vote::AbortAsMajority => {
                txn.abort();
                tracing::warn!(
                    "{} voted abort-as-majority on transaction {}",
                    self.name,
                    txn_id
                );
                (Vote::AbortAsMajority, None)
            }
        }
    }

    /// Apply a commit decision locally.
    ///
    /// Hard precondition: the transaction must be `Ready`. Anything else is
    /// a protocol-logic fault and leaves the state untouched.
    pub fn apply_commit(&self, txn_id: TxnId) -> Result<()> {
        let mut transactions = self.transactions.lock();
        let txn = transactions
            .get_mut(&txn_id)
            .ok_or(ManagerError::TxnNotFound(txn_id))?;

        if txn.state() != TxnState::Ready {
            tracing::error!(
                "{} cannot commit transaction {} from state {}",
                self.name,
                txn_id,
                txn.state()
            );
            return Err(ManagerError::CommitPrecondition {
                txn_id,
                state: txn.state(),
            });
        }

        txn.transition(TxnState::Committed)?;
        tracing::info!("{} committed transaction {}", self.name, txn_id);
        Ok(())
    }

    /// Apply an abort decision locally, whatever the current state.
    pub fn apply_abort(&self, txn_id: TxnId) {
        match self.transactions.lock().get_mut(&txn_id) {
            Some(txn) => {
                txn.abort();
                tracing::info!("{} aborted transaction {}", self.name, txn_id);
            }
            None => {
                tracing::warn!(
                    "{} received abort for unknown transaction {}",
                    self.name,
                    txn_id
                );
            }
        }
    }

    /// Promote this manager to coordinator.
    ///
    /// The minting counter is seeded above the highest transaction id this
    /// node has seen, so a promoted coordinator never reuses an id handed
    /// out by its predecessor. In-flight rounds are not renegotiated.
    pub fn become_coordinator(&self) {
        let highest = self
            .transactions
            .lock()
            .keys()
            .map(|id| id.as_u64())
            .max()
            .unwrap_or(0);

        let mut role = self.role.lock();
        if let Role::Coordinator { .. } = &*role {
            tracing::debug!("{} is already the coordinator", self.name);
            return;
        }
        let next_txn = highest + 1;
        *role = Role::Coordinator { next_txn };
        tracing::info!(
            "{} promoted to coordinator, minting starts at {}",
            self.name,
            next_txn
        );
    }

    /// Point a participant at a (new) coordinator. Errors on a manager
    /// currently holding the coordinator role.
    pub fn set_coordinator(&self, name: impl Into<NodeName>) -> Result<()> {
        let mut role = self.role.lock();
        match &mut *role {
            Role::Participant { coordinator } => {
                let name = name.into();
                tracing::debug!("{} now recognizes {} as coordinator", self.name, name);
                *coordinator = Some(name);
                Ok(())
            }
            Role::Coordinator { .. } => Err(ManagerError::NotParticipant(self.name.clone())),
        }
    }

    /// Replace the sibling list. Order fixes the phase-2 commit order.
    pub fn set_siblings<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeName>,
    {
        *self.siblings.lock() = names.into_iter().map(Into::into).collect();
    }

    pub fn name(&self) -> &NodeName {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role.lock().clone()
    }

    pub fn is_coordinator(&self) -> bool {
        matches!(&*self.role.lock(), Role::Coordinator { .. })
    }

    /// The coordinator this node currently recognizes: itself when it holds
    /// the role, otherwise whatever `set_coordinator` last recorded.
    pub fn coordinator_name(&self) -> Option<NodeName> {
        match &*self.role.lock() {
            Role::Coordinator { .. } => Some(self.name.clone()),
            Role::Participant { coordinator } => coordinator.clone(),
        }
    }

    pub fn siblings(&self) -> Vec<NodeName> {
        self.siblings.lock().clone()
    }

    /// State of one local transaction, if it exists.
    pub fn transaction_state(&self, txn_id: TxnId) -> Option<TxnState> {
        self.transactions.lock().get(&txn_id).map(Transaction::state)
    }

    /// Snapshot of every local transaction, ordered by id.
    pub fn transactions(&self) -> Vec<(TxnId, TxnState)> {
        let mut snapshot: Vec<(TxnId, TxnState)> = self
            .transactions
            .lock()
            .values()
            .map(|txn| (txn.id(), txn.state()))
            .collect();
        snapshot.sort_by_key(|(id, _)| *id);
        snapshot
    }

    fn require_coordinator(&self) -> Result<()> {
        if self.is_coordinator() {
            Ok(())
        } else {
            Err(ManagerError::NotCoordinator(self.name.clone()))
        }
    }

    fn transition_local(&self, txn_id: TxnId, to: TxnState) -> Result<()> {
        let mut transactions = self.transactions.lock();
        let txn = transactions
            .get_mut(&txn_id)
            .ok_or(ManagerError::TxnNotFound(txn_id))?;
        txn.transition(to)
    }
}
