//! Node registry and delivery channels
//!
//! The registry owns the name → inbox mapping; managers hold only node
//! names and route every peer call through here. Joining twice under the
//! same name replaces the earlier registration (the old inbox stops
//! receiving), which is what a restarted node wants.

use crate::{ClusterError, Envelope, Result};
use lockstep_common::NodeName;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// One message handed to a node, with an optional reply channel.
///
/// `reply` is `Some` for round-trip requests and `None` for one-way
/// notifications; a dropped reply sender is fine (the requester sees the
/// node as unavailable or times out).
#[derive(Debug)]
pub struct Delivery {
    pub envelope: Envelope,
    pub reply: Option<oneshot::Sender<Envelope>>,
}

/// Receiving side of a node's registration.
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Inbox {
    /// Receive the next delivery, or `None` once the node has left the
    /// cluster and the channel has drained.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }
}

/// Shared registry of live nodes.
///
/// Cheap to clone; all clones see the same membership.
#[derive(Clone, Default)]
pub struct Cluster {
    nodes: Arc<Mutex<HashMap<NodeName, mpsc::UnboundedSender<Delivery>>>>,
}

impl Cluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under `name` and hand back its inbox.
    pub fn join(&self, name: impl Into<NodeName>) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.nodes.lock().insert(name.into(), tx);
        Inbox { rx }
    }

    /// Remove a node from the registry.
    pub fn leave(&self, name: &str) {
        self.nodes.lock().remove(name);
    }

    /// Whether `name` is currently registered.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.lock().contains_key(name)
    }

    /// Names of all registered nodes, sorted for stable iteration.
    pub fn members(&self) -> Vec<NodeName> {
        let mut names: Vec<NodeName> = self.nodes.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Send `envelope` to `name` and await the reply.
    ///
    /// No reply within `timeout` is an error; callers in the commit
    /// protocol treat it exactly like a refusal.
    pub async fn request(
        &self,
        name: &str,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<Envelope> {
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let nodes = self.nodes.lock();
            let sender = nodes
                .get(name)
                .ok_or_else(|| ClusterError::UnknownNode(name.to_string()))?;

            let delivery = Delivery {
                envelope,
                reply: Some(reply_tx),
            };
            if sender.send(delivery).is_err() {
                return Err(ClusterError::NodeUnavailable(name.to_string()));
            }
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ClusterError::NodeUnavailable(name.to_string())),
            Err(_) => Err(ClusterError::Timeout),
        }
    }

    /// Send `envelope` to `name` without waiting for a reply.
    pub fn notify(&self, name: &str, envelope: Envelope) -> Result<()> {
        let nodes = self.nodes.lock();
        let sender = nodes
            .get(name)
            .ok_or_else(|| ClusterError::UnknownNode(name.to_string()))?;

        let delivery = Delivery {
            envelope,
            reply: None,
        };
        sender
            .send(delivery)
            .map_err(|_| ClusterError::NodeUnavailable(name.to_string()))
    }
}
