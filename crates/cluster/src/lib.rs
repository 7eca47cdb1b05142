//! In-process cluster fabric for lockstep nodes
//!
//! This crate provides the registry that links transaction managers
//! together: nodes join under a name and receive an inbox; peers address
//! each other by name through `request` (round trip with timeout) and
//! `notify` (fire-and-forget). It stands in for a real RPC transport in
//! tests and single-process deployments.

use thiserror::Error;

pub mod envelope;
pub mod registry;

pub use envelope::Envelope;
pub use registry::{Cluster, Delivery, Inbox};

/// Cluster fabric errors
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("Request timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_reply() {
        let cluster = Cluster::new();
        let mut inbox = cluster.join("echo-node");

        // Set up a responder
        tokio::spawn(async move {
            while let Some(delivery) = inbox.recv().await {
                let reply = Envelope::with_body(delivery.envelope.body.clone());
                if let Some(reply_tx) = delivery.reply {
                    let _ = reply_tx.send(reply);
                }
            }
        });

        let request = Envelope::with_body(b"ping".to_vec());
        let reply = cluster
            .request("echo-node", request, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(reply.body, b"ping");
    }

    #[tokio::test]
    async fn test_request_times_out_without_reply() {
        let cluster = Cluster::new();
        // Joined but never serviced: the delivery sits in the inbox forever.
        let _inbox = cluster.join("silent-node");

        let request = Envelope::with_body(b"ping".to_vec());
        let err = cluster
            .request("silent-node", request, Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterError::Timeout));
    }

    #[tokio::test]
    async fn test_request_to_unknown_node() {
        let cluster = Cluster::new();

        let err = cluster
            .request(
                "nobody",
                Envelope::with_body(Vec::new()),
                Duration::from_millis(20),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterError::UnknownNode(_)));
    }

    #[tokio::test]
    async fn test_request_to_departed_node() {
        let cluster = Cluster::new();
        let inbox = cluster.join("ghost");
        drop(inbox);

        let err = cluster
            .request(
                "ghost",
                Envelope::with_body(Vec::new()),
                Duration::from_millis(20),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterError::NodeUnavailable(_)));
    }

    #[tokio::test]
    async fn test_notify_is_fire_and_forget() {
        let cluster = Cluster::new();
        let mut inbox = cluster.join("target");

        cluster
            .notify("target", Envelope::with_body(b"one-way".to_vec()))
            .unwrap();

        let delivery = inbox.recv().await.unwrap();
        assert_eq!(delivery.envelope.body, b"one-way");
        assert!(delivery.reply.is_none());
    }

    #[tokio::test]
    async fn test_try_recv_drains_without_blocking() {
        let cluster = Cluster::new();
        let mut inbox = cluster.join("poller");

        // Empty inbox, nothing to wait for.
        assert!(inbox.try_recv().is_none());

        cluster
            .notify("poller", Envelope::with_body(b"first".to_vec()))
            .unwrap();
        cluster
            .notify("poller", Envelope::with_body(b"second".to_vec()))
            .unwrap();

        assert_eq!(inbox.try_recv().unwrap().envelope.body, b"first");
        assert_eq!(inbox.try_recv().unwrap().envelope.body, b"second");
        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_membership() {
        let cluster = Cluster::new();
        let _a = cluster.join("a");
        let _b = cluster.join("b");

        assert!(cluster.contains("a"));
        assert!(!cluster.contains("c"));
        assert_eq!(cluster.members(), vec!["a".to_string(), "b".to_string()]);

        cluster.leave("a");
        assert!(!cluster.contains("a"));
        assert_eq!(cluster.members(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_headers_travel_with_envelope() {
        let cluster = Cluster::new();
        let mut inbox = cluster.join("node");

        let envelope = Envelope::with_body(Vec::new())
            .with_header("txn_id".to_string(), "7".to_string())
            .with_header("kind".to_string(), "prepare".to_string());
        cluster.notify("node", envelope).unwrap();

        let delivery = inbox.recv().await.unwrap();
        assert_eq!(delivery.envelope.get_header("txn_id"), Some("7"));
        assert_eq!(delivery.envelope.get_header("kind"), Some("prepare"));
    }
}
