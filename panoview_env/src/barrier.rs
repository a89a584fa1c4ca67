//! Node registry and barrier accounting.
//!
//! Transports embed a `BarrierRegistry` to decide when a rendezvous is
//! complete. A barrier only waits for the nodes that were registered when it
//! opened; nodes that join later are not expected, and nodes that leave are
//! dropped from every outstanding barrier so nothing waits on a ghost.

use crate::context::ClusterContext;
use crate::types::{BarrierOutcome, BarrierToken, NodeId};

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Upper bound between two completion checks while waiting.
pub const BARRIER_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct RegistryState {
    nodes: BTreeSet<NodeId>,
    next_token: u64,
    pending: HashMap<BarrierToken, BTreeSet<NodeId>>,
}

/// Registry of connected renderer nodes plus outstanding barriers.
#[derive(Debug, Default)]
pub struct BarrierRegistry {
    state: Mutex<RegistryState>,
    changed: Notify,
}

impl BarrierRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node. Returns false if it was already registered.
    pub fn register(&self, node: NodeId) -> bool {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(node)
    }

    /// Removes a node and releases it from every outstanding barrier.
    pub fn unregister(&self, node: NodeId) -> bool {
        let removed = {
            let mut state = self.state.lock().unwrap();
            for waiting in state.pending.values_mut() {
                waiting.remove(&node);
            }
            state.nodes.remove(&node)
        };
        self.changed.notify_waiters();
        removed
    }

    /// Returns true if the node is registered.
    pub fn contains(&self, node: NodeId) -> bool {
        self.state.lock().unwrap().nodes.contains(&node)
    }

    /// Returns the registered nodes in a stable order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.state.lock().unwrap().nodes.iter().copied().collect()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    /// Returns true if no node is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a barrier over the currently registered nodes.
    ///
    /// Returns the new token and the participants that must acknowledge it.
    pub fn open(&self) -> (BarrierToken, Vec<NodeId>) {
        let mut state = self.state.lock().unwrap();
        state.next_token += 1;
        let token = BarrierToken(state.next_token);
        let participants = state.nodes.clone();
        let list = participants.iter().copied().collect();
        state.pending.insert(token, participants);
        (token, list)
    }

    /// Records an acknowledgement. Returns false for unknown tokens or
    /// nodes that were not expected.
    pub fn acknowledge(&self, node: NodeId, token: BarrierToken) -> bool {
        let accepted = {
            let mut state = self.state.lock().unwrap();
            match state.pending.get_mut(&token) {
                Some(waiting) => waiting.remove(&node),
                None => false,
            }
        };
        if accepted {
            self.changed.notify_waiters();
        }
        accepted
    }

    /// Nodes that still owe an acknowledgement for `token`.
    pub fn outstanding(&self, token: BarrierToken) -> Vec<NodeId> {
        let state = self.state.lock().unwrap();
        state
            .pending
            .get(&token)
            .map(|waiting| waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Forgets a barrier. Late acknowledgements for it are ignored.
    pub fn close(&self, token: BarrierToken) {
        self.state.lock().unwrap().pending.remove(&token);
    }

    /// Waits until `token` is fully acknowledged or `timeout` elapses.
    ///
    /// The barrier is closed before returning in both cases.
    pub async fn wait<C: ClusterContext>(
        &self,
        ctx: &C,
        token: BarrierToken,
        timeout: Duration,
    ) -> BarrierOutcome {
        let deadline = ctx.now() + timeout;

        loop {
            let outstanding = self.outstanding(token);
            if outstanding.is_empty() {
                self.close(token);
                return BarrierOutcome::Acknowledged;
            }

            let now = ctx.now();
            if now >= deadline {
                self.close(token);
                return BarrierOutcome::TimedOut {
                    missing: outstanding,
                };
            }

            let step = (deadline - now).min(BARRIER_POLL_INTERVAL);
            tokio::select! {
                _ = self.changed.notified() => {}
                _ = ctx.sleep(step) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokioContext;

    #[test]
    fn test_open_snapshots_participants() {
        let registry = BarrierRegistry::new();
        let a = NodeId::from_seed(1);
        let b = NodeId::from_seed(2);

        registry.register(a);
        let (token, participants) = registry.open();
        assert_eq!(participants, vec![a]);

        // Late joiner is not expected by the already-open barrier
        registry.register(b);
        assert_eq!(registry.outstanding(token), vec![a]);
    }

    #[test]
    fn test_acknowledge_unknown_token_is_rejected() {
        let registry = BarrierRegistry::new();
        let a = NodeId::from_seed(1);
        registry.register(a);

        assert!(!registry.acknowledge(a, BarrierToken(99)));

        let (token, _) = registry.open();
        assert!(registry.acknowledge(a, token));
        // Second ack is a no-op
        assert!(!registry.acknowledge(a, token));
        assert!(registry.outstanding(token).is_empty());
    }

    #[test]
    fn test_unregister_releases_pending_barriers() {
        let registry = BarrierRegistry::new();
        let a = NodeId::from_seed(1);
        let b = NodeId::from_seed(2);
        registry.register(a);
        registry.register(b);

        let (token, _) = registry.open();
        registry.acknowledge(a, token);
        assert_eq!(registry.outstanding(token), vec![b]);

        assert!(registry.unregister(b));
        assert!(registry.outstanding(token).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_wait_with_no_nodes_resolves_immediately() {
        let ctx = TokioContext::new();
        let registry = BarrierRegistry::new();
        let (token, _) = registry.open();

        let outcome = registry.wait(&ctx, token, Duration::from_secs(10)).await;
        assert!(outcome.is_acknowledged());
    }

    #[tokio::test]
    async fn test_wait_times_out_on_silent_node() {
        let ctx = TokioContext::new();
        let registry = BarrierRegistry::new();
        let silent = NodeId::from_seed(3);
        registry.register(silent);

        let (token, _) = registry.open();
        let outcome = registry.wait(&ctx, token, Duration::from_millis(20)).await;

        assert_eq!(outcome, BarrierOutcome::TimedOut { missing: vec![silent] });
        // Closed after timing out
        assert!(!registry.acknowledge(silent, token));
    }
}
