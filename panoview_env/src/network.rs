//! Transport abstraction between the coordinator and renderer nodes.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::EnvError;
use crate::types::{BarrierOutcome, BarrierToken, Envelope, MembershipEvent, NodeEvent, NodeId};

/// The coordinator's side of the cluster channel.
///
/// # Implementations
///
/// - **Production**: supplied by the deployment (WebSocket, UDP multicast, ...)
/// - **Simulation**: `SimCluster`, an in-memory hub with fault injection
///
/// # Packet Flow
///
/// ```text
/// Coordinator                  Transport                  Renderer N
///   |                             |                           |
///   |-- set_greeting(config) ---->|-- first, on registration->|-- recv() -> Packet
///   |-- broadcast(envelope) ----->|-- in send order --------->|-- recv() -> Packet
///   |-- barrier(timeout) -------->|-- Barrier(token) -------->|
///   |                             |<------- acknowledge(token)|
///   |<-- Acknowledged / TimedOut -|                           |
/// ```
#[async_trait]
pub trait CoordinatorTransport: Send + Sync + 'static {
    /// Broadcasts an envelope to every currently connected renderer.
    ///
    /// Fire-and-forget: returns once the envelope is queued. Envelopes from
    /// one sender are delivered in the order they were broadcast.
    ///
    /// # Returns
    /// Number of nodes the envelope was queued for.
    async fn broadcast(&self, packet: Envelope) -> usize;

    /// Sets the envelope every renderer receives first when it registers.
    ///
    /// The greeting is queued to a joining node before the node joins the
    /// broadcast set, so no broadcast can reach the node ahead of it. Nodes
    /// already connected are not sent anything. Replaces any previous
    /// greeting.
    fn set_greeting(&self, packet: Envelope);

    /// Runs a distributed rendezvous across the currently registered nodes.
    ///
    /// Resolves when every node has acknowledged or when `timeout` elapses,
    /// whichever comes first. Never blocks past the timeout.
    async fn barrier(&self, timeout: Duration) -> BarrierOutcome;

    /// Waits for the next membership change.
    ///
    /// # Returns
    /// * `None` - The transport has shut down
    async fn next_membership_event(&self) -> Option<MembershipEvent>;

    /// Returns the nodes currently registered.
    fn connected_nodes(&self) -> Vec<NodeId>;
}

/// A renderer node's side of the cluster channel.
#[async_trait]
pub trait NodeTransport: Send + Sync + 'static {
    /// Receives the next event addressed to this node.
    ///
    /// # Returns
    /// * `Some(event)` - A packet or barrier request
    /// * `None` - The channel was closed (disconnect)
    async fn recv(&self) -> Option<NodeEvent>;

    /// Acknowledges a barrier request.
    async fn acknowledge(&self, token: BarrierToken) -> Result<(), EnvError>;

    /// Returns this node's ID.
    fn local_id(&self) -> NodeId;
}
