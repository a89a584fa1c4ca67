//! Common types for the PanoView environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a renderer node.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Creates a new random NodeId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a NodeId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a deterministic NodeId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Envelope for messages transmitted from the coordinator to renderers.
///
/// This is a transport-layer wrapper - the payload is opaque bytes that the
/// receiving engine decodes. `seq` is assigned by the sender and increases
/// by one per envelope, which lets receivers detect gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number
    pub seq: u64,

    /// Timestamp when the envelope was created (sender's clock)
    pub timestamp_ms: u64,

    /// The encoded message
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Creates a new envelope from payload bytes.
    pub fn new(seq: u64, payload: Vec<u8>, timestamp_ms: u64) -> Self {
        Self {
            seq,
            timestamp_ms,
            payload,
        }
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Token identifying one distributed rendezvous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarrierToken(pub u64);

impl std::fmt::Display for BarrierToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "barrier#{}", self.0)
    }
}

/// How a barrier resolved.
///
/// Both variants let the caller proceed; `TimedOut` records which nodes
/// never answered so the caller can log them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierOutcome {
    /// Every node registered when the barrier opened acknowledged it
    /// (or left the cluster).
    Acknowledged,

    /// The timeout elapsed first.
    TimedOut {
        /// Nodes that had not acknowledged
        missing: Vec<NodeId>,
    },
}

impl BarrierOutcome {
    /// Returns true if every node rendezvoused.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, BarrierOutcome::Acknowledged)
    }
}

/// Cluster membership change observed by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEvent {
    /// A renderer connected and registered itself
    Joined(NodeId),

    /// A renderer disconnected
    Left(NodeId),
}

/// Event delivered to a renderer node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// A broadcast or directed message from the coordinator
    Packet(Envelope),

    /// A rendezvous request that must be acknowledged
    Barrier(BarrierToken),
}
