//! Simulated cluster transport with fault injection.
//!
//! One [`SimCluster`] is the coordinator's end; each [`SimNodeLink`] is a
//! renderer's end. Delivery is in-order per node over unbounded channels.

use crate::context::SimContext;

use async_trait::async_trait;
use panoview_core::Broadcast;
use panoview_env::{
    BarrierOutcome, BarrierRegistry, BarrierToken, ClusterContext, CoordinatorTransport, EnvError,
    Envelope, MembershipEvent, NodeEvent, NodeId, NodeTransport,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Per-node fault settings and the node's inbox.
struct Link {
    tx: mpsc::UnboundedSender<NodeEvent>,

    /// Acknowledgements from this node are dropped
    silenced: bool,

    /// Extra time before this node's acknowledgement is delivered
    ack_delay: Duration,
}

/// Traffic counters.
#[derive(Debug, Default)]
struct Counters {
    envelopes_delivered: AtomicU64,
    barriers_opened: AtomicU64,
    acks_dropped: AtomicU64,
}

/// What the coordinator put on the wire, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Broadcast(Broadcast),
    /// Greeting queued to a node as it connected
    Greeting(NodeId, Broadcast),
    Barrier(BarrierToken),
}

impl WireEvent {
    /// Topic name, or `barrier`.
    pub fn topic(&self) -> &'static str {
        match self {
            WireEvent::Broadcast(message) | WireEvent::Greeting(_, message) => message.topic(),
            WireEvent::Barrier(_) => "barrier",
        }
    }
}

/// Snapshot of the cluster's traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    pub envelopes_delivered: u64,
    pub barriers_opened: u64,
    pub acks_dropped: u64,
}

struct Shared {
    context: Arc<SimContext>,
    registry: BarrierRegistry,
    links: Mutex<HashMap<NodeId, Link>>,
    greeting: Mutex<Option<Envelope>>,
    membership_tx: mpsc::UnboundedSender<MembershipEvent>,
    counters: Counters,
    wire_log: Mutex<Vec<WireEvent>>,
}

impl Shared {
    fn record(&self, event: impl FnOnce() -> Option<WireEvent>) {
        if let Some(event) = event() {
            self.wire_log.lock().unwrap().push(event);
        }
    }
}

/// In-memory hub connecting one coordinator to any number of renderers.
#[derive(Clone)]
pub struct SimCluster {
    shared: Arc<Shared>,
    membership_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<MembershipEvent>>>,
}

impl SimCluster {
    /// Creates an empty cluster.
    pub fn new(context: Arc<SimContext>) -> Self {
        let (membership_tx, membership_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                context,
                registry: BarrierRegistry::new(),
                links: Mutex::new(HashMap::new()),
                greeting: Mutex::new(None),
                membership_tx,
                counters: Counters::default(),
                wire_log: Mutex::new(Vec::new()),
            }),
            membership_rx: Arc::new(tokio::sync::Mutex::new(membership_rx)),
        }
    }

    /// Connects a renderer and returns its end of the link.
    ///
    /// The greeting, if one is set, is queued before the link joins the
    /// broadcast set. Both happen under the links lock, so a concurrent
    /// broadcast lands either entirely before the node exists or after its
    /// greeting.
    pub fn connect(&self, id: NodeId) -> SimNodeLink {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut links = self.shared.links.lock().unwrap();
            if let Some(greeting) = self.shared.greeting.lock().unwrap().clone() {
                self.shared
                    .record(|| Broadcast::decode(&greeting).ok().map(|m| WireEvent::Greeting(id, m)));
                if tx.send(NodeEvent::Packet(greeting)).is_ok() {
                    self.shared.counters.envelopes_delivered.fetch_add(1, Ordering::SeqCst);
                }
            }
            links.insert(
                id,
                Link {
                    tx,
                    silenced: false,
                    ack_delay: Duration::ZERO,
                },
            );
        }
        self.shared.registry.register(id);
        let _ = self.shared.membership_tx.send(MembershipEvent::Joined(id));
        info!("node {} connected", id);

        SimNodeLink {
            id,
            rx: tokio::sync::Mutex::new(rx),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Drops a renderer. Its link closes and outstanding barriers stop
    /// waiting for it.
    pub fn disconnect(&self, id: NodeId) -> bool {
        let removed = self.shared.links.lock().unwrap().remove(&id).is_some();
        if removed {
            self.shared.registry.unregister(id);
            let _ = self.shared.membership_tx.send(MembershipEvent::Left(id));
            info!("node {} disconnected", id);
        }
        removed
    }

    /// Drops (or stops dropping) a node's barrier acknowledgements.
    pub fn silence(&self, id: NodeId, silenced: bool) {
        if let Some(link) = self.shared.links.lock().unwrap().get_mut(&id) {
            link.silenced = silenced;
        }
    }

    /// Delays a node's barrier acknowledgements, standing in for decode time.
    pub fn set_ack_delay(&self, id: NodeId, delay: Duration) {
        if let Some(link) = self.shared.links.lock().unwrap().get_mut(&id) {
            link.ack_delay = delay;
        }
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.shared.links.lock().unwrap().contains_key(&id)
    }

    /// Everything sent so far, pose traffic included.
    pub fn wire_log(&self) -> Vec<WireEvent> {
        self.shared.wire_log.lock().unwrap().clone()
    }

    /// The wire log without `pose` broadcasts.
    pub fn scene_traffic(&self) -> Vec<WireEvent> {
        self.wire_log()
            .into_iter()
            .filter(|event| !matches!(event, WireEvent::Broadcast(Broadcast::Pose { .. })))
            .collect()
    }

    pub fn stats(&self) -> ClusterStats {
        let counters = &self.shared.counters;
        ClusterStats {
            envelopes_delivered: counters.envelopes_delivered.load(Ordering::SeqCst),
            barriers_opened: counters.barriers_opened.load(Ordering::SeqCst),
            acks_dropped: counters.acks_dropped.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl CoordinatorTransport for SimCluster {
    async fn broadcast(&self, packet: Envelope) -> usize {
        self.shared
            .record(|| Broadcast::decode(&packet).ok().map(WireEvent::Broadcast));
        let links = self.shared.links.lock().unwrap();
        let mut delivered = 0;
        for link in links.values() {
            if link.tx.send(NodeEvent::Packet(packet.clone())).is_ok() {
                delivered += 1;
            }
        }
        self.shared
            .counters
            .envelopes_delivered
            .fetch_add(delivered as u64, Ordering::SeqCst);
        trace!(seq = packet.seq, delivered, "sim broadcast");
        delivered
    }

    fn set_greeting(&self, packet: Envelope) {
        *self.shared.greeting.lock().unwrap() = Some(packet);
    }

    async fn barrier(&self, timeout: Duration) -> BarrierOutcome {
        let (token, participants) = self.shared.registry.open();
        self.shared.counters.barriers_opened.fetch_add(1, Ordering::SeqCst);
        self.shared.record(|| Some(WireEvent::Barrier(token)));
        debug!("{} opened for {} node(s)", token, participants.len());
        {
            let links = self.shared.links.lock().unwrap();
            for node in &participants {
                if let Some(link) = links.get(node) {
                    let _ = link.tx.send(NodeEvent::Barrier(token));
                }
            }
        }
        self.shared
            .registry
            .wait(self.shared.context.as_ref(), token, timeout)
            .await
    }

    async fn next_membership_event(&self) -> Option<MembershipEvent> {
        self.membership_rx.lock().await.recv().await
    }

    fn connected_nodes(&self) -> Vec<NodeId> {
        self.shared.registry.nodes()
    }
}

/// A renderer's end of a [`SimCluster`].
pub struct SimNodeLink {
    id: NodeId,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<NodeEvent>>,
    shared: Arc<Shared>,
}

#[async_trait]
impl NodeTransport for SimNodeLink {
    async fn recv(&self) -> Option<NodeEvent> {
        self.rx.lock().await.recv().await
    }

    async fn acknowledge(&self, token: BarrierToken) -> Result<(), EnvError> {
        let (silenced, delay) = {
            let links = self.shared.links.lock().unwrap();
            let link = links.get(&self.id).ok_or_else(|| EnvError::unreachable(self.id))?;
            (link.silenced, link.ack_delay)
        };

        if silenced {
            self.shared.counters.acks_dropped.fetch_add(1, Ordering::SeqCst);
            trace!("node {} ack for {} dropped", self.id, token);
            return Ok(());
        }

        if !delay.is_zero() {
            self.shared.context.sleep(delay).await;
        }
        if !self.shared.registry.acknowledge(self.id, token) {
            trace!("node {} ack for {} ignored (closed)", self.id, token);
        }
        Ok(())
    }

    fn local_id(&self) -> NodeId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(seq: u64) -> Envelope {
        Envelope::new(seq, vec![seq as u8], seq)
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_reaches_connected_nodes_in_order() {
        let cluster = SimCluster::new(SimContext::shared(1));
        let a = cluster.connect(NodeId::from_seed(1));
        let b = cluster.connect(NodeId::from_seed(2));

        assert_eq!(cluster.broadcast(envelope(0)).await, 2);
        assert_eq!(cluster.broadcast(envelope(1)).await, 2);

        for link in [&a, &b] {
            for expected in 0..2 {
                match link.recv().await {
                    Some(NodeEvent::Packet(env)) => assert_eq!(env.seq, expected),
                    other => panic!("unexpected {:?}", other),
                }
            }
        }
        assert_eq!(cluster.stats().envelopes_delivered, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_barrier_completes_when_all_ack() {
        let ctx = SimContext::shared(2);
        let cluster = SimCluster::new(Arc::clone(&ctx));
        let link = cluster.connect(NodeId::from_seed(1));
        cluster.set_ack_delay(link.local_id(), Duration::from_millis(40));

        let responder = tokio::spawn(async move {
            while let Some(event) = link.recv().await {
                if let NodeEvent::Barrier(token) = event {
                    link.acknowledge(token).await.unwrap();
                }
            }
        });

        let outcome = cluster.barrier(Duration::from_secs(10)).await;
        assert!(outcome.is_acknowledged());
        let elapsed = ctx.now();
        assert!(elapsed >= Duration::from_millis(40) && elapsed < Duration::from_millis(100));
        responder.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silenced_node_times_out() {
        let ctx = SimContext::shared(3);
        let cluster = SimCluster::new(Arc::clone(&ctx));
        let quiet = NodeId::from_seed(9);
        let link = cluster.connect(quiet);
        cluster.silence(quiet, true);

        let responder = tokio::spawn(async move {
            while let Some(event) = link.recv().await {
                if let NodeEvent::Barrier(token) = event {
                    link.acknowledge(token).await.unwrap();
                }
            }
        });

        let outcome = cluster.barrier(Duration::from_millis(250)).await;
        assert_eq!(outcome, BarrierOutcome::TimedOut { missing: vec![quiet] });
        assert!(ctx.now() >= Duration::from_millis(250));
        assert_eq!(cluster.stats().acks_dropped, 1);
        responder.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_releases_barrier_and_closes_link() {
        let ctx = SimContext::shared(4);
        let cluster = SimCluster::new(Arc::clone(&ctx));
        let gone = NodeId::from_seed(5);
        let link = cluster.connect(gone);

        let remote = cluster.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            remote.disconnect(gone);
        });

        let outcome = cluster.barrier(Duration::from_secs(10)).await;
        assert!(outcome.is_acknowledged());
        assert!(ctx.now() < Duration::from_secs(1));

        // Barrier request, then end of stream
        assert!(matches!(link.recv().await, Some(NodeEvent::Barrier(_))));
        assert!(link.recv().await.is_none());
        assert!(!cluster.is_connected(gone));
        assert!(cluster.connected_nodes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_precedes_broadcasts() {
        let cluster = SimCluster::new(SimContext::shared(6));
        let early = cluster.connect(NodeId::from_seed(1));
        let config = Broadcast::Config(panoview_core::RendererConfig {
            search_paths: vec!["/srv/dome".into()],
        });
        cluster.set_greeting(config.encode(0, 0).unwrap());

        let late_id = NodeId::from_seed(2);
        let late = cluster.connect(late_id);
        cluster.broadcast(envelope(7)).await;

        match late.recv().await {
            Some(NodeEvent::Packet(env)) => assert_eq!(Broadcast::decode(&env).unwrap(), config),
            other => panic!("expected greeting, got {:?}", other),
        }
        assert!(matches!(late.recv().await, Some(NodeEvent::Packet(env)) if env.seq == 7));
        // Nodes connected before the greeting was set only see the broadcast
        assert!(matches!(early.recv().await, Some(NodeEvent::Packet(env)) if env.seq == 7));
        assert_eq!(cluster.wire_log()[0], WireEvent::Greeting(late_id, config));
    }

    #[tokio::test(start_paused = true)]
    async fn test_membership_events() {
        let cluster = SimCluster::new(SimContext::shared(5));
        let id = NodeId::from_seed(3);
        let _link = cluster.connect(id);
        cluster.disconnect(id);

        assert_eq!(cluster.next_membership_event().await, Some(MembershipEvent::Joined(id)));
        assert_eq!(cluster.next_membership_event().await, Some(MembershipEvent::Left(id)));
    }
}
