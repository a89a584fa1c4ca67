//! Sequenced sending on behalf of the coordinator.

use crate::error::CoreResult;
use crate::protocol::Broadcast;
use panoview_env::{ClusterContext, CoordinatorTransport};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{trace, warn};

/// Stamps messages with a sequence number and the coordinator clock.
///
/// The sequence lock is held across the transport call so that two tasks
/// (the action queue and the pose loop) can never hand envelopes to the
/// transport out of sequence order.
pub struct Outbox<Ctx, Net>
where
    Ctx: ClusterContext,
    Net: CoordinatorTransport,
{
    context: Arc<Ctx>,
    network: Arc<Net>,
    seq: Mutex<u64>,
}

impl<Ctx, Net> Outbox<Ctx, Net>
where
    Ctx: ClusterContext,
    Net: CoordinatorTransport,
{
    pub fn new(context: Arc<Ctx>, network: Arc<Net>) -> Self {
        Self {
            context,
            network,
            seq: Mutex::new(0),
        }
    }

    /// Broadcasts to every connected node. Returns the number of recipients.
    pub async fn broadcast(&self, message: &Broadcast) -> usize {
        let mut seq = self.seq.lock().await;
        let envelope = match message.encode(*seq, self.context.now_ms()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("dropping {} broadcast: {}", message.topic(), e);
                return 0;
            }
        };
        *seq += 1;
        let delivered = self.network.broadcast(envelope).await;
        trace!(topic = message.topic(), delivered, "broadcast");
        delivered
    }

    /// Installs the message every renderer receives first on registration.
    ///
    /// Stamped with the last broadcast sequence number; it does not consume
    /// one.
    pub async fn set_greeting(&self, message: &Broadcast) -> CoreResult<()> {
        let seq = self.seq.lock().await;
        let envelope = message.encode(seq.saturating_sub(1), self.context.now_ms())?;
        self.network.set_greeting(envelope);
        Ok(())
    }

    /// Number of broadcasts sent so far.
    pub async fn sent(&self) -> u64 {
        *self.seq.lock().await
    }
}
