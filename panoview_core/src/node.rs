//! Renderer node - drives a [`Renderer`] from its transport.
//!
//! The node applies events strictly in arrival order. A barrier request is
//! acknowledged only after every earlier load has been applied, so an ack
//! means "my next scene is decoded and ready to fade in".

use crate::error::CoreResult;
use crate::renderer::Renderer;
use crate::scene::{SceneBackend, Surface};

use panoview_env::{NodeEvent, NodeId, NodeTransport};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// A renderer process bound to one transport endpoint.
pub struct RendererNode<Net, B>
where
    Net: NodeTransport,
    B: SceneBackend,
{
    /// Node identifier
    pub node_id: NodeId,

    /// Network interface
    network: Arc<Net>,

    /// Scene state, shared with the render loop
    renderer: Arc<Mutex<Renderer<B>>>,

    /// Events applied so far
    events_applied: u64,
}

impl<Net, B> RendererNode<Net, B>
where
    Net: NodeTransport,
    B: SceneBackend,
{
    pub fn new(network: Arc<Net>, backend: B) -> Self {
        Self {
            node_id: network.local_id(),
            network,
            renderer: Arc::new(Mutex::new(Renderer::new(backend))),
            events_applied: 0,
        }
    }

    /// Handle for the render loop.
    pub fn renderer(&self) -> Arc<Mutex<Renderer<B>>> {
        Arc::clone(&self.renderer)
    }

    /// Applies one event.
    pub async fn process(&mut self, event: NodeEvent) -> CoreResult<()> {
        self.events_applied += 1;
        match event {
            NodeEvent::Packet(envelope) => {
                let mut renderer = self.renderer.lock().unwrap();
                renderer.handle_envelope(&envelope)
            }
            NodeEvent::Barrier(token) => {
                debug!("node {} acknowledging {}", self.node_id, token);
                self.network.acknowledge(token).await?;
                Ok(())
            }
        }
    }

    /// Processes events until the transport closes.
    ///
    /// Bad messages are logged and skipped; the loop only ends on disconnect.
    pub async fn run(mut self) {
        info!("renderer node {} started", self.node_id);
        while let Some(event) = self.network.recv().await {
            if let Err(e) = self.process(event).await {
                warn!("node {}: {}", self.node_id, e);
            }
        }
        info!("renderer node {} disconnected after {} events", self.node_id, self.events_applied);
    }

    /// Draws one frame with the current state.
    pub fn render_frame(&self, surface: &mut dyn Surface) {
        self.renderer.lock().unwrap().frame(surface);
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }
}
