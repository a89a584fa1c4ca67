//! PanoView Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seams that let the PanoView coordinator
//! and renderer engines run both in **Production** (tokio, a real transport)
//! and in the **Simulation** harness (virtual clock, in-memory cluster).
//!
//! # Core Concept
//!
//! Everything that makes a cluster run non-reproducible is behind a trait:
//! - Time (`now()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - Transport (`broadcast()`, `barrier()`, `recv()`, `acknowledge()`)
//!
//! # Example
//!
//! ```ignore
//! use panoview_env::{ClusterContext, NodeTransport, NodeEvent};
//!
//! async fn node_loop<Ctx: ClusterContext, Net: NodeTransport>(ctx: &Ctx, net: &Net) {
//!     while let Some(event) = net.recv().await {
//!         match event {
//!             NodeEvent::Packet(envelope) => apply(envelope),
//!             NodeEvent::Barrier(token) => net.acknowledge(token).await?,
//!         }
//!     }
//! }
//! ```

mod barrier;
mod context;
mod error;
mod network;
mod tokio_impl;
mod types;

pub use barrier::{BarrierRegistry, BARRIER_POLL_INTERVAL};
pub use context::ClusterContext;
pub use error::EnvError;
pub use network::{CoordinatorTransport, NodeTransport};
pub use tokio_impl::TokioContext;
pub use types::{BarrierOutcome, BarrierToken, Envelope, MembershipEvent, NodeEvent, NodeId};
