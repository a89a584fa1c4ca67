//! PanoView Core - Synchronized Presentation Protocol for Panoramic Clusters
//!
//! One coordinator decides what a dome shows and when it changes; many
//! renderers each draw one view and must change in lockstep. This crate
//! holds both halves of that protocol:
//! 1. **Coordinator**: a strict action queue of load, barrier and crossfade
//!    steps, plus a free-running pose integrator
//! 2. **Renderer**: a double-buffered scene state machine driven only by
//!    coordinator broadcasts
//! 3. **Shared math**: the Euler-to-quaternion conversion every node applies
//!    identically

pub mod action_queue;
pub mod assets;
pub mod catalog;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod manifest;
pub mod node;
pub mod outbox;
pub mod pose;
pub mod protocol;
pub mod renderer;
pub mod rpc;
pub mod scene;
pub mod timeline;

// Re-export key types for convenience
pub use action_queue::ActionQueue;
pub use assets::{resolve_file, resolve_source, AssetSource};
pub use catalog::{AssetCatalog, ImageInfo, ImageThumbnailer, ThumbnailGenerator, VideoInfo};
pub use config::{CoordinatorConfig, RendererConfig};
pub use control::ControlMessage;
pub use coordinator::{Coordinator, StatsSnapshot};
pub use error::{CoreError, CoreResult};
pub use manifest::{Manifest, ManifestEntry};
pub use node::RendererNode;
pub use pose::{Axis, Orientation, PoseCommand, PoseState};
pub use protocol::{Broadcast, StereoMode};
pub use renderer::{Renderer, SceneSlots};
pub use rpc::RpcRouter;
pub use scene::{
    MessageLine, Rgb, Scene, SceneBackend, SceneKind, Surface, TextureId, VideoDecoder,
};
pub use timeline::{PresentStep, PresentationTimeline};
