//! PanoView Deterministic Cluster Simulation
//!
//! Runs a coordinator and N renderer nodes in one process, on a paused
//! tokio clock, so a whole show (loads, barriers, crossfades, pose) plays
//! out deterministically and its wire traffic can be inspected.
//!
//! # Core Principle: Everything Virtual
//!
//! - **Time**: tokio's paused clock auto-advances when every task is idle
//! - **Network**: in-memory links with per-node ack delay and fault injection
//! - **Randomness**: decode-time jitter derived from a single 64-bit seed
//! - **Rendering**: a headless backend that records draw calls
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ tokio current_thread runtime (paused clock)          │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                      ┌─────────────┐                        │
//! │                      │ Coordinator │                        │
//! │                      └──────┬──────┘                        │
//! │                             │ SimCluster                    │
//! │           ┌─────────────────┼─────────────────┐             │
//! │      ┌────▼────┐       ┌────▼────┐       ┌────▼────┐        │
//! │      │ Renderer│       │ Renderer│       │ Renderer│  ...   │
//! │      │   #1    │       │   #2    │       │   #3    │        │
//! │      └─────────┘       └─────────┘       └─────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use panoview_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 4).run(ScenarioId::SilentNode);
//! assert!(result.passed);
//! ```

mod backend;
mod context;
mod error;
mod network;
mod runner;
mod world;
pub mod scenarios;

pub use backend::{BackendStats, DrawCall, FrameRecorder, SimSceneBackend, SimVideoDecoder};
pub use context::SimContext;
pub use error::SimError;
pub use network::{ClusterStats, SimCluster, SimNodeLink, WireEvent};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{NodeHandle, NodeSnapshot, SimConfig, SimWorld, SAMPLE_ASSETS, SETTLE_TIME};
