//! SimWorld - The simulation harness container.
//!
//! A world is one coordinator plus N renderer nodes on a [`SimCluster`],
//! all sharing a paused-time [`SimContext`]. Build it inside a runtime
//! created with `start_paused(true)`.

use crate::backend::{BackendStats, DrawCall, FrameRecorder, SimSceneBackend};
use crate::context::SimContext;
use crate::error::SimError;
use crate::network::SimCluster;

use nalgebra::UnitQuaternion;
use panoview_core::renderer::Renderer;
use panoview_core::scene::{Scene, SceneKind};
use panoview_core::{Coordinator, CoordinatorConfig, Orientation, RendererNode};
use panoview_env::{ClusterContext, NodeId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Files written to the scratch asset directory of every world.
pub const SAMPLE_ASSETS: &[&str] = &["a.jpg", "b.jpg", "dome_tb.png", "clip.mp4", "corrupt.jpg"];

/// Quiet period after the queue drains, long enough for nodes to apply
/// everything already sent.
pub const SETTLE_TIME: Duration = Duration::from_millis(50);

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of renderer nodes to spawn
    pub num_nodes: usize,

    /// Upper bound of the per-node simulated decode time
    pub max_ack_delay_ms: u64,

    /// Coordinator settings. The scratch asset directory is prepended to
    /// the renderer search paths.
    pub coordinator: CoordinatorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_nodes: 4,
            max_ack_delay_ms: 200,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

/// Handle to a simulated renderer.
pub struct NodeHandle {
    /// Node's ID
    pub id: NodeId,

    /// Scene state shared with the node task
    renderer: Arc<Mutex<Renderer<SimSceneBackend>>>,

    /// Load counters of this node's backend
    pub backend_stats: Arc<BackendStats>,
}

/// What one renderer shows at a moment in time.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub current: Option<SceneKind>,
    pub next: Option<SceneKind>,
    pub blend_factor: f64,
    pub orientation: Orientation,
    pub rotation: UnitQuaternion<f64>,
    pub clock_ms: u64,
    /// Text of the current scene if it is a message
    pub message: Option<String>,
    /// Frame index of the current scene if it is a video
    pub video_frame: Option<u64>,
    pub search_paths: Vec<PathBuf>,
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Cluster transport, also the fault injection handle
    pub cluster: SimCluster,

    /// The coordinator under test
    pub coordinator: Coordinator<SimContext, SimCluster>,

    /// Renderer handles
    nodes: BTreeMap<NodeId, NodeHandle>,

    /// Scratch directory holding [`SAMPLE_ASSETS`]
    asset_dir: PathBuf,

    /// Nodes spawned so far (feeds deterministic node ids)
    spawned: u64,
}

impl SimWorld {
    /// Creates the world, starts the coordinator and spawns the initial nodes.
    pub async fn new(mut config: SimConfig) -> Result<Self, SimError> {
        let context = SimContext::shared(config.seed);
        let asset_dir = prepare_assets(config.seed)?;
        config
            .coordinator
            .renderer
            .search_paths
            .insert(0, asset_dir.clone());

        let cluster = SimCluster::new(Arc::clone(&context));
        let coordinator = Coordinator::new(
            Arc::clone(&context),
            Arc::new(cluster.clone()),
            config.coordinator.clone(),
        )?;

        let mut world = Self {
            config,
            context,
            cluster,
            coordinator,
            nodes: BTreeMap::new(),
            asset_dir,
            spawned: 0,
        };

        for _ in 0..world.config.num_nodes {
            world.add_node();
        }
        world.coordinator.start().await;
        info!(
            "world ready: seed={} nodes={} assets={}",
            world.config.seed,
            world.nodes.len(),
            world.asset_dir.display()
        );
        Ok(world)
    }

    /// Connects and spawns one renderer node.
    ///
    /// Its simulated decode time is drawn from the world's seeded RNG.
    pub fn add_node(&mut self) -> NodeId {
        self.spawned += 1;
        let id = NodeId::from_seed(self.config.seed.wrapping_mul(1_000).wrapping_add(self.spawned));

        let link = self.cluster.connect(id);
        let ack_delay = self
            .context
            .jitter(Duration::from_millis(self.config.max_ack_delay_ms));
        self.cluster.set_ack_delay(id, ack_delay);

        let backend = SimSceneBackend::new();
        let backend_stats = backend.stats();
        let node = RendererNode::new(Arc::new(link), backend);
        let renderer = node.renderer();
        self.context.spawn(&format!("node-{}", id), node.run());

        debug!("spawned node {} (ack delay {:?})", id, ack_delay);
        self.nodes.insert(
            id,
            NodeHandle {
                id,
                renderer,
                backend_stats,
            },
        );
        id
    }

    /// Disconnects a node. Its last state stays readable.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let removed = self.cluster.disconnect(id);
        self.nodes.remove(&id);
        removed
    }

    /// Lets virtual time pass.
    pub async fn run_for(&self, duration: Duration) {
        self.context.sleep(duration).await;
    }

    /// Waits for the action queue to drain, then for the nodes to catch up.
    pub async fn settle(&self) {
        self.coordinator.idle().await;
        self.context.sleep(SETTLE_TIME).await;
    }

    /// Stops the pose loop and lets the nodes drain, so every node ends on
    /// the same coordinator timestamp. The coordinator accepts no further
    /// pose ticks afterwards.
    pub async fn freeze(&self) {
        self.coordinator.shutdown();
        self.settle().await;
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeHandle> {
        self.nodes.get(&id)
    }

    /// Snapshot of one node.
    pub fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        let handle = self.nodes.get(&id)?;
        let renderer = handle.renderer.lock().unwrap();
        let (current, next) = renderer.scene_kinds();
        let (message, video_frame) = match renderer.slots().current() {
            Some(Scene::Message(scene)) => (Some(scene.text()), None),
            Some(Scene::Video(scene)) => (None, Some(scene.frame_index())),
            _ => (None, None),
        };
        Some(NodeSnapshot {
            id,
            current,
            next,
            blend_factor: renderer.slots().blend_factor(),
            orientation: renderer.orientation(),
            rotation: renderer.rotation(),
            clock_ms: renderer.clock_ms(),
            message,
            video_frame,
            search_paths: renderer.config().search_paths.clone(),
        })
    }

    /// Snapshots of every node, in id order.
    pub fn snapshots(&self) -> Vec<NodeSnapshot> {
        self.nodes
            .keys()
            .filter_map(|id| self.snapshot(*id))
            .collect()
    }

    /// Renders one frame on every node.
    pub fn render_all(&self) -> Vec<(NodeId, Vec<DrawCall>)> {
        self.nodes
            .values()
            .map(|handle| {
                let mut recorder = FrameRecorder::new();
                handle.renderer.lock().unwrap().frame(&mut recorder);
                (handle.id, recorder.into_calls())
            })
            .collect()
    }

    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    /// Current virtual time in seconds.
    pub fn time_secs(&self) -> f64 {
        self.context.now().as_secs_f64()
    }
}

impl Drop for SimWorld {
    fn drop(&mut self) {
        self.coordinator.shutdown();
        let _ = std::fs::remove_dir_all(&self.asset_dir);
    }
}

fn prepare_assets(seed: u64) -> Result<PathBuf, SimError> {
    let dir = std::env::temp_dir().join(format!("panoview-sim-{}-{}", seed, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir)?;
    for name in SAMPLE_ASSETS {
        std::fs::write(dir.join(name), name.as_bytes())?;
    }
    std::fs::write(
        dir.join(panoview_core::manifest::MANIFEST_FILE),
        r#"{"dome_tb.png": "top-bottom", "clip.mp4": ["mono", 30], "corrupt.jpg": "ignore"}"#,
    )?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use panoview_core::StereoMode;
    use panoview_env::CoordinatorTransport;
    use std::sync::atomic::Ordering;

    fn small_config(seed: u64) -> SimConfig {
        SimConfig {
            seed,
            num_nodes: 3,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_world_spawns_nodes_with_config() {
        let world = SimWorld::new(small_config(1)).await.unwrap();
        world.run_for(Duration::from_millis(20)).await;

        assert_eq!(world.node_ids().len(), 3);
        assert_eq!(world.cluster.connected_nodes().len(), 3);
        for snapshot in world.snapshots() {
            assert_eq!(snapshot.search_paths[0].as_path(), world.asset_dir());
            assert_eq!(snapshot.current, None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossfade_reaches_every_node() {
        let world = SimWorld::new(small_config(2)).await.unwrap();
        world.coordinator.load_image("a.jpg", StereoMode::Mono);
        world.settle().await;

        for snapshot in world.snapshots() {
            assert_eq!(snapshot.current, Some(SceneKind::Image));
            assert_eq!(snapshot.next, None);
        }
        let frames = world.render_all();
        assert!(frames.windows(2).all(|pair| pair[0].1 == pair[1].1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_sees_sample_assets() {
        let world = SimWorld::new(small_config(3)).await.unwrap();
        let images = world.coordinator.call_rpc("getImages", &[]).unwrap();
        let names: Vec<&str> = images
            .as_array()
            .unwrap()
            .iter()
            .map(|info| info["filename"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "dome_tb.png"]);
        assert_eq!(images[2]["stereoMode"], "top-bottom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_joining_behind_queued_load_gets_config_first() {
        let mut world = SimWorld::new(small_config(4)).await.unwrap();
        world.run_for(Duration::from_millis(20)).await;

        world.coordinator.load_image("a.jpg", StereoMode::Mono);
        let late = world.add_node();
        world.settle().await;

        for snapshot in world.snapshots() {
            assert_eq!(snapshot.current, Some(SceneKind::Image), "node {}", snapshot.id);
            assert_eq!(snapshot.message, None);
        }
        let snapshot = world.snapshot(late).unwrap();
        assert_eq!(snapshot.search_paths[0].as_path(), world.asset_dir());
        let stats = &world.node(late).unwrap().backend_stats;
        assert_eq!(stats.textures_loaded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_joining_during_barrier_follows_next_load() {
        let mut world = SimWorld::new(small_config(5)).await.unwrap();
        for id in world.node_ids() {
            world.cluster.set_ack_delay(id, Duration::from_millis(500));
        }

        world.coordinator.load_image("a.jpg", StereoMode::Mono);
        world.run_for(Duration::from_millis(100)).await;
        assert_eq!(world.cluster.stats().barriers_opened, 1);
        assert!(world.coordinator.pending_actions() > 0);

        let late = world.add_node();
        world.settle().await;

        // The barrier did not wait for the newcomer, and the newcomer never
        // saw the load it joined after
        assert_eq!(world.coordinator.stats().barriers_timed_out, 0);
        let snapshot = world.snapshot(late).unwrap();
        assert_eq!(snapshot.search_paths[0].as_path(), world.asset_dir());
        assert_eq!(snapshot.current, None);
        assert_eq!(snapshot.message, None);

        world.coordinator.load_color(0.0, 1.0, 0.0);
        world.settle().await;
        for snapshot in world.snapshots() {
            assert_eq!(snapshot.current, Some(SceneKind::Color), "node {}", snapshot.id);
        }
    }
}
