//! Scenario runner - executes cluster scenarios on a paused-time runtime.

use crate::backend::DrawCall;
use crate::error::SimError;
use crate::network::WireEvent;
use crate::scenarios::ScenarioId;
use crate::world::{NodeSnapshot, SimConfig, SimWorld, SETTLE_TIME};

use panoview_core::scene::SceneKind;
use panoview_core::{Axis, Broadcast, CoordinatorConfig, Orientation, PoseCommand, StereoMode};
use panoview_env::{ClusterContext, NodeId};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

type Check = Result<(), String>;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Broadcasts sent by the coordinator
    pub broadcasts: u64,

    /// Envelopes handed to node inboxes
    pub envelopes_delivered: u64,

    pub barriers_opened: u64,
    pub barriers_completed: u64,
    pub barriers_timed_out: u64,
    pub present_cycles: u64,

    /// Acknowledgements dropped by fault injection
    pub acks_dropped: u64,

    /// Nodes connected at the end
    pub nodes: usize,
}

/// Runs cluster scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Number of renderer nodes
    num_nodes: usize,

    /// Upper bound of simulated decode time per node
    max_ack_delay_ms: u64,

    /// Coordinator settings
    coordinator: CoordinatorConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_nodes: usize) -> Self {
        Self {
            seed,
            num_nodes,
            max_ack_delay_ms: 200,
            coordinator: CoordinatorConfig::default(),
        }
    }

    /// Sets the coordinator configuration.
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.coordinator = config;
        self
    }

    /// Sets the upper bound of simulated decode time.
    pub fn with_ack_delay(mut self, max_ack_delay_ms: u64) -> Self {
        self.max_ack_delay_ms = max_ack_delay_ms;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build();
        match runtime {
            Ok(runtime) => runtime.block_on(self.run_in_world(scenario)),
            Err(e) => self.failed(scenario, SimError::Runtime(e.to_string())),
        }
    }

    async fn run_in_world(&self, scenario: ScenarioId) -> ScenarioResult {
        let config = SimConfig {
            seed: self.seed,
            num_nodes: self.num_nodes,
            max_ack_delay_ms: self.max_ack_delay_ms,
            coordinator: self.coordinator.clone(),
        };
        let mut world = match SimWorld::new(config).await {
            Ok(world) => world,
            Err(e) => return self.failed(scenario, e),
        };

        let outcome = match scenario {
            ScenarioId::Crossfade => crossfade(&mut world).await,
            ScenarioId::BackToBack => back_to_back(&mut world).await,
            ScenarioId::LateJoin => late_join(&mut world).await,
            ScenarioId::SilentNode => silent_node(&mut world).await,
            ScenarioId::Dropout => dropout(&mut world).await,
            ScenarioId::PoseDrift => pose_drift(&mut world).await,
            ScenarioId::VideoSync => video_sync(&mut world).await,
            ScenarioId::MissingAsset => missing_asset(&mut world).await,
            ScenarioId::ControlPlane => control_plane(&mut world).await,
        };

        let metrics = collect_metrics(&world).await;
        debug!("{} metrics: {:?}", scenario, metrics);
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: outcome.is_ok(),
            final_time_secs: world.time_secs(),
            failure_reason: outcome.err(),
            metrics,
        }
    }

    /// Result for a run that never reached its scenario body.
    fn failed(&self, scenario: ScenarioId, error: SimError) -> ScenarioResult {
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            final_time_secs: 0.0,
            failure_reason: Some(error.to_string()),
            metrics: ScenarioMetrics::default(),
        }
    }
}

async fn collect_metrics(world: &SimWorld) -> ScenarioMetrics {
    let coordinator = world.coordinator.stats();
    let cluster = world.cluster.stats();
    ScenarioMetrics {
        broadcasts: world.coordinator.broadcasts_sent().await,
        envelopes_delivered: cluster.envelopes_delivered,
        barriers_opened: cluster.barriers_opened,
        barriers_completed: coordinator.barriers_completed,
        barriers_timed_out: coordinator.barriers_timed_out,
        present_cycles: coordinator.present_cycles,
        acks_dropped: cluster.acks_dropped,
        nodes: world.node_ids().len(),
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Check {
    if condition {
        Ok(())
    } else {
        Err(message())
    }
}

/// Every node satisfies `pred`.
fn all_nodes(world: &SimWorld, what: &str, pred: impl Fn(&NodeSnapshot) -> bool) -> Check {
    let snapshots = world.snapshots();
    ensure(!snapshots.is_empty(), || "no nodes left".to_string())?;
    for snapshot in &snapshots {
        ensure(pred(snapshot), || {
            format!("node {} fails '{}': {:?}", snapshot.id, what, snapshot)
        })?;
    }
    Ok(())
}

/// Every node shows `kind` with nothing pending.
fn all_showing(world: &SimWorld, kind: SceneKind) -> Check {
    all_nodes(world, &format!("shows {}", kind), |s| {
        s.current == Some(kind) && s.next.is_none()
    })
}

/// Every node renders exactly the same draw calls.
fn identical_frames(world: &SimWorld) -> Check {
    let frames: Vec<(NodeId, Vec<DrawCall>)> = world.render_all();
    let Some((first_id, first)) = frames.first() else {
        return Err("no nodes to render".to_string());
    };
    for (id, calls) in &frames[1..] {
        ensure(calls == first, || {
            format!("node {} draws {:?}, node {} draws {:?}", id, calls, first_id, first)
        })?;
    }
    Ok(())
}

/// Scene traffic reduced to load topics, barriers and finished presents.
fn milestones(world: &SimWorld) -> Vec<&'static str> {
    world
        .cluster
        .scene_traffic()
        .iter()
        .filter_map(|event| match event {
            WireEvent::Broadcast(Broadcast::Present { finished: true, .. }) => Some("presented"),
            WireEvent::Broadcast(Broadcast::Present { .. }) => None,
            WireEvent::Broadcast(Broadcast::Config(_)) | WireEvent::Greeting(..) => None,
            other => Some(other.topic()),
        })
        .collect()
}

/// Present fractions in send order.
fn present_steps(world: &SimWorld) -> Vec<(f64, bool)> {
    world
        .cluster
        .scene_traffic()
        .iter()
        .filter_map(|event| match event {
            WireEvent::Broadcast(Broadcast::Present { fraction, finished }) => Some((*fraction, *finished)),
            _ => None,
        })
        .collect()
}

fn check_present_cycles(world: &SimWorld, cycles: usize) -> Check {
    let steps = present_steps(world);
    ensure(
        steps.iter().all(|(f, _)| (0.0..=1.0).contains(f)),
        || "present fraction outside [0, 1]".to_string(),
    )?;
    let finished = steps.iter().filter(|(_, done)| *done).count();
    ensure(finished == cycles, || {
        format!("{} finished presents, expected {}", finished, cycles)
    })?;
    // Within each cycle fractions never go down
    let mut last = 0.0;
    for (fraction, done) in steps {
        ensure(fraction >= last, || format!("fraction fell from {} to {}", last, fraction))?;
        last = if done { 0.0 } else { fraction };
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// SIM-001
async fn crossfade(world: &mut SimWorld) -> Check {
    world.coordinator.load_image("a.jpg", StereoMode::Mono);
    world.settle().await;

    ensure(milestones(world) == ["loadImage", "barrier", "presented"], || {
        format!("unexpected traffic {:?}", milestones(world))
    })?;
    check_present_cycles(world, 1)?;
    all_showing(world, SceneKind::Image)?;
    all_nodes(world, "blend reset", |s| s.blend_factor == 0.0)?;
    identical_frames(world)
}

/// SIM-002
async fn back_to_back(world: &mut SimWorld) -> Check {
    world.coordinator.load_image("a.jpg", StereoMode::Mono);
    world.coordinator.load_color(1.0, 0.0, 0.0);
    world.coordinator.load_message("intermission");
    world.coordinator.load_image("dome_tb.png", StereoMode::TopBottom);
    world.settle().await;

    let expected = [
        "loadImage",
        "barrier",
        "presented",
        "loadColor",
        "presented",
        "loadMessage",
        "presented",
        "loadImage",
        "barrier",
        "presented",
    ];
    ensure(milestones(world) == expected, || {
        format!("unexpected order {:?}", milestones(world))
    })?;
    check_present_cycles(world, 4)?;
    all_showing(world, SceneKind::Image)?;

    let stats = world.coordinator.stats();
    ensure(stats.barriers_completed == 2, || format!("{:?}", stats))?;
    identical_frames(world)
}

/// SIM-003
async fn late_join(world: &mut SimWorld) -> Check {
    world.coordinator.load_image("a.jpg", StereoMode::Mono);
    world.settle().await;

    // Joins an idle cluster
    let late = world.add_node();
    world.run_for(SETTLE_TIME).await;
    check_greeted(world, late)?;
    let snapshot = world
        .snapshot(late)
        .ok_or_else(|| "late node vanished".to_string())?;
    ensure(snapshot.current.is_none(), || "late node replayed old scenes".to_string())?;

    // Joins while a load is still queued
    world.coordinator.load_image("b.jpg", StereoMode::Mono);
    let queued = world.add_node();
    world.settle().await;
    check_greeted(world, queued)?;
    // Texture ids differ between nodes that loaded different histories
    all_showing(world, SceneKind::Image)?;

    world.coordinator.load_color(0.0, 0.0, 1.0);
    world.settle().await;
    all_showing(world, SceneKind::Color)
}

/// The node got its config greeting and resolves assets from the world's
/// asset directory.
fn check_greeted(world: &SimWorld, id: NodeId) -> Check {
    let greeted = world.cluster.wire_log().iter().any(|event| {
        matches!(event, WireEvent::Greeting(node, Broadcast::Config(_)) if *node == id)
    });
    ensure(greeted, || format!("node {} never got the config", id))?;
    let snapshot = world
        .snapshot(id)
        .ok_or_else(|| format!("node {} vanished", id))?;
    ensure(snapshot.search_paths.first().map(|p| p.as_path()) == Some(world.asset_dir()), || {
        format!("node {} search paths {:?}", id, snapshot.search_paths)
    })?;
    ensure(snapshot.message.is_none(), || {
        format!("node {} shows {:?}", id, snapshot.message)
    })
}

/// SIM-004
async fn silent_node(world: &mut SimWorld) -> Check {
    let mute = *world
        .node_ids()
        .first()
        .ok_or_else(|| "no nodes".to_string())?;
    world.cluster.silence(mute, true);

    let started = world.context.now();
    world.coordinator.load_image("a.jpg", StereoMode::Mono);
    world.settle().await;
    let elapsed = world.context.now() - started;

    let stats = world.coordinator.stats();
    ensure(stats.barriers_timed_out == 1 && stats.present_cycles == 1, || {
        format!("{:?}", stats)
    })?;
    let timeout = world.config.coordinator.barrier_timeout();
    ensure(elapsed >= timeout, || {
        format!("finished after {:?}, before the {:?} timeout", elapsed, timeout)
    })?;
    ensure(world.cluster.stats().acks_dropped >= 1, || "no ack was dropped".to_string())?;
    // The mute node still receives and applies broadcasts
    all_showing(world, SceneKind::Image)
}

/// SIM-005
async fn dropout(world: &mut SimWorld) -> Check {
    let slow = *world
        .node_ids()
        .first()
        .ok_or_else(|| "no nodes".to_string())?;
    let stall = world.config.coordinator.barrier_timeout() / 2;
    world.cluster.set_ack_delay(slow, stall);

    let started = world.context.now();
    world.coordinator.load_image("a.jpg", StereoMode::Mono);
    world.run_for(Duration::from_millis(500)).await;
    world.remove_node(slow);
    world.settle().await;
    let elapsed = world.context.now() - started;

    let stats = world.coordinator.stats();
    ensure(stats.barriers_completed == 1 && stats.barriers_timed_out == 0, || {
        format!("{:?}", stats)
    })?;
    ensure(elapsed < stall, || {
        format!("barrier waited {:?} for a departed node", elapsed)
    })?;
    all_showing(world, SceneKind::Image)
}

/// SIM-006
async fn pose_drift(world: &mut SimWorld) -> Check {
    let coordinator = &world.coordinator;
    coordinator.apply_pose(PoseCommand::Level(Axis::Yaw, 10.0));
    coordinator.apply_pose(PoseCommand::Level(Axis::Pitch, -2.0));
    coordinator.load_image("a.jpg", StereoMode::Mono);

    world.run_for(Duration::from_secs(2)).await;
    coordinator.apply_pose(PoseCommand::Level(Axis::Yaw, 0.0));
    coordinator.apply_pose(PoseCommand::Level(Axis::Pitch, 0.0));
    world.settle().await;

    let poses = world
        .cluster
        .wire_log()
        .iter()
        .filter(|event| matches!(event, WireEvent::Broadcast(Broadcast::Pose { .. })))
        .count();
    ensure(poses >= 150, || format!("only {} pose broadcasts in 2s", poses))?;

    let expected = coordinator.orientation();
    ensure((expected.yaw - 20.0).abs() < 0.5, || format!("yaw {}", expected.yaw))?;
    ensure((expected.pitch + 4.0).abs() < 0.5, || format!("pitch {}", expected.pitch))?;

    let rotation = Orientation::new(expected.yaw, expected.pitch, expected.roll).rotation();
    all_nodes(world, "matches coordinator pose", |s| {
        s.orientation == expected && s.rotation == rotation
    })?;
    identical_frames(world)?;

    world.coordinator.apply_pose(PoseCommand::Reset(Axis::Yaw));
    world.settle().await;
    all_nodes(world, "yaw reset", |s| s.orientation.yaw == 0.0)
}

/// SIM-007
async fn video_sync(world: &mut SimWorld) -> Check {
    world.coordinator.load_video("clip.mp4", StereoMode::Mono, 30.0);
    world.settle().await;
    world.run_for(Duration::from_secs(1)).await;
    world.freeze().await;

    // Rendering advances the video to the node clock
    identical_frames(world)?;
    all_showing(world, SceneKind::Video)?;

    let start = world
        .cluster
        .wire_log()
        .iter()
        .find_map(|event| match event {
            WireEvent::Broadcast(Broadcast::LoadVideo {
                start_timestamp_ms, ..
            }) => Some(*start_timestamp_ms),
            _ => None,
        })
        .ok_or_else(|| "loadVideo never broadcast".to_string())?;

    let snapshots = world.snapshots();
    let first = snapshots.first().ok_or_else(|| "no nodes".to_string())?;
    for s in &snapshots {
        let frame = s.video_frame.unwrap_or(0);
        let floor = (s.clock_ms.saturating_sub(start) as f64 * 30.0 / 1000.0).floor() as u64;
        ensure(frame >= floor, || {
            format!("node {} at frame {} behind {} (clock {})", s.id, frame, floor, s.clock_ms)
        })?;
        ensure(s.video_frame == first.video_frame && s.clock_ms == first.clock_ms, || {
            format!("node {} diverged: {:?} vs {:?}", s.id, s, first)
        })?;
    }
    ensure(first.video_frame.unwrap_or(0) > 30, || {
        format!("video barely moved: {:?}", first.video_frame)
    })
}

/// SIM-008
async fn missing_asset(world: &mut SimWorld) -> Check {
    world.coordinator.load_image("nope.jpg", StereoMode::Mono);
    world.settle().await;
    all_nodes(world, "missing file message", |s| {
        s.message.as_deref() == Some("cannot open nope.jpg")
    })?;

    world.coordinator.load_image("corrupt.jpg", StereoMode::Mono);
    world.settle().await;
    all_nodes(world, "decode failure message", |s| {
        s.message.as_deref().map_or(false, |m| m.contains("decode"))
    })?;

    // A good load afterwards recovers
    world.coordinator.load_image("b.jpg", StereoMode::Mono);
    world.settle().await;
    all_showing(world, SceneKind::Image)?;
    check_present_cycles(world, 3)
}

/// SIM-009
async fn control_plane(world: &mut SimWorld) -> Check {
    let coordinator = &world.coordinator;
    coordinator
        .handle_message("loadImage", &[json!("dome_tb.png"), json!("top-bottom")])
        .map_err(|e| e.to_string())?;
    coordinator
        .handle_message("pose", &[json!("level"), json!("roll"), json!(5)])
        .map_err(|e| e.to_string())?;
    ensure(coordinator.handle_message("loadColor", &[json!("red")]).is_err(), || {
        "malformed loadColor accepted".to_string()
    })?;
    world.settle().await;

    all_showing(world, SceneKind::Image)?;
    all_nodes(world, "rolling", |s| s.orientation.roll > 0.0)?;

    let images = coordinator.call_rpc("getImages", &[]).map_err(|e| e.to_string())?;
    ensure(images.as_array().map(Vec::len) == Some(3), || format!("getImages -> {}", images))?;
    let videos = coordinator.call_rpc("getVideos", &[]).map_err(|e| e.to_string())?;
    ensure(videos[0]["filename"] == "clip.mp4" && videos[0]["framerate"] == 30.0, || {
        format!("getVideos -> {}", videos)
    })?;
    let thumbnail = coordinator
        .call_rpc("getThumbnail", &[json!("missing.jpg")])
        .map_err(|e| e.to_string())?;
    ensure(thumbnail == Value::Null, || format!("getThumbnail -> {}", thumbnail))?;

    coordinator
        .handle_message("loadMessage", &[json!("hello\nworld")])
        .map_err(|e| e.to_string())?;
    world.settle().await;
    all_nodes(world, "two-line message", |s| {
        s.message.as_deref() == Some("hello\nworld")
    })
}
