//! Renderer-side scene state machine.
//!
//! Each renderer keeps a `current` scene, at most one `next` scene and the
//! blend factor between them. Only broadcasts from the coordinator mutate
//! this state, and they are applied in arrival order.

use crate::assets::{resolve_source, AssetSource};
use crate::config::RendererConfig;
use crate::error::{CoreError, CoreResult};
use crate::pose::Orientation;
use crate::protocol::{Broadcast, StereoMode};
use crate::scene::{
    ColorScene, ImageScene, MessageScene, Rgb, Scene, SceneBackend, SceneKind, Surface, VideoScene,
};

use nalgebra::UnitQuaternion;
use panoview_env::Envelope;
use std::path::Path;
use tracing::{debug, trace, warn};

/// The double-buffered scene pair.
#[derive(Debug, Default)]
pub struct SceneSlots {
    current: Option<Scene>,
    next: Option<Scene>,
    blend_factor: f64,
}

impl SceneSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a freshly loaded scene as `next`.
    ///
    /// A `next` that is still fading in is promoted to `current` first and
    /// its fade is abandoned.
    pub fn install(&mut self, scene: Scene) {
        if let Some(pending) = self.next.take() {
            self.current = Some(pending);
        }
        self.next = Some(scene);
        self.blend_factor = 0.0;
    }

    /// Applies a `present` broadcast.
    ///
    /// A finished present with no `next` keeps the current scene.
    pub fn present(&mut self, fraction: f64, finished: bool) {
        if finished {
            if let Some(next) = self.next.take() {
                self.current = Some(next);
            }
            self.blend_factor = 0.0;
        } else {
            self.blend_factor = fraction.clamp(0.0, 1.0);
        }
    }

    /// Advances both scenes to `t_ms`.
    pub fn advance(&mut self, t_ms: u64) {
        if let Some(scene) = self.current.as_mut() {
            scene.advance(t_ms);
        }
        if let Some(scene) = self.next.as_mut() {
            scene.advance(t_ms);
        }
    }

    /// Draws `current` at full opacity, then `next` over it at the blend factor.
    pub fn render(&mut self, surface: &mut dyn Surface, rotation: &UnitQuaternion<f64>) {
        if let Some(scene) = self.current.as_mut() {
            scene.set_alpha(1.0);
            scene.render(surface, rotation);
        }
        if let Some(scene) = self.next.as_mut() {
            scene.set_alpha(self.blend_factor as f32);
            scene.render(surface, rotation);
        }
    }

    pub fn current(&self) -> Option<&Scene> {
        self.current.as_ref()
    }

    pub fn next(&self) -> Option<&Scene> {
        self.next.as_ref()
    }

    pub fn blend_factor(&self) -> f64 {
        self.blend_factor
    }

    /// Returns true before the first scene was ever presented.
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.next.is_none()
    }
}

/// One renderer node's presentation state and broadcast handling.
pub struct Renderer<B: SceneBackend> {
    backend: B,
    config: RendererConfig,
    slots: SceneSlots,
    orientation: Orientation,
    rotation: UnitQuaternion<f64>,
    clock_ms: u64,
    last_seq: Option<u64>,
}

impl<B: SceneBackend> Renderer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: RendererConfig::default(),
            slots: SceneSlots::new(),
            orientation: Orientation::default(),
            rotation: UnitQuaternion::identity(),
            clock_ms: 0,
            last_seq: None,
        }
    }

    /// Decodes and applies one envelope.
    ///
    /// Envelope timestamps advance the local copy of the coordinator clock.
    pub fn handle_envelope(&mut self, envelope: &Envelope) -> CoreResult<()> {
        if let Some(last) = self.last_seq {
            if envelope.seq > last + 1 {
                warn!("missed {} message(s) before seq {}", envelope.seq - last - 1, envelope.seq);
            }
        }
        self.last_seq = Some(envelope.seq);
        self.clock_ms = self.clock_ms.max(envelope.timestamp_ms);

        let message = Broadcast::decode(envelope)?;
        if matches!(message, Broadcast::Config(_)) {
            // A joining node's config greeting carries an older seq than
            // the broadcasts queued behind it
            self.last_seq = None;
        }
        self.handle(message);
        Ok(())
    }

    /// Applies one broadcast.
    pub fn handle(&mut self, message: Broadcast) {
        trace!(topic = message.topic(), "renderer message");
        match message {
            Broadcast::Config(config) => {
                debug!("config: {} search path(s)", config.search_paths.len());
                self.config = config;
            }
            Broadcast::LoadImage { source, stereo_mode } => {
                let scene = self.build_image(&source, stereo_mode);
                self.slots.install(scene);
            }
            Broadcast::LoadVideo {
                path,
                stereo_mode,
                framerate,
                start_timestamp_ms,
            } => {
                let scene = self.build_video(&path, stereo_mode, framerate, start_timestamp_ms);
                self.slots.install(scene);
            }
            Broadcast::LoadColor { r, g, b } => {
                self.slots.install(Scene::Color(ColorScene::new(Rgb::new(r, g, b))));
            }
            Broadcast::LoadMessage { text } => {
                self.slots.install(Scene::Message(MessageScene::new(text)));
            }
            Broadcast::Present { fraction, finished } => {
                self.slots.present(fraction, finished);
            }
            Broadcast::Pose {
                yaw,
                pitch,
                roll,
                timestamp_ms,
            } => {
                self.orientation = Orientation::new(yaw, pitch, roll);
                self.rotation = self.orientation.rotation();
                self.clock_ms = self.clock_ms.max(timestamp_ms);
            }
        }
    }

    /// Advances scenes to the coordinator clock and draws one frame.
    pub fn frame(&mut self, surface: &mut dyn Surface) {
        self.slots.advance(self.clock_ms);
        self.slots.render(surface, &self.rotation);
    }

    fn build_image(&mut self, source: &str, stereo_mode: StereoMode) -> Scene {
        let loaded = resolve_source(source, &self.config.search_paths)
            .and_then(|asset| self.backend.load_texture(&asset));
        match loaded {
            Ok(texture) => Scene::Image(ImageScene::new(texture, stereo_mode)),
            Err(err) => error_scene(short_name(source), err),
        }
    }

    fn build_video(&mut self, path: &str, stereo_mode: StereoMode, framerate: f64, start_ms: u64) -> Scene {
        let opened = resolve_source(path, &self.config.search_paths).and_then(|asset| match asset {
            AssetSource::File(file) => self.backend.open_video(&file),
            AssetSource::Inline { .. } => {
                Err(CoreError::invalid_argument("loadVideo", "inline video is not supported"))
            }
        });
        match opened {
            Ok(decoder) => Scene::Video(VideoScene::new(decoder, stereo_mode, framerate, start_ms)),
            Err(err) => error_scene(short_name(path), err),
        }
    }

    pub fn slots(&self) -> &SceneSlots {
        &self.slots
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.rotation
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Kinds of (current, next), for logs and assertions.
    pub fn scene_kinds(&self) -> (Option<SceneKind>, Option<SceneKind>) {
        (
            self.slots.current().map(Scene::kind),
            self.slots.next().map(Scene::kind),
        )
    }
}

/// Message scene shown in place of an asset that failed to load.
fn error_scene(name: &str, err: CoreError) -> Scene {
    warn!("failed to load {}: {}", name, err);
    let text = match err {
        CoreError::ResourceNotFound(_) => format!("cannot open {}", name),
        other => other.to_string(),
    };
    Scene::Message(MessageScene::new(text))
}

/// Keeps data URLs out of on-screen error messages.
fn short_name(source: &str) -> &str {
    if source.starts_with("data:") {
        "uploaded image"
    } else {
        Path::new(source)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::encode_data_url;
    use crate::scene::testing::{Draw, FakeBackend, RecordingSurface};
    use crate::scene::TextureId;
    use std::path::PathBuf;

    fn media_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("panoview-renderer-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["a.jpg", "b.jpg", "corrupt.jpg", "clip.mp4"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        dir
    }

    fn renderer() -> Renderer<FakeBackend> {
        let mut renderer = Renderer::new(FakeBackend::default());
        renderer.handle(Broadcast::Config(RendererConfig {
            search_paths: vec![media_dir()],
        }));
        renderer
    }

    fn load_image(name: &str) -> Broadcast {
        Broadcast::LoadImage {
            source: name.into(),
            stereo_mode: StereoMode::Mono,
        }
    }

    fn message_text(scene: Option<&Scene>) -> String {
        match scene {
            Some(Scene::Message(m)) => m.text(),
            other => panic!("expected message scene, got {:?}", other),
        }
    }

    #[test]
    fn test_load_then_present_cycle() {
        let mut r = renderer();
        assert!(r.slots().is_idle());

        r.handle(load_image("a.jpg"));
        assert_eq!(r.scene_kinds(), (None, Some(SceneKind::Image)));
        assert_eq!(r.slots().blend_factor(), 0.0);

        r.handle(Broadcast::Present { fraction: 0.5, finished: false });
        assert_eq!(r.slots().blend_factor(), 0.5);

        r.handle(Broadcast::Present { fraction: 1.0, finished: true });
        assert_eq!(r.scene_kinds(), (Some(SceneKind::Image), None));
        assert_eq!(r.slots().blend_factor(), 0.0);
    }

    #[test]
    fn test_new_load_promotes_pending_next() {
        let mut r = renderer();
        r.handle(load_image("a.jpg"));
        r.handle(Broadcast::Present { fraction: 0.3, finished: false });

        r.handle(Broadcast::LoadColor { r: 1.0, g: 0.0, b: 0.0 });

        // a.jpg jumped to current without finishing its fade
        assert_eq!(r.scene_kinds(), (Some(SceneKind::Image), Some(SceneKind::Color)));
        assert_eq!(r.slots().blend_factor(), 0.0);

        r.handle(Broadcast::Present { fraction: 1.0, finished: true });
        match r.slots().current() {
            Some(Scene::Color(c)) => assert_eq!(c.color(), Rgb::new(1.0, 0.0, 0.0)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(r.slots().next().is_none());
    }

    #[test]
    fn test_finished_without_next_keeps_current() {
        let mut r = renderer();
        r.handle(Broadcast::LoadMessage { text: "hi".into() });
        r.handle(Broadcast::Present { fraction: 1.0, finished: true });
        r.handle(Broadcast::Present { fraction: 1.0, finished: true });
        assert_eq!(r.scene_kinds(), (Some(SceneKind::Message), None));
    }

    #[test]
    fn test_missing_asset_degrades_to_message() {
        let mut r = renderer();
        r.handle(load_image("missing.jpg"));
        assert_eq!(message_text(r.slots().next()), "cannot open missing.jpg");
    }

    #[test]
    fn test_decode_failure_degrades_to_message() {
        let mut r = renderer();
        r.handle(load_image("corrupt.jpg"));
        assert!(message_text(r.slots().next()).contains("failed to decode"));
    }

    #[test]
    fn test_data_url_image_loads() {
        let mut r = renderer();
        r.handle(load_image(&encode_data_url("image/png", &[1, 2, 3])));
        assert_eq!(r.scene_kinds(), (None, Some(SceneKind::Image)));

        r.handle(load_image("data:image/png;base64,%%%"));
        assert!(message_text(r.slots().next()).contains("invalid data url"));
    }

    #[test]
    fn test_render_order_and_alpha() {
        let mut r = renderer();
        r.handle(load_image("a.jpg"));
        r.handle(Broadcast::Present { fraction: 1.0, finished: true });
        r.handle(load_image("b.jpg"));
        r.handle(Broadcast::Present { fraction: 0.25, finished: false });

        let mut surface = RecordingSurface::default();
        r.frame(&mut surface);

        let alphas: Vec<(TextureId, f32)> = surface
            .draws
            .iter()
            .map(|d| match d {
                Draw::Panorama { texture, alpha, .. } => (*texture, *alpha),
                other => panic!("unexpected draw {:?}", other),
            })
            .collect();
        assert_eq!(alphas, vec![(TextureId(1), 1.0), (TextureId(2), 0.25)]);
    }

    #[test]
    fn test_pose_applies_rotation_and_clock() {
        let mut r = renderer();
        r.handle(Broadcast::Pose {
            yaw: 90.0,
            pitch: 0.0,
            roll: 0.0,
            timestamp_ms: 1500,
        });
        assert_eq!(r.rotation(), Orientation::new(90.0, 0.0, 0.0).rotation());
        assert_eq!(r.clock_ms(), 1500);

        // Older timestamps never move the clock back
        r.handle(Broadcast::Pose {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            timestamp_ms: 1000,
        });
        assert_eq!(r.clock_ms(), 1500);
    }

    #[test]
    fn test_video_follows_coordinator_clock() {
        let mut r = renderer();
        r.handle(Broadcast::LoadVideo {
            path: "clip.mp4".into(),
            stereo_mode: StereoMode::Mono,
            framerate: 30.0,
            start_timestamp_ms: 1000,
        });
        r.handle(Broadcast::Pose {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            timestamp_ms: 2000,
        });

        let mut surface = RecordingSurface::default();
        r.frame(&mut surface);

        match r.slots().next() {
            Some(Scene::Video(v)) => assert_eq!(v.frame_index(), 30),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_handle_envelope_rejects_garbage() {
        let mut r = renderer();
        let envelope = Envelope::new(0, b"{}".to_vec(), 10);
        assert!(r.handle_envelope(&envelope).is_err());
        // Clock still advanced from the envelope header
        assert_eq!(r.clock_ms(), 10);
    }

    #[test]
    fn test_greeting_config_then_queued_load() {
        let dir = media_dir();
        let mut r = Renderer::new(FakeBackend::default());
        let greeting = Broadcast::Config(RendererConfig {
            search_paths: vec![dir.clone()],
        });
        r.handle_envelope(&greeting.encode(3, 0).unwrap()).unwrap();
        r.handle_envelope(&load_image("a.jpg").encode(412, 4_120).unwrap()).unwrap();

        assert_eq!(r.config().search_paths, vec![dir]);
        assert!(matches!(r.slots().next(), Some(Scene::Image(_))));
        // Gap accounting restarts after the greeting
        assert_eq!(r.last_seq, Some(412));
    }
}
