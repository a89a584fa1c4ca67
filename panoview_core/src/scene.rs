//! Scene variants and the seams to the rendering backend.
//!
//! A scene exposes three operations: `set_alpha`, `render` and `advance`.
//! The variants are a closed set, so they live in one enum and dispatch by
//! `match`. Actual GPU work (texture upload, sphere drawing, text layout) is
//! behind the [`SceneBackend`], [`VideoDecoder`] and [`Surface`] traits.

use crate::assets::AssetSource;
use crate::error::CoreResult;
use crate::protocol::StereoMode;
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Backend handle for an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// Linear RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// One line of a message scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLine {
    pub text: String,
    /// RGBA, components in `0.0..=1.0`
    pub color: [f32; 4],
    pub font_size: f32,
}

impl MessageLine {
    pub const DEFAULT_FONT_SIZE: f32 = 24.0;

    /// White text at the default size.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: [1.0, 1.0, 1.0, 1.0],
            font_size: Self::DEFAULT_FONT_SIZE,
        }
    }
}

/// Draw target for one frame. Implemented by the graphics layer.
///
/// Calls arrive back to front; the implementation composites each draw
/// over what is already there (premultiplied "over", not additive).
pub trait Surface {
    /// Draws an equirectangular texture on the view sphere.
    fn draw_panorama(
        &mut self,
        texture: TextureId,
        stereo_mode: StereoMode,
        alpha: f32,
        rotation: &UnitQuaternion<f64>,
    );

    /// Fills the view sphere with a flat color.
    fn fill_color(&mut self, color: Rgb, alpha: f32, rotation: &UnitQuaternion<f64>);

    /// Draws a text panel that always faces the viewer.
    fn draw_message(&mut self, lines: &[MessageLine], alpha: f32);
}

/// Decoding side of the graphics layer.
pub trait SceneBackend: Send {
    /// Decodes an image and uploads it as a texture.
    fn load_texture(&mut self, source: &AssetSource) -> CoreResult<TextureId>;

    /// Opens a video stream.
    fn open_video(&mut self, path: &Path) -> CoreResult<Box<dyn VideoDecoder>>;
}

/// A video stream owned by a video scene.
pub trait VideoDecoder: Send {
    /// Rewinds to the first frame.
    fn seek_start(&mut self);

    /// Decodes the next frame into the staging buffer.
    fn next_frame(&mut self);

    /// Copies the staged frame into the texture.
    fn upload(&mut self);

    /// Texture the decoder uploads into.
    fn texture(&self) -> TextureId;
}

/// Scene variant discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKind {
    Image,
    Video,
    Color,
    Message,
}

impl std::fmt::Display for SceneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SceneKind::Image => "image",
            SceneKind::Video => "video",
            SceneKind::Color => "color",
            SceneKind::Message => "message",
        };
        write!(f, "{}", name)
    }
}

/// Static panorama.
#[derive(Debug)]
pub struct ImageScene {
    texture: TextureId,
    stereo_mode: StereoMode,
    alpha: f32,
}

impl ImageScene {
    pub fn new(texture: TextureId, stereo_mode: StereoMode) -> Self {
        Self {
            texture,
            stereo_mode,
            alpha: 1.0,
        }
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }
}

/// Panorama video clocked by coordinator timestamps.
pub struct VideoScene {
    decoder: Box<dyn VideoDecoder>,
    stereo_mode: StereoMode,
    framerate: f64,
    start_ms: u64,
    frame_index: u64,
    alpha: f32,
}

impl VideoScene {
    /// Wraps a decoder and shows its first frame.
    ///
    /// After construction `frame_index` is 1 and the first frame is uploaded.
    pub fn new(
        decoder: Box<dyn VideoDecoder>,
        stereo_mode: StereoMode,
        framerate: f64,
        start_ms: u64,
    ) -> Self {
        let mut scene = Self {
            decoder,
            stereo_mode,
            framerate,
            start_ms,
            frame_index: 0,
            alpha: 1.0,
        };
        scene.start(start_ms);
        scene
    }

    /// Restarts playback with `t_ms` as the first frame's time.
    pub fn start(&mut self, t_ms: u64) {
        self.start_ms = t_ms;
        self.frame_index = 1;
        self.decoder.seek_start();
        self.decoder.next_frame();
        self.decoder.upload();
    }

    /// Frame position implied by `t_ms` (fractional).
    pub fn frame_desired(&self, t_ms: u64) -> f64 {
        t_ms.saturating_sub(self.start_ms) as f64 * self.framerate / 1000.0
    }

    /// Steps forward one frame at a time until caught up with `t_ms`.
    ///
    /// Never seeks and never moves backwards. Uploads once if anything
    /// changed.
    pub fn advance(&mut self, t_ms: u64) {
        let desired = self.frame_desired(t_ms);
        let mut changed = false;
        while (self.frame_index as f64) < desired {
            self.decoder.next_frame();
            self.frame_index += 1;
            changed = true;
        }
        if changed {
            self.decoder.upload();
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn framerate(&self) -> f64 {
        self.framerate
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }
}

impl std::fmt::Debug for VideoScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoScene")
            .field("stereo_mode", &self.stereo_mode)
            .field("framerate", &self.framerate)
            .field("start_ms", &self.start_ms)
            .field("frame_index", &self.frame_index)
            .field("alpha", &self.alpha)
            .finish()
    }
}

/// Flat color fill.
#[derive(Debug)]
pub struct ColorScene {
    color: Rgb,
    alpha: f32,
}

impl ColorScene {
    pub fn new(color: Rgb) -> Self {
        Self { color, alpha: 1.0 }
    }

    pub fn color(&self) -> Rgb {
        self.color
    }
}

/// Screen-locked text on a black backdrop.
#[derive(Debug)]
pub struct MessageScene {
    lines: Vec<MessageLine>,
    alpha: f32,
}

impl MessageScene {
    /// Plain white text, one line per `\n`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::with_lines(text.split('\n').map(MessageLine::plain).collect())
    }

    pub fn with_lines(lines: Vec<MessageLine>) -> Self {
        Self { lines, alpha: 1.0 }
    }

    pub fn lines(&self) -> &[MessageLine] {
        &self.lines
    }

    /// Joined text of every line.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A drawable scene.
#[derive(Debug)]
pub enum Scene {
    Image(ImageScene),
    Video(VideoScene),
    Color(ColorScene),
    Message(MessageScene),
}

impl Scene {
    pub fn kind(&self) -> SceneKind {
        match self {
            Scene::Image(_) => SceneKind::Image,
            Scene::Video(_) => SceneKind::Video,
            Scene::Color(_) => SceneKind::Color,
            Scene::Message(_) => SceneKind::Message,
        }
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        match self {
            Scene::Image(s) => s.alpha = alpha,
            Scene::Video(s) => s.alpha = alpha,
            Scene::Color(s) => s.alpha = alpha,
            Scene::Message(s) => s.alpha = alpha,
        }
    }

    pub fn alpha(&self) -> f32 {
        match self {
            Scene::Image(s) => s.alpha,
            Scene::Video(s) => s.alpha,
            Scene::Color(s) => s.alpha,
            Scene::Message(s) => s.alpha,
        }
    }

    /// False for scenes that stay fixed in front of the viewer.
    pub fn follows_pose(&self) -> bool {
        !matches!(self, Scene::Message(_))
    }

    /// Moves time-dependent scenes to `t_ms` on the coordinator clock.
    pub fn advance(&mut self, t_ms: u64) {
        if let Scene::Video(video) = self {
            video.advance(t_ms);
        }
    }

    /// Issues this scene's draw calls.
    pub fn render(&self, surface: &mut dyn Surface, rotation: &UnitQuaternion<f64>) {
        match self {
            Scene::Image(s) => surface.draw_panorama(s.texture, s.stereo_mode, s.alpha, rotation),
            Scene::Video(s) => {
                surface.draw_panorama(s.decoder.texture(), s.stereo_mode, s.alpha, rotation)
            }
            Scene::Color(s) => surface.fill_color(s.color, s.alpha, rotation),
            Scene::Message(s) => {
                let fixed = UnitQuaternion::identity();
                surface.fill_color(Rgb::BLACK, s.alpha, &fixed);
                surface.draw_message(&s.lines, s.alpha);
            }
        }
    }
}
