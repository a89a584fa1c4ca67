//! Headless render backend for simulated renderers.
//!
//! Nothing is decoded or drawn. Loads succeed for any resolvable asset whose
//! name does not contain `corrupt`, and frames are recorded as a list of
//! draw calls so nodes can be compared with each other.

use panoview_core::scene::{MessageLine, Rgb, SceneBackend, Surface, TextureId, VideoDecoder};
use panoview_core::{AssetSource, CoreError, CoreResult, StereoMode};
use nalgebra::UnitQuaternion;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One recorded draw.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Panorama {
        texture: TextureId,
        stereo_mode: StereoMode,
        alpha: f32,
        rotation: UnitQuaternion<f64>,
    },
    Color {
        color: Rgb,
        alpha: f32,
        rotation: UnitQuaternion<f64>,
    },
    Message {
        text: String,
        alpha: f32,
    },
}

/// Surface that records every draw of a frame.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    pub calls: Vec<DrawCall>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_calls(self) -> Vec<DrawCall> {
        self.calls
    }
}

impl Surface for FrameRecorder {
    fn draw_panorama(
        &mut self,
        texture: TextureId,
        stereo_mode: StereoMode,
        alpha: f32,
        rotation: &UnitQuaternion<f64>,
    ) {
        self.calls.push(DrawCall::Panorama {
            texture,
            stereo_mode,
            alpha,
            rotation: *rotation,
        });
    }

    fn fill_color(&mut self, color: Rgb, alpha: f32, rotation: &UnitQuaternion<f64>) {
        self.calls.push(DrawCall::Color {
            color,
            alpha,
            rotation: *rotation,
        });
    }

    fn draw_message(&mut self, lines: &[MessageLine], alpha: f32) {
        let text = lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.calls.push(DrawCall::Message { text, alpha });
    }
}

/// Load counters shared between a backend and the world that owns it.
#[derive(Debug, Default)]
pub struct BackendStats {
    pub textures_loaded: AtomicU64,
    pub videos_opened: AtomicU64,
    pub frames_decoded: Arc<AtomicU64>,
    pub failures: AtomicU64,
}

/// Backend that hands out sequential texture ids.
#[derive(Debug, Default)]
pub struct SimSceneBackend {
    next_texture: u64,
    stats: Arc<BackendStats>,
}

impl SimSceneBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<BackendStats> {
        Arc::clone(&self.stats)
    }

    fn allocate(&mut self) -> TextureId {
        self.next_texture += 1;
        TextureId(self.next_texture)
    }

    fn check(&self, name: &str) -> CoreResult<()> {
        if name.contains("corrupt") {
            self.stats.failures.fetch_add(1, Ordering::SeqCst);
            return Err(CoreError::Decode {
                path: name.to_string(),
                reason: "simulated decode failure".into(),
            });
        }
        Ok(())
    }
}

impl SceneBackend for SimSceneBackend {
    fn load_texture(&mut self, source: &AssetSource) -> CoreResult<TextureId> {
        self.check(&source.describe())?;
        self.stats.textures_loaded.fetch_add(1, Ordering::SeqCst);
        Ok(self.allocate())
    }

    fn open_video(&mut self, path: &Path) -> CoreResult<Box<dyn VideoDecoder>> {
        self.check(&path.to_string_lossy())?;
        self.stats.videos_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimVideoDecoder {
            texture: self.allocate(),
            position: 0,
            frames_decoded: Arc::clone(&self.stats.frames_decoded),
        }))
    }
}

/// Decoder that only counts frames.
#[derive(Debug)]
pub struct SimVideoDecoder {
    texture: TextureId,
    position: u64,
    frames_decoded: Arc<AtomicU64>,
}

impl VideoDecoder for SimVideoDecoder {
    fn seek_start(&mut self) {
        self.position = 0;
    }

    fn next_frame(&mut self) {
        self.position += 1;
        self.frames_decoded.fetch_add(1, Ordering::SeqCst);
    }

    fn upload(&mut self) {}

    fn texture(&self) -> TextureId {
        self.texture
    }
}
