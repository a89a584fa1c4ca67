//! Logical message contract between the coordinator and renderer nodes.
//!
//! Every message travels inside a `panoview_env::Envelope`. The payload is
//! the JSON encoding of a [`Broadcast`], tagged by its topic name, so a
//! message reads on the wire as e.g.
//! `{"topic":"present","fraction":0.5,"finished":false}`.

use crate::config::RendererConfig;
use crate::error::{CoreError, CoreResult};
use panoview_env::Envelope;
use serde::{Deserialize, Serialize};

/// How a panorama texture packs the two eyes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StereoMode {
    /// One image for both eyes
    #[default]
    Mono,
    /// Left eye in the top half
    TopBottom,
    /// Left eye in the bottom half
    BottomTop,
}

impl StereoMode {
    /// Returns the wire name.
    pub fn name(&self) -> &'static str {
        match self {
            StereoMode::Mono => "mono",
            StereoMode::TopBottom => "top-bottom",
            StereoMode::BottomTop => "bottom-top",
        }
    }
}

impl std::fmt::Display for StereoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for StereoMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mono" => Ok(StereoMode::Mono),
            "top-bottom" | "topbottom" => Ok(StereoMode::TopBottom),
            "bottom-top" | "bottomtop" => Ok(StereoMode::BottomTop),
            other => Err(CoreError::invalid_argument(
                "stereoMode",
                format!("unknown stereo mode '{}'", other),
            )),
        }
    }
}

/// A message broadcast by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Broadcast {
    /// Renderer configuration document
    Config(RendererConfig),

    /// Load a panorama image from a path or a `data:` URL
    LoadImage {
        source: String,
        stereo_mode: StereoMode,
    },

    /// Load a panorama video whose playback clock starts at `start_timestamp_ms`
    LoadVideo {
        path: String,
        stereo_mode: StereoMode,
        framerate: f64,
        start_timestamp_ms: u64,
    },

    /// Fill the view with a flat color (components in `0.0..=1.0`)
    LoadColor { r: f32, g: f32, b: f32 },

    /// Show a screen-locked text message
    LoadMessage { text: String },

    /// Crossfade progress; `finished` is sent once, at fraction 1
    Present { fraction: f64, finished: bool },

    /// Shared orientation in degrees, stamped with the coordinator clock
    Pose {
        yaw: f64,
        pitch: f64,
        roll: f64,
        timestamp_ms: u64,
    },
}

impl Broadcast {
    /// Returns the topic name.
    pub fn topic(&self) -> &'static str {
        match self {
            Broadcast::Config(_) => "config",
            Broadcast::LoadImage { .. } => "loadImage",
            Broadcast::LoadVideo { .. } => "loadVideo",
            Broadcast::LoadColor { .. } => "loadColor",
            Broadcast::LoadMessage { .. } => "loadMessage",
            Broadcast::Present { .. } => "present",
            Broadcast::Pose { .. } => "pose",
        }
    }

    /// Returns true for the scene-load topics.
    pub fn is_scene_load(&self) -> bool {
        matches!(
            self,
            Broadcast::LoadImage { .. }
                | Broadcast::LoadVideo { .. }
                | Broadcast::LoadColor { .. }
                | Broadcast::LoadMessage { .. }
        )
    }

    /// Wraps the message in an envelope.
    pub fn encode(&self, seq: u64, timestamp_ms: u64) -> CoreResult<Envelope> {
        let payload = serde_json::to_vec(self).map_err(CoreError::protocol)?;
        Ok(Envelope::new(seq, payload, timestamp_ms))
    }

    /// Extracts a message from an envelope.
    pub fn decode(envelope: &Envelope) -> CoreResult<Self> {
        serde_json::from_slice(&envelope.payload).map_err(CoreError::protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_mode_wire_names() {
        assert_eq!(serde_json::to_string(&StereoMode::TopBottom).unwrap(), "\"top-bottom\"");
        assert_eq!("bottom-top".parse::<StereoMode>().unwrap(), StereoMode::BottomTop);
        assert!("side-by-side".parse::<StereoMode>().is_err());
        assert_eq!(StereoMode::default(), StereoMode::Mono);
    }

    #[test]
    fn test_broadcast_is_tagged_by_topic() {
        let message = Broadcast::Present {
            fraction: 0.25,
            finished: false,
        };
        let value: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["topic"], "present");
        assert_eq!(value["fraction"], 0.25);

        let video = Broadcast::LoadVideo {
            path: "dome.mp4".into(),
            stereo_mode: StereoMode::Mono,
            framerate: 30.0,
            start_timestamp_ms: 1200,
        };
        let value = serde_json::to_value(&video).unwrap();
        assert_eq!(value["topic"], "loadVideo");
        assert_eq!(value["startTimestampMs"], 1200);
        assert_eq!(video.topic(), "loadVideo");
    }

    #[test]
    fn test_envelope_carries_message() {
        let message = Broadcast::LoadColor { r: 1.0, g: 0.0, b: 0.0 };
        let envelope = message.encode(4, 99).unwrap();
        assert_eq!(envelope.seq, 4);
        assert_eq!(envelope.timestamp_ms, 99);
        assert_eq!(Broadcast::decode(&envelope).unwrap(), message);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let envelope = Envelope::new(0, b"not json".to_vec(), 0);
        assert!(matches!(Broadcast::decode(&envelope), Err(CoreError::Protocol(_))));
    }

    #[test]
    fn test_scene_load_classification() {
        assert!(Broadcast::LoadMessage { text: "hi".into() }.is_scene_load());
        assert!(!Broadcast::Present { fraction: 1.0, finished: true }.is_scene_load());
    }
}
