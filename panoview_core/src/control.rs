//! Inbound control-plane messages from the operator UI.
//!
//! The UI sends `(topic, args...)` with positional JSON arguments, for
//! example `("pose", "level", "yaw", 5)` or `("loadImage", "dir/a.jpg", "mono")`.

use crate::error::{CoreError, CoreResult};
use crate::manifest::DEFAULT_FRAMERATE;
use crate::pose::{Axis, PoseCommand};
use crate::protocol::StereoMode;
use crate::rpc::{number_arg, string_arg};
use serde_json::Value;

/// A parsed operator request.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    LoadImage {
        source: String,
        stereo_mode: StereoMode,
    },
    LoadVideo {
        path: String,
        stereo_mode: StereoMode,
        framerate: f64,
    },
    LoadColor {
        r: f32,
        g: f32,
        b: f32,
    },
    LoadMessage {
        text: String,
    },
    Pose(PoseCommand),
}

impl ControlMessage {
    /// Parses one inbound message.
    ///
    /// A missing stereo mode means mono and a missing framerate means the
    /// default of 30. Color components must lie in `0.0..=1.0`.
    pub fn parse(topic: &str, args: &[Value]) -> CoreResult<Self> {
        match topic {
            "loadImage" => Ok(ControlMessage::LoadImage {
                source: string_arg(topic, args, 0)?.to_string(),
                stereo_mode: optional_stereo(topic, args, 1)?,
            }),
            "loadVideo" => {
                let framerate = match args.get(2) {
                    None | Some(Value::Null) => DEFAULT_FRAMERATE,
                    Some(_) => number_arg(topic, args, 2)?,
                };
                if !(framerate.is_finite() && framerate > 0.0) {
                    return Err(CoreError::invalid_argument(topic, "framerate must be positive"));
                }
                Ok(ControlMessage::LoadVideo {
                    path: string_arg(topic, args, 0)?.to_string(),
                    stereo_mode: optional_stereo(topic, args, 1)?,
                    framerate,
                })
            }
            "loadColor" => Ok(ControlMessage::LoadColor {
                r: color_component(topic, args, 0)?,
                g: color_component(topic, args, 1)?,
                b: color_component(topic, args, 2)?,
            }),
            "loadMessage" => Ok(ControlMessage::LoadMessage {
                text: string_arg(topic, args, 0)?.to_string(),
            }),
            "pose" => parse_pose(args).map(ControlMessage::Pose),
            other => Err(CoreError::UnknownTopic(other.to_string())),
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            ControlMessage::LoadImage { .. } => "loadImage",
            ControlMessage::LoadVideo { .. } => "loadVideo",
            ControlMessage::LoadColor { .. } => "loadColor",
            ControlMessage::LoadMessage { .. } => "loadMessage",
            ControlMessage::Pose(_) => "pose",
        }
    }
}

fn optional_stereo(topic: &str, args: &[Value], index: usize) -> CoreResult<StereoMode> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(StereoMode::Mono),
        Some(_) => string_arg(topic, args, index)?.parse(),
    }
}

fn color_component(topic: &str, args: &[Value], index: usize) -> CoreResult<f32> {
    let value = number_arg(topic, args, index)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::invalid_argument(
            topic,
            format!("color component {} must be within 0..=1, got {}", index, value),
        ));
    }
    Ok(value as f32)
}

fn parse_pose(args: &[Value]) -> CoreResult<PoseCommand> {
    let action = string_arg("pose", args, 0)?;
    let axis: Axis = string_arg("pose", args, 1)?.parse()?;
    match action {
        "reset" => Ok(PoseCommand::Reset(axis)),
        "level" => {
            let value = number_arg("pose", args, 2)?;
            if !value.is_finite() {
                return Err(CoreError::invalid_argument("pose", "level must be finite"));
            }
            Ok(PoseCommand::Level(axis, value))
        }
        other => Err(CoreError::invalid_argument(
            "pose",
            format!("unknown action '{}'", other),
        )),
    }
}
